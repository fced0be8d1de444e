pub mod client;
pub mod remote;
pub mod service;

pub use client::GitClient;
pub use remote::{RemoteInfo, parse_remote, repo_name};
pub use service::{DiffStats, GitOps};
