pub mod domains;
pub mod errors;
pub mod infrastructure;
pub mod shared;

pub use domains::sessions::{Session, SessionManager, SessionState};
pub use domains::settings::HiveConfig;
pub use errors::HiveError;
