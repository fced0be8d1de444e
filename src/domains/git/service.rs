use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiffStats {
    pub additions: usize,
    pub deletions: usize,
}

/// Git operations the session engine depends on.
///
/// Only `pull` and `is_valid_repo` failures are interpreted by the engine (as corruption);
/// every other failure propagates to the caller.
#[async_trait]
pub trait GitOps: Send + Sync {
    async fn clone_repo(&self, cancel: &CancellationToken, url: &str, dest: &Path) -> Result<()>;

    async fn checkout(&self, cancel: &CancellationToken, dir: &Path, branch: &str) -> Result<()>;

    async fn pull(&self, cancel: &CancellationToken, dir: &Path) -> Result<()>;

    async fn reset_hard(&self, cancel: &CancellationToken, dir: &Path) -> Result<()>;

    async fn remote_url(&self, cancel: &CancellationToken, dir: &Path) -> Result<String>;

    async fn is_clean(&self, cancel: &CancellationToken, dir: &Path) -> Result<bool>;

    async fn branch(&self, cancel: &CancellationToken, dir: &Path) -> Result<String>;

    async fn default_branch(&self, cancel: &CancellationToken, dir: &Path) -> Result<String>;

    async fn diff_stats(&self, cancel: &CancellationToken, dir: &Path) -> Result<DiffStats>;

    /// Fails when `dir/.git` is missing or git refuses to open the directory.
    async fn is_valid_repo(&self, cancel: &CancellationToken, dir: &Path) -> Result<()>;
}
