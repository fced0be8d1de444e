use super::service::{DiffStats, GitOps};
use crate::errors::HiveError;
use crate::infrastructure::executor::{CommandExecutor, CommandOutput};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use git2::{DiffOptions, ErrorCode, Repository, StatusOptions};
use log::debug;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Git capability backed by the `git` binary for mutating operations and libgit2 for queries.
pub struct GitClient {
    git_path: String,
    executor: Arc<dyn CommandExecutor>,
}

impl GitClient {
    pub fn new(git_path: impl Into<String>, executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            git_path: git_path.into(),
            executor,
        }
    }

    async fn git(
        &self,
        cancel: &CancellationToken,
        dir: Option<&Path>,
        args: &[&str],
    ) -> Result<CommandOutput> {
        self.executor.run(cancel, dir, &self.git_path, args).await
    }

    /// Run a libgit2 query on the blocking pool, abandoning it on cancellation.
    async fn inspect<T, F>(
        &self,
        cancel: &CancellationToken,
        dir: &Path,
        operation: &'static str,
        query: F,
    ) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Repository) -> Result<T> + Send + 'static,
    {
        if cancel.is_cancelled() {
            return Err(HiveError::cancelled(operation).into());
        }

        let dir = dir.to_path_buf();
        let task = tokio::task::spawn_blocking(move || {
            let repo = Repository::open(&dir)
                .with_context(|| format!("Failed to open repository at {}", dir.display()))?;
            query(&repo)
        });

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(HiveError::cancelled(operation).into()),
            joined = task => joined.with_context(|| format!("git {operation} task panicked"))?,
        }
    }
}

fn current_branch(repo: &Repository) -> Result<String> {
    match repo.head() {
        Ok(head) => head
            .shorthand()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("HEAD is not valid UTF-8")),
        Err(e) if e.code() == ErrorCode::UnbornBranch => {
            let head = repo.find_reference("HEAD")?;
            head.symbolic_target()
                .and_then(|target| target.strip_prefix("refs/heads/"))
                .map(str::to_string)
                .ok_or_else(|| anyhow!("Unborn HEAD does not point at a branch"))
        }
        Err(e) => Err(anyhow!("Failed to resolve HEAD: {e}")),
    }
}

fn default_branch(repo: &Repository) -> Result<String> {
    if let Ok(reference) = repo.find_reference("refs/remotes/origin/HEAD")
        && let Some(target) = reference.symbolic_target()
        && let Some(name) = target.strip_prefix("refs/remotes/origin/")
    {
        return Ok(name.to_string());
    }

    for candidate in ["main", "master"] {
        if repo
            .find_reference(&format!("refs/remotes/origin/{candidate}"))
            .is_ok()
        {
            return Ok(candidate.to_string());
        }
    }

    debug!("No origin default branch found, using current branch");
    current_branch(repo)
}

fn diff_stats(repo: &Repository) -> Result<DiffStats> {
    let head_tree = repo.head().ok().and_then(|head| head.peel_to_tree().ok());
    let mut opts = DiffOptions::new();
    opts.include_untracked(true)
        .recurse_untracked_dirs(true)
        .show_untracked_content(true);

    let diff = repo.diff_tree_to_workdir_with_index(head_tree.as_ref(), Some(&mut opts))?;
    let stats = diff.stats()?;
    Ok(DiffStats {
        additions: stats.insertions(),
        deletions: stats.deletions(),
    })
}

#[async_trait]
impl GitOps for GitClient {
    async fn clone_repo(&self, cancel: &CancellationToken, url: &str, dest: &Path) -> Result<()> {
        let dest_str = dest.to_string_lossy();
        self.git(cancel, None, &["clone", "--", url, &dest_str])
            .await
            .with_context(|| format!("Failed to clone {url} into {}", dest.display()))?;
        Ok(())
    }

    async fn checkout(&self, cancel: &CancellationToken, dir: &Path, branch: &str) -> Result<()> {
        self.git(cancel, Some(dir), &["checkout", branch])
            .await
            .with_context(|| format!("Failed to check out '{branch}' in {}", dir.display()))?;
        Ok(())
    }

    async fn pull(&self, cancel: &CancellationToken, dir: &Path) -> Result<()> {
        self.git(cancel, Some(dir), &["pull", "--ff-only"])
            .await
            .with_context(|| format!("Failed to pull in {}", dir.display()))?;
        Ok(())
    }

    async fn reset_hard(&self, cancel: &CancellationToken, dir: &Path) -> Result<()> {
        self.git(cancel, Some(dir), &["reset", "--hard"])
            .await
            .with_context(|| format!("Failed to reset {}", dir.display()))?;
        Ok(())
    }

    async fn remote_url(&self, cancel: &CancellationToken, dir: &Path) -> Result<String> {
        self.inspect(cancel, dir, "remote-url", |repo| {
            let remote = repo.find_remote("origin")?;
            remote
                .url()
                .map(str::to_string)
                .ok_or_else(|| anyhow!("Remote 'origin' has no URL"))
        })
        .await
    }

    async fn is_clean(&self, cancel: &CancellationToken, dir: &Path) -> Result<bool> {
        self.inspect(cancel, dir, "status", |repo| {
            let mut opts = StatusOptions::new();
            opts.include_untracked(true)
                .include_ignored(false)
                .exclude_submodules(true);
            Ok(repo.statuses(Some(&mut opts))?.is_empty())
        })
        .await
    }

    async fn branch(&self, cancel: &CancellationToken, dir: &Path) -> Result<String> {
        self.inspect(cancel, dir, "branch", current_branch).await
    }

    async fn default_branch(&self, cancel: &CancellationToken, dir: &Path) -> Result<String> {
        self.inspect(cancel, dir, "default-branch", default_branch)
            .await
    }

    async fn diff_stats(&self, cancel: &CancellationToken, dir: &Path) -> Result<DiffStats> {
        self.inspect(cancel, dir, "diff-stats", diff_stats).await
    }

    async fn is_valid_repo(&self, cancel: &CancellationToken, dir: &Path) -> Result<()> {
        if !dir.join(".git").exists() {
            return Err(anyhow!("{} has no .git directory", dir.display()));
        }
        self.inspect(cancel, dir, "validate", |_| Ok(())).await
    }
}
