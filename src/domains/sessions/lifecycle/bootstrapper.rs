use super::teardown::SessionTeardown;
use crate::domains::git::GitOps;
use crate::domains::sessions::entity::{Session, SessionState};
use crate::domains::sessions::repository::SessionStore;
use crate::domains::sessions::utils::SessionUtils;
use crate::errors::{HiveError, is_cancelled, is_no_recyclable};
use anyhow::{Context, Result};
use chrono::Utc;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// How the working copy for a new session was obtained.
#[derive(Debug, Clone)]
pub enum WorkingCopy {
    /// A recycled session renamed into place; `recycled_path` is where it lived before.
    Reused {
        session: Session,
        recycled_path: PathBuf,
    },
    Cloned(Session),
}

impl WorkingCopy {
    pub fn session(&self) -> &Session {
        match self {
            WorkingCopy::Reused { session, .. } | WorkingCopy::Cloned(session) => session,
        }
    }

    pub fn into_session(self) -> Session {
        match self {
            WorkingCopy::Reused { session, .. } | WorkingCopy::Cloned(session) => session,
        }
    }

    pub fn is_reused(&self) -> bool {
        matches!(self, WorkingCopy::Reused { .. })
    }
}

pub struct BootstrapConfig<'a> {
    pub name: &'a str,
    pub slug: &'a str,
    pub remote: &'a str,
}

pub struct WorkingCopyBootstrapper<'a> {
    store: &'a dyn SessionStore,
    git: &'a dyn GitOps,
    utils: &'a SessionUtils,
    auto_delete_corrupted: bool,
}

impl<'a> WorkingCopyBootstrapper<'a> {
    pub fn new(
        store: &'a dyn SessionStore,
        git: &'a dyn GitOps,
        utils: &'a SessionUtils,
        auto_delete_corrupted: bool,
    ) -> Self {
        Self {
            store,
            git,
            utils,
            auto_delete_corrupted,
        }
    }

    /// Reuse a validated recycled session for the remote, or clone a fresh one.
    ///
    /// Nothing is persisted for the new session; the caller saves the returned record.
    pub async fn bootstrap(
        &self,
        cancel: &CancellationToken,
        config: BootstrapConfig<'_>,
    ) -> Result<WorkingCopy> {
        if let Some(candidate) = self.find_candidate(cancel, config.remote).await? {
            match self.git.pull(cancel, &candidate.path).await {
                Ok(()) => return self.reuse(cancel, candidate, &config).await,
                Err(e) if is_cancelled(&e) => return Err(e),
                Err(e) => {
                    warn!(
                        "Pull failed for recycled session '{}', falling back to a fresh clone: {e:#}",
                        candidate.id
                    );
                    SessionTeardown::new(self.store)
                        .mark_corrupted(
                            cancel,
                            &candidate,
                            &format!("pull failed: {e:#}"),
                            self.auto_delete_corrupted,
                        )
                        .await?;
                }
            }
        }

        self.clone_fresh(cancel, &config).await
    }

    /// First recycled session for `remote` that still validates. Candidates failing validation
    /// are marked corrupted and the scan continues.
    pub async fn find_candidate(
        &self,
        cancel: &CancellationToken,
        remote: &str,
    ) -> Result<Option<Session>> {
        let teardown = SessionTeardown::new(self.store);
        loop {
            let candidate = match self.store.find_recyclable(remote) {
                Ok(candidate) => candidate,
                Err(e) if is_no_recyclable(&e) => {
                    debug!("No recyclable session for {remote}");
                    return Ok(None);
                }
                Err(e) => return Err(e),
            };

            match self.git.is_valid_repo(cancel, &candidate.path).await {
                Ok(()) => return Ok(Some(candidate)),
                Err(e) if is_cancelled(&e) => return Err(e),
                Err(e) => {
                    teardown
                        .mark_corrupted(
                            cancel,
                            &candidate,
                            &format!("validation failed: {e:#}"),
                            self.auto_delete_corrupted,
                        )
                        .await?;
                }
            }
        }
    }

    async fn reuse(
        &self,
        cancel: &CancellationToken,
        candidate: Session,
        config: &BootstrapConfig<'_>,
    ) -> Result<WorkingCopy> {
        let target = self
            .utils
            .session_path(config.remote, config.slug, &candidate.id);
        rename_dir(cancel, &candidate.path, &target).await?;

        let recycled_path = candidate.path.clone();
        let mut session = candidate;
        session.name = config.name.to_string();
        session.slug = config.slug.to_string();
        session.path = target;
        session.state = SessionState::Active;
        session.touch();

        info!(
            "Reusing recycled session '{}' for '{}' at {}",
            session.id,
            session.name,
            session.path.display()
        );
        Ok(WorkingCopy::Reused {
            session,
            recycled_path,
        })
    }

    async fn clone_fresh(
        &self,
        cancel: &CancellationToken,
        config: &BootstrapConfig<'_>,
    ) -> Result<WorkingCopy> {
        let id = SessionUtils::generate_session_id(self.store)?;
        let path = self.utils.session_path(config.remote, config.slug, &id);

        tokio::fs::create_dir_all(self.utils.repos_dir())
            .await
            .map_err(|e| HiveError::io("create directory", self.utils.repos_dir().display(), e))?;

        info!("Cloning {} into {}", config.remote, path.display());
        if let Err(e) = self.git.clone_repo(cancel, config.remote, &path).await {
            discard_partial_clone(&path);
            return Err(e.context(format!("Failed to clone {}", config.remote)));
        }

        let now = Utc::now();
        Ok(WorkingCopy::Cloned(Session {
            id,
            name: config.name.to_string(),
            slug: config.slug.to_string(),
            path,
            remote: config.remote.to_string(),
            state: SessionState::Active,
            created_at: now,
            updated_at: now,
            last_inbox_read: None,
        }))
    }
}

pub async fn rename_dir(cancel: &CancellationToken, from: &Path, to: &Path) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(HiveError::cancelled("rename directory").into());
    }
    if let Some(parent) = to.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| HiveError::io("create directory", parent.display(), e))?;
    }
    tokio::fs::rename(from, to)
        .await
        .map_err(|e| HiveError::io("rename", from.display(), e))
        .with_context(|| format!("Failed to move {} to {}", from.display(), to.display()))?;
    debug!("Moved {} -> {}", from.display(), to.display());
    Ok(())
}

fn discard_partial_clone(path: &Path) {
    match std::fs::remove_dir_all(path) {
        Ok(()) => debug!("Removed partial clone at {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove partial clone at {}: {e}", path.display()),
    }
}
