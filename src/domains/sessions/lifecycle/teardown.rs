use crate::domains::sessions::entity::{Session, SessionState};
use crate::domains::sessions::repository::SessionStore;
use crate::errors::{HiveError, is_cancelled};
use anyhow::{Context, Result};
use log::{info, warn};
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// Removes working copies and their records, and records corruption.
pub struct SessionTeardown<'a> {
    store: &'a dyn SessionStore,
}

impl<'a> SessionTeardown<'a> {
    pub fn new(store: &'a dyn SessionStore) -> Self {
        Self { store }
    }

    pub async fn remove_directory(cancel: &CancellationToken, path: &Path) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(HiveError::cancelled("remove directory").into());
        }
        match tokio::fs::remove_dir_all(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(HiveError::io("remove directory", path.display(), e).into()),
        }
    }

    /// Delete the working copy, then the record. The record survives a failed removal.
    pub async fn delete(&self, cancel: &CancellationToken, session: &Session) -> Result<()> {
        Self::remove_directory(cancel, &session.path)
            .await
            .with_context(|| format!("Failed to remove working copy of session '{}'", session.id))?;

        self.store
            .delete(&session.id)
            .with_context(|| format!("Failed to delete session record '{}'", session.id))?;

        info!(
            "Deleted session '{}' ({}) at {}",
            session.id,
            session.state,
            session.path.display()
        );
        Ok(())
    }

    /// Transition `session` to corrupted and persist it, or delete it when `auto_delete` is set.
    ///
    /// Removal failures after auto-delete are logged; the corrupted record then stays for prune.
    pub async fn mark_corrupted(
        &self,
        cancel: &CancellationToken,
        session: &Session,
        reason: &str,
        auto_delete: bool,
    ) -> Result<()> {
        warn!("Session '{}' is corrupted: {reason}", session.id);

        let mut corrupted = session.clone();
        corrupted.state = SessionState::Corrupted;
        corrupted.touch();
        self.store
            .save(&corrupted)
            .with_context(|| format!("Failed to mark session '{}' corrupted", session.id))?;

        if auto_delete
            && let Err(e) = self.delete(cancel, &corrupted).await
        {
            if is_cancelled(&e) {
                return Err(e);
            }
            warn!(
                "Failed to auto-delete corrupted session '{}': {e:#}",
                session.id
            );
        }

        Ok(())
    }
}
