use super::bootstrapper::{WorkingCopy, rename_dir};
use super::teardown::SessionTeardown;
use crate::domains::sessions::entity::Session;
use crate::domains::sessions::repository::SessionStore;
use anyhow::{Context, Result};
use log::{info, warn};
use tokio_util::sync::CancellationToken;

pub struct SessionFinalizer<'a> {
    store: &'a dyn SessionStore,
}

impl<'a> SessionFinalizer<'a> {
    pub fn new(store: &'a dyn SessionStore) -> Self {
        Self { store }
    }

    pub fn finalize_creation(&self, working_copy: WorkingCopy) -> Result<Session> {
        let reused = working_copy.is_reused();
        let session = working_copy.into_session();

        self.store
            .save(&session)
            .with_context(|| format!("Failed to persist session '{}'", session.name))?;

        info!(
            "Created session '{}' ({}) via {} at {}",
            session.name,
            session.id,
            if reused { "reuse" } else { "clone" },
            session.path.display()
        );
        Ok(session)
    }

    /// Undo the filesystem side of an unpersisted working copy: a reused copy moves back to its
    /// recycled path, a fresh clone is removed.
    pub async fn abandon(&self, working_copy: &WorkingCopy) {
        let cancel = CancellationToken::new();
        match working_copy {
            WorkingCopy::Reused {
                session,
                recycled_path,
            } => {
                if let Err(e) = rename_dir(&cancel, &session.path, recycled_path).await {
                    warn!(
                        "Failed to return session '{}' to {}: {e:#}",
                        session.id,
                        recycled_path.display()
                    );
                }
            }
            WorkingCopy::Cloned(session) => {
                if let Err(e) = SessionTeardown::remove_directory(&cancel, &session.path).await {
                    warn!(
                        "Failed to remove abandoned clone {}: {e:#}",
                        session.path.display()
                    );
                }
            }
        }
    }
}
