use crate::domains::sessions::entity::Session;
use crate::errors::HiveError;
use crate::infrastructure::storage::{AtomicJsonFile, FileLock, LockMode};
use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Persistence contract for session records.
///
/// Implementations must be safe for concurrent callers and must never expose a partially
/// written record. None of the operations may call out to git or the command executor.
pub trait SessionStore: Send + Sync {
    fn list(&self) -> Result<Vec<Session>>;

    /// Fails with [`HiveError::SessionNotFound`].
    fn get(&self, id: &str) -> Result<Session>;

    /// Insert or replace by id.
    fn save(&self, session: &Session) -> Result<()>;

    /// Fails with [`HiveError::SessionNotFound`].
    fn delete(&self, id: &str) -> Result<()>;

    /// First recycled session for `remote` in store order; fails with
    /// [`HiveError::NoRecyclable`].
    fn find_recyclable(&self, remote: &str) -> Result<Session>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SessionDocument {
    #[serde(default)]
    sessions: Vec<Session>,
}

/// Guard pairing the in-process lock with the cross-process lock file.
enum StoreGuard<'a> {
    Read(#[allow(dead_code)] RwLockReadGuard<'a, ()>, #[allow(dead_code)] FileLock),
    Write(#[allow(dead_code)] RwLockWriteGuard<'a, ()>, #[allow(dead_code)] FileLock),
}

/// JSON file backed store (`sessions.json` + `sessions.lock`).
pub struct FileSessionStore {
    file: AtomicJsonFile<SessionDocument>,
    lock_path: PathBuf,
    lock: RwLock<()>,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let lock_path = path.with_extension("lock");
        Self {
            file: AtomicJsonFile::new(path),
            lock_path,
            lock: RwLock::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    fn acquire(&self, mode: LockMode) -> Result<StoreGuard<'_>> {
        let guard = match mode {
            LockMode::Shared => {
                let local = self
                    .lock
                    .read()
                    .map_err(|_| HiveError::io("lock", self.path().display(), "lock poisoned"))?;
                StoreGuard::Read(local, FileLock::acquire(&self.lock_path, mode)?)
            }
            LockMode::Exclusive => {
                let local = self
                    .lock
                    .write()
                    .map_err(|_| HiveError::io("lock", self.path().display(), "lock poisoned"))?;
                StoreGuard::Write(local, FileLock::acquire(&self.lock_path, mode)?)
            }
        };
        Ok(guard)
    }

    fn read_all(&self) -> Result<Vec<Session>> {
        Ok(self.file.load()?.unwrap_or_default().sessions)
    }

    fn write_all(&self, sessions: Vec<Session>) -> Result<()> {
        self.file.save(&SessionDocument { sessions })
    }
}

impl SessionStore for FileSessionStore {
    fn list(&self) -> Result<Vec<Session>> {
        let _guard = self.acquire(LockMode::Shared)?;
        self.read_all().context("Failed to list sessions")
    }

    fn get(&self, id: &str) -> Result<Session> {
        let _guard = self.acquire(LockMode::Shared)?;
        self.read_all()?
            .into_iter()
            .find(|session| session.id == id)
            .ok_or_else(|| HiveError::not_found(id).into())
    }

    fn save(&self, session: &Session) -> Result<()> {
        let _guard = self.acquire(LockMode::Exclusive)?;
        let mut sessions = self.read_all()?;
        match sessions.iter_mut().find(|existing| existing.id == session.id) {
            Some(existing) => *existing = session.clone(),
            None => sessions.push(session.clone()),
        }
        self.write_all(sessions)
            .with_context(|| format!("Failed to save session '{}'", session.id))?;
        debug!("Saved session '{}' ({})", session.id, session.state);
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<()> {
        let _guard = self.acquire(LockMode::Exclusive)?;
        let mut sessions = self.read_all()?;
        let before = sessions.len();
        sessions.retain(|session| session.id != id);
        if sessions.len() == before {
            return Err(HiveError::not_found(id).into());
        }
        self.write_all(sessions)
            .with_context(|| format!("Failed to delete session '{id}'"))?;
        debug!("Deleted session record '{id}'");
        Ok(())
    }

    fn find_recyclable(&self, remote: &str) -> Result<Session> {
        let _guard = self.acquire(LockMode::Shared)?;
        self.read_all()?
            .into_iter()
            .find(|session| session.is_recyclable_for(remote))
            .ok_or_else(|| {
                HiveError::NoRecyclable {
                    remote: remote.to_string(),
                }
                .into()
            })
    }
}
