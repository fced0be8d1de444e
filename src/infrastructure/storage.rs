//! Atomic JSON documents guarded by an advisory lock file.
//!
//! Writers replace the document through a temporary file in the same directory followed by a
//! rename, so readers see either the previous or the next version, never a partial one.

use crate::errors::HiveError;
use anyhow::Result;
use fs2::FileExt;
use serde::{Serialize, de::DeserializeOwned};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

/// Held advisory lock; released when dropped.
#[derive(Debug)]
pub struct FileLock {
    file: File,
}

impl FileLock {
    pub fn acquire(lock_path: &Path, mode: LockMode) -> Result<Self> {
        if let Some(parent) = lock_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| HiveError::io("create directory", parent.display(), e))?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(lock_path)
            .map_err(|e| HiveError::io("open lock", lock_path.display(), e))?;

        let locked = match mode {
            LockMode::Shared => FileExt::lock_shared(&file),
            LockMode::Exclusive => FileExt::lock_exclusive(&file),
        };
        locked.map_err(|e| HiveError::io("lock", lock_path.display(), e))?;

        Ok(Self { file })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

pub struct AtomicJsonFile<T> {
    path: PathBuf,
    _phantom: PhantomData<T>,
}

impl<T> AtomicJsonFile<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _phantom: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `None` when the file is missing or empty.
    pub fn load(&self) -> Result<Option<T>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(HiveError::io("read", self.path.display(), e).into()),
        };

        if content.trim().is_empty() {
            return Ok(None);
        }

        let data = serde_json::from_str(&content)
            .map_err(|e| HiveError::io("parse", self.path.display(), e))?;
        Ok(Some(data))
    }

    pub fn save(&self, data: &T) -> Result<()> {
        let parent = self
            .path
            .parent()
            .ok_or_else(|| HiveError::io("save", self.path.display(), "path has no parent"))?;
        fs::create_dir_all(parent)
            .map_err(|e| HiveError::io("create directory", parent.display(), e))?;

        let json = serde_json::to_string_pretty(data)
            .map_err(|e| HiveError::io("serialize", self.path.display(), e))?;

        let mut tmp = tempfile::NamedTempFile::new_in(parent)
            .map_err(|e| HiveError::io("create temp file", parent.display(), e))?;
        tmp.write_all(json.as_bytes())
            .and_then(|()| tmp.write_all(b"\n"))
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| HiveError::io("write", tmp.path().display(), e))?;
        tmp.persist(&self.path)
            .map_err(|e| HiveError::io("rename", self.path.display(), e.error))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Doc {
        entries: Vec<String>,
    }

    #[test]
    fn missing_and_empty_files_load_as_none() {
        let temp = TempDir::new().unwrap();
        let file = AtomicJsonFile::<Doc>::new(temp.path().join("doc.json"));
        assert!(file.load().unwrap().is_none());

        std::fs::write(file.path(), "  \n").unwrap();
        assert!(file.load().unwrap().is_none());
    }

    #[test]
    fn save_replaces_content_without_leaving_temp_files() {
        let temp = TempDir::new().unwrap();
        let file = AtomicJsonFile::<Doc>::new(temp.path().join("nested").join("doc.json"));

        file.save(&Doc {
            entries: vec!["a".to_string()],
        })
        .unwrap();
        file.save(&Doc {
            entries: vec!["b".to_string(), "c".to_string()],
        })
        .unwrap();

        let loaded = file.load().unwrap().unwrap();
        assert_eq!(loaded.entries, vec!["b", "c"]);

        let names: Vec<_> = std::fs::read_dir(temp.path().join("nested"))
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("doc.json")]);
    }

    #[test]
    fn corrupt_document_is_an_error() {
        let temp = TempDir::new().unwrap();
        let file = AtomicJsonFile::<Doc>::new(temp.path().join("doc.json"));
        std::fs::write(file.path(), "{ not json").unwrap();

        assert!(file.load().is_err());
    }

    #[test]
    fn shared_locks_coexist_and_release_on_drop() {
        let temp = TempDir::new().unwrap();
        let lock_path = temp.path().join("doc.lock");

        let first = FileLock::acquire(&lock_path, LockMode::Shared).unwrap();
        let second = FileLock::acquire(&lock_path, LockMode::Shared).unwrap();
        drop(first);
        drop(second);

        let exclusive = FileLock::acquire(&lock_path, LockMode::Exclusive).unwrap();
        drop(exclusive);
        assert!(lock_path.exists());
    }
}
