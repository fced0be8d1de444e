#![allow(dead_code)]

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use hive::domains::git::{DiffStats, GitOps};
use hive::domains::sessions::{
    FileSessionStore, Session, SessionManager, SessionState, SessionStore,
};
use hive::domains::settings::{HiveConfig, Rule};
use hive::infrastructure::{OutputSinks, ProcessExecutor};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

pub const REMOTE: &str = "https://github.com/acme/widgets.git";

/// In-memory stand-in for git: a clone is a directory holding an empty `.git`.
#[derive(Default)]
pub struct FakeGit {
    pub clones: AtomicUsize,
    pub pulls: AtomicUsize,
    pub fail_pull: AtomicBool,
    pub fail_clone: AtomicBool,
}

impl FakeGit {
    pub fn clone_count(&self) -> usize {
        self.clones.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GitOps for FakeGit {
    async fn clone_repo(&self, _cancel: &CancellationToken, url: &str, dest: &Path) -> Result<()> {
        std::fs::create_dir_all(dest.join(".git"))?;
        if self.fail_clone.load(Ordering::SeqCst) {
            return Err(anyhow!("clone of {url} failed"));
        }
        std::fs::write(dest.join("README.md"), format!("cloned from {url}\n"))?;
        self.clones.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn checkout(
        &self,
        _cancel: &CancellationToken,
        _dir: &Path,
        _branch: &str,
    ) -> Result<()> {
        Ok(())
    }

    async fn pull(&self, _cancel: &CancellationToken, dir: &Path) -> Result<()> {
        self.pulls.fetch_add(1, Ordering::SeqCst);
        if self.fail_pull.load(Ordering::SeqCst) {
            return Err(anyhow!("pull failed in {}", dir.display()));
        }
        Ok(())
    }

    async fn reset_hard(&self, _cancel: &CancellationToken, _dir: &Path) -> Result<()> {
        Ok(())
    }

    async fn remote_url(&self, _cancel: &CancellationToken, _dir: &Path) -> Result<String> {
        Ok(REMOTE.to_string())
    }

    async fn is_clean(&self, _cancel: &CancellationToken, _dir: &Path) -> Result<bool> {
        Ok(true)
    }

    async fn branch(&self, _cancel: &CancellationToken, _dir: &Path) -> Result<String> {
        Ok("main".to_string())
    }

    async fn default_branch(&self, _cancel: &CancellationToken, _dir: &Path) -> Result<String> {
        Ok("main".to_string())
    }

    async fn diff_stats(&self, _cancel: &CancellationToken, _dir: &Path) -> Result<DiffStats> {
        Ok(DiffStats::default())
    }

    async fn is_valid_repo(&self, _cancel: &CancellationToken, dir: &Path) -> Result<()> {
        if dir.join(".git").is_dir() {
            Ok(())
        } else {
            Err(anyhow!("{} is not a git repository", dir.display()))
        }
    }
}

pub struct TestEnv {
    pub temp: TempDir,
    pub git: Arc<FakeGit>,
    pub store: Arc<FileSessionStore>,
}

impl TestEnv {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(FileSessionStore::new(temp.path().join("data/sessions.json")));
        Self {
            temp,
            git: Arc::new(FakeGit::default()),
            store,
        }
    }

    pub fn data_dir(&self) -> PathBuf {
        self.temp.path().join("data")
    }

    pub fn config(&self) -> HiveConfig {
        let mut config = HiveConfig {
            data_dir: self.data_dir(),
            ..HiveConfig::default()
        };
        config.commands.recycle =
            vec!["echo '{{ ID }} {{ DefaultBranch }}' > .recycled".to_string()];
        config
    }

    pub fn config_with_rules(&self, rules: Vec<Rule>) -> HiveConfig {
        HiveConfig {
            rules,
            ..self.config()
        }
    }

    pub fn manager(&self, config: HiveConfig) -> SessionManager {
        SessionManager::new(
            config,
            self.store.clone(),
            self.git.clone(),
            Arc::new(ProcessExecutor::new()),
            OutputSinks::discard(),
        )
        .unwrap()
    }

    /// Store a session record with a working copy, `age_minutes` in the past.
    pub fn seed(&self, id: &str, state: SessionState, age_minutes: i64) -> Session {
        let path = self.data_dir().join("repos").join(format!("widgets-recycle-{id}"));
        std::fs::create_dir_all(path.join(".git")).unwrap();
        let stamp = Utc::now() - Duration::minutes(age_minutes);
        let session = Session {
            id: id.to_string(),
            name: id.to_string(),
            slug: id.to_string(),
            path,
            remote: REMOTE.to_string(),
            state,
            created_at: stamp,
            updated_at: stamp,
            last_inbox_read: None,
        };
        self.store.save(&session).unwrap();
        session
    }

    pub fn repos_entries(&self) -> Vec<String> {
        match std::fs::read_dir(self.data_dir().join("repos")) {
            Ok(entries) => {
                let mut names: Vec<String> = entries
                    .filter_map(Result::ok)
                    .map(|e| e.file_name().to_string_lossy().into_owned())
                    .collect();
                names.sort();
                names
            }
            Err(_) => Vec::new(),
        }
    }
}

pub fn rule(pattern: &str) -> Rule {
    Rule {
        pattern: pattern.to_string(),
        ..Rule::default()
    }
}
