use crate::domains::git::{RemoteInfo, parse_remote, repo_name};
use crate::domains::sessions::repository::SessionStore;
use crate::errors::HiveError;
use anyhow::{Result, anyhow};
use std::path::{Path, PathBuf};

const ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const SESSION_ID_LEN: usize = 8;
const MAX_SLUG_LEN: usize = 40;
const MAX_ID_ATTEMPTS: usize = 16;

/// Naming and on-disk layout of session working copies.
#[derive(Debug, Clone)]
pub struct SessionUtils {
    repos_dir: PathBuf,
    context_root: PathBuf,
}

impl SessionUtils {
    pub fn new(repos_dir: PathBuf, context_root: PathBuf) -> Self {
        Self {
            repos_dir,
            context_root,
        }
    }

    pub fn repos_dir(&self) -> &Path {
        &self.repos_dir
    }

    pub fn generate_random_suffix(len: usize) -> Result<String> {
        let mut bytes = vec![0u8; len];
        getrandom::fill(&mut bytes).map_err(|e| HiveError::io("generate id", "getrandom", e))?;
        Ok(bytes
            .iter()
            .map(|&b| ID_ALPHABET[b as usize % ID_ALPHABET.len()] as char)
            .collect())
    }

    /// New session id not used by any stored record.
    pub fn generate_session_id(store: &dyn SessionStore) -> Result<String> {
        let existing = store.list()?;
        for _attempt in 0..MAX_ID_ATTEMPTS {
            let candidate = Self::generate_random_suffix(SESSION_ID_LEN)?;
            if !existing.iter().any(|session| session.id == candidate) {
                return Ok(candidate);
            }
        }
        Err(anyhow!(
            "Unable to generate a unique session id after {MAX_ID_ATTEMPTS} attempts"
        ))
    }

    pub fn slugify(name: &str) -> String {
        let mut slug = String::with_capacity(name.len());
        let mut pending_dash = false;
        for c in name.to_lowercase().chars() {
            if c.is_ascii_alphanumeric() {
                if pending_dash && !slug.is_empty() {
                    slug.push('-');
                }
                pending_dash = false;
                slug.push(c);
            } else {
                pending_dash = true;
            }
        }

        slug.truncate(MAX_SLUG_LEN);
        let slug = slug.trim_end_matches('-');
        if slug.is_empty() {
            "session".to_string()
        } else {
            slug.to_string()
        }
    }

    pub fn validate_session_name(name: &str) -> bool {
        !name.trim().is_empty() && !name.chars().any(char::is_control)
    }

    pub fn session_path(&self, remote: &str, slug: &str, id: &str) -> PathBuf {
        self.repos_dir
            .join(format!("{}-{slug}-{id}", repo_name(remote)))
    }

    pub fn recycle_path(&self, remote: &str, id: &str) -> PathBuf {
        self.repos_dir
            .join(format!("{}-recycle-{id}", repo_name(remote)))
    }

    pub fn remote_info(remote: &str) -> RemoteInfo {
        parse_remote(remote).unwrap_or_else(|| RemoteInfo {
            host: String::new(),
            owner: String::new(),
            repo: repo_name(remote),
        })
    }

    /// Shared per-repository directory, `<context>/<owner>/<repo>`.
    pub fn context_dir(&self, remote: &str) -> PathBuf {
        let info = Self::remote_info(remote);
        let base = if info.owner.is_empty() {
            self.context_root.clone()
        } else {
            self.context_root.join(&info.owner)
        };
        base.join(&info.repo)
    }
}
