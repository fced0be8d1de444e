use crate::domains::git::DiffStats;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Active,
    Recycled,
    Corrupted,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Active => "active",
            SessionState::Recycled => "recycled",
            SessionState::Corrupted => "corrupted",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "active" => Ok(SessionState::Active),
            "recycled" => Ok(SessionState::Recycled),
            "corrupted" => Ok(SessionState::Corrupted),
            other => Err(format!("Invalid session state: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub path: PathBuf,
    pub remote: String,
    pub state: SessionState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_inbox_read: Option<DateTime<Utc>>,
}

impl Session {
    pub fn is_recyclable_for(&self, remote: &str) -> bool {
        self.state == SessionState::Recycled && self.remote == remote
    }

    /// Directory-backed states must always point at an existing working copy.
    pub fn expects_directory(&self) -> bool {
        matches!(self.state, SessionState::Active | SessionState::Recycled)
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// A session plus best-effort git status of its working copy.
#[derive(Debug, Clone, Serialize)]
pub struct EnrichedSession {
    pub session: Session,
    pub branch: Option<String>,
    pub is_clean: Option<bool>,
    pub diff_stats: Option<DiffStats>,
}
