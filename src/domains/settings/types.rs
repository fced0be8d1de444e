use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Engine configuration, immutable once handed to the session manager.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HiveConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_git_path")]
    pub git_path: String,
    #[serde(default = "default_true")]
    pub auto_delete_corrupted: bool,
    #[serde(default)]
    pub commands: CommandsConfig,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl Default for HiveConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            git_path: default_git_path(),
            auto_delete_corrupted: true,
            commands: CommandsConfig::default(),
            rules: Vec::new(),
        }
    }
}

impl HiveConfig {
    pub fn sessions_file(&self) -> PathBuf {
        self.data_dir.join("sessions.json")
    }

    pub fn repos_dir(&self) -> PathBuf {
        self.data_dir.join("repos")
    }

    pub fn context_dir(&self) -> PathBuf {
        self.data_dir.join("context")
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CommandsConfig {
    #[serde(default = "default_recycle_commands")]
    pub recycle: Vec<String>,
    #[serde(default)]
    pub spawn: Vec<String>,
    #[serde(default)]
    pub batch_spawn: Vec<String>,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            recycle: default_recycle_commands(),
            spawn: Vec::new(),
            batch_spawn: Vec::new(),
        }
    }
}

/// Repository scoped settings selected by matching `pattern` against the remote URL.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct Rule {
    #[serde(default)]
    pub pattern: String,
    #[serde(default)]
    pub commands: Vec<String>,
    #[serde(default)]
    pub copy: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_recycled: Option<usize>,
}

fn default_true() -> bool {
    true
}

fn default_git_path() -> String {
    "git".to_string()
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("hive")
}

pub fn default_recycle_commands() -> Vec<String> {
    vec![
        "git fetch origin".to_string(),
        "git checkout -f {{ DefaultBranch }}".to_string(),
        "git reset --hard origin/{{ DefaultBranch }}".to_string(),
        "git clean -fd".to_string(),
    ]
}
