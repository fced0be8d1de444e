pub mod types;
pub mod validation;

pub use types::*;

use crate::errors::HiveError;
use anyhow::{Context, Result};
use log::{debug, info};
use std::path::{Path, PathBuf};

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("hive").join("config.toml"))
}

impl HiveConfig {
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: HiveConfig =
            toml::from_str(content).map_err(|e| HiveError::config("config", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| HiveError::io("read config", path.display(), e))?;
        let config = Self::from_toml(&content)
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;
        info!(
            "Loaded configuration from {} ({} rules)",
            path.display(),
            config.rules.len()
        );
        Ok(config)
    }

    /// Load `path` (or the default location); a missing file yields the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let resolved = match path {
            Some(path) => path.to_path_buf(),
            None => match default_config_path() {
                Some(path) => path,
                None => {
                    debug!("No config directory available, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        if !resolved.exists() {
            debug!(
                "No configuration at {}, using defaults",
                resolved.display()
            );
            return Ok(Self::default());
        }

        Self::load(&resolved)
    }
}
