use crate::domains::sessions::entity::Session;
use crate::domains::sessions::utils::SessionUtils;
use crate::errors::HiveError;
use crate::infrastructure::executor::{CommandExecutor, OutputSinks};
use crate::infrastructure::scripts::ScriptSequence;
use anyhow::{Context, Result};
use log::debug;
use serde::Serialize;
use std::path::Path;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SpawnContext {
    pub path: String,
    pub name: String,
    pub slug: String,
    #[serde(rename = "ID")]
    pub id: String,
    pub remote: String,
    pub owner: String,
    pub repo: String,
    pub context_dir: String,
    pub prompt: String,
}

impl SpawnContext {
    pub fn new(session: &Session, context_dir: &Path, prompt: Option<&str>) -> Self {
        let info = SessionUtils::remote_info(&session.remote);
        Self {
            path: session.path.display().to_string(),
            name: session.name.clone(),
            slug: session.slug.clone(),
            id: session.id.clone(),
            remote: session.remote.clone(),
            owner: info.owner,
            repo: info.repo,
            context_dir: context_dir.display().to_string(),
            prompt: prompt.unwrap_or_default().to_string(),
        }
    }
}

/// Launches the terminal side of a session from the spawn or batch-spawn templates.
pub struct Spawner<'a> {
    pub commands: &'a [String],
    pub executor: &'a dyn CommandExecutor,
    pub sinks: &'a OutputSinks,
}

impl Spawner<'_> {
    pub async fn spawn(
        &self,
        cancel: &CancellationToken,
        session: &Session,
        context_dir: &Path,
        prompt: Option<&str>,
    ) -> Result<()> {
        if self.commands.is_empty() {
            debug!("No spawn commands configured for session '{}'", session.id);
            return Ok(());
        }

        tokio::fs::create_dir_all(context_dir)
            .await
            .map_err(|e| HiveError::io("create directory", context_dir.display(), e))?;

        ScriptSequence {
            label: "spawn",
            scripts: self.commands,
            dir: &session.path,
        }
        .run(
            self.executor,
            cancel,
            self.sinks,
            &SpawnContext::new(session, context_dir, prompt),
        )
        .await
        .with_context(|| format!("Failed to spawn session '{}'", session.id))
    }
}
