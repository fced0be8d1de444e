use crate::infrastructure::executor::{CommandExecutor, OutputSinks};
use crate::infrastructure::scripts::ScriptSequence;
use anyhow::Result;
use serde::Serialize;
use std::path::Path;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RecycleContext {
    pub path: String,
    #[serde(rename = "ID")]
    pub id: String,
    pub remote: String,
    pub default_branch: String,
}

/// Runs the configured recycle sequence inside a session directory.
pub struct Recycler<'a> {
    pub commands: &'a [String],
    pub executor: &'a dyn CommandExecutor,
    pub sinks: &'a OutputSinks,
}

impl Recycler<'_> {
    pub async fn run(
        &self,
        cancel: &CancellationToken,
        dir: &Path,
        context: &RecycleContext,
    ) -> Result<()> {
        ScriptSequence {
            label: "recycle",
            scripts: self.commands,
            dir,
        }
        .run(self.executor, cancel, self.sinks, context)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::executor::ProcessExecutor;
    use tempfile::TempDir;

    #[tokio::test]
    async fn renders_default_branch_into_commands() {
        let temp = TempDir::new().unwrap();
        let commands = vec!["echo {{ DefaultBranch }}:{{ ID }} > branch.txt".to_string()];
        let executor = ProcessExecutor::new();
        let sinks = OutputSinks::discard();

        Recycler {
            commands: &commands,
            executor: &executor,
            sinks: &sinks,
        }
        .run(
            &CancellationToken::new(),
            temp.path(),
            &RecycleContext {
                path: temp.path().display().to_string(),
                id: "abc12345".to_string(),
                remote: "r".to_string(),
                default_branch: "trunk".to_string(),
            },
        )
        .await
        .unwrap();

        assert_eq!(
            std::fs::read_to_string(temp.path().join("branch.txt")).unwrap(),
            "trunk:abc12345\n"
        );
    }
}
