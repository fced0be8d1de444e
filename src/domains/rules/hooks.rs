use super::RuleSet;
use super::copier::copy_patterns;
use crate::infrastructure::executor::{CommandExecutor, OutputSinks};
use crate::infrastructure::scripts::ScriptSequence;
use anyhow::{Context, Result};
use log::{debug, info};
use serde::Serialize;
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// Fields available to rule command templates.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct HookContext {
    pub path: String,
    pub name: String,
    pub slug: String,
    #[serde(rename = "ID")]
    pub id: String,
    pub remote: String,
    pub owner: String,
    pub repo: String,
}

/// Applies the side effects of every rule matching a remote: file copies first, then commands.
pub struct HookRunner<'a> {
    pub rules: &'a RuleSet,
    pub executor: &'a dyn CommandExecutor,
    pub sinks: &'a OutputSinks,
}

impl HookRunner<'_> {
    pub async fn apply(
        &self,
        cancel: &CancellationToken,
        remote: &str,
        source: Option<&Path>,
        dest: &Path,
        context: &HookContext,
    ) -> Result<()> {
        for (index, rule) in self.rules.matching(remote).enumerate() {
            debug!(
                "Applying rule '{}' (match #{}) to {}",
                rule.pattern,
                index + 1,
                dest.display()
            );

            if !rule.copy.is_empty() {
                match source {
                    Some(source) => {
                        let report = {
                            let cancel = cancel.clone();
                            let source = source.to_path_buf();
                            let dest = dest.to_path_buf();
                            let patterns = rule.copy.clone();
                            tokio::task::spawn_blocking(move || {
                                copy_patterns(&cancel, &source, &dest, &patterns)
                            })
                            .await
                            .context("File copy task panicked")??
                        };
                        info!(
                            "Rule '{}' copied {} entries into {}",
                            rule.pattern,
                            report.copied,
                            dest.display()
                        );
                    }
                    None => debug!(
                        "Rule '{}' has copy patterns but no source directory was given",
                        rule.pattern
                    ),
                }
            }

            ScriptSequence {
                label: "hook",
                scripts: &rule.commands,
                dir: dest,
            }
            .run(self.executor, cancel, self.sinks, context)
            .await
            .with_context(|| format!("Rule '{}' failed for {remote}", rule.pattern))?;
        }

        Ok(())
    }
}
