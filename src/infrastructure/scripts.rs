use super::executor::{CommandExecutor, OutputSinks};
use super::template;
use anyhow::{Context, Result};
use log::{debug, info};
use serde::Serialize;
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// An ordered list of shell command templates sharing one render context.
///
/// Each entry is rendered immediately before it runs, so a broken template stops the
/// sequence without running it. The first failing command aborts the rest.
pub struct ScriptSequence<'a> {
    pub label: &'a str,
    pub scripts: &'a [String],
    pub dir: &'a Path,
}

impl ScriptSequence<'_> {
    pub async fn run<C: Serialize + Sync>(
        &self,
        executor: &dyn CommandExecutor,
        cancel: &CancellationToken,
        sinks: &OutputSinks,
        context: &C,
    ) -> Result<()> {
        if self.scripts.is_empty() {
            debug!("No {} commands configured", self.label);
            return Ok(());
        }

        for (index, script) in self.scripts.iter().enumerate() {
            let step = index + 1;
            let rendered = template::render(script, context).with_context(|| {
                format!("Failed to render {} command #{step}", self.label)
            })?;

            info!(
                "Running {} command #{step} in {}: {rendered}",
                self.label,
                self.dir.display()
            );
            executor
                .run_streaming(cancel, Some(self.dir), sinks, "sh", &["-c", &rendered])
                .await
                .with_context(|| format!("{} command #{step} failed", self.label))?;
        }

        Ok(())
    }
}
