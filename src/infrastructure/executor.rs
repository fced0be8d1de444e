//! Process execution used by the git client, hooks, recyclers and spawners.
//!
//! Every call races the supplied [`CancellationToken`]. Children are spawned with
//! `kill_on_drop`, so abandoning the future on cancellation also terminates the process.

use crate::errors::HiveError;
use anyhow::Result;
use async_trait::async_trait;
use log::debug;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::process::Command;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

type SharedWriter = Arc<Mutex<Box<dyn AsyncWrite + Send + Unpin>>>;

/// Caller supplied destinations for streamed command output.
#[derive(Clone)]
pub struct OutputSinks {
    stdout: SharedWriter,
    stderr: SharedWriter,
}

impl OutputSinks {
    pub fn new(
        stdout: impl AsyncWrite + Send + Unpin + 'static,
        stderr: impl AsyncWrite + Send + Unpin + 'static,
    ) -> Self {
        Self {
            stdout: Arc::new(Mutex::new(Box::new(stdout))),
            stderr: Arc::new(Mutex::new(Box::new(stderr))),
        }
    }

    pub fn stdio() -> Self {
        Self::new(tokio::io::stdout(), tokio::io::stderr())
    }

    pub fn discard() -> Self {
        Self::new(tokio::io::sink(), tokio::io::sink())
    }

    async fn forward<R>(writer: &SharedWriter, reader: &mut R) -> std::io::Result<u64>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut guard = writer.lock().await;
        let copied = tokio::io::copy(reader, &mut **guard).await?;
        guard.flush().await?;
        Ok(copied)
    }
}

impl std::fmt::Debug for OutputSinks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputSinks").finish_non_exhaustive()
    }
}

#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run `program` to completion and capture its output.
    async fn run(
        &self,
        cancel: &CancellationToken,
        dir: Option<&Path>,
        program: &str,
        args: &[&str],
    ) -> Result<CommandOutput>;

    /// Run `program`, forwarding its output into `sinks` as it is produced.
    async fn run_streaming(
        &self,
        cancel: &CancellationToken,
        dir: Option<&Path>,
        sinks: &OutputSinks,
        program: &str,
        args: &[&str],
    ) -> Result<()>;
}

pub fn display_command(program: &str, args: &[&str]) -> String {
    std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessExecutor;

impl ProcessExecutor {
    pub fn new() -> Self {
        Self
    }

    fn command(dir: Option<&Path>, program: &str, args: &[&str]) -> Command {
        let mut command = Command::new(program);
        command.args(args).stdin(Stdio::null()).kill_on_drop(true);
        if let Some(dir) = dir {
            command.current_dir(dir);
        }
        command
    }
}

#[async_trait]
impl CommandExecutor for ProcessExecutor {
    async fn run(
        &self,
        cancel: &CancellationToken,
        dir: Option<&Path>,
        program: &str,
        args: &[&str],
    ) -> Result<CommandOutput> {
        let display = display_command(program, args);
        if cancel.is_cancelled() {
            return Err(HiveError::cancelled(&display).into());
        }
        debug!("Running '{display}'");

        let mut command = Self::command(dir, program, args);
        command.stdout(Stdio::piped()).stderr(Stdio::piped());

        let output = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(HiveError::cancelled(&display).into()),
            output = command.output() => output.map_err(|e| {
                HiveError::io("spawn", &display, e)
            })?,
        };

        let result = CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if !output.status.success() {
            return Err(HiveError::CommandFailed {
                command: display,
                status: result.status,
                stderr: result.stderr.trim().to_string(),
            }
            .into());
        }

        Ok(result)
    }

    async fn run_streaming(
        &self,
        cancel: &CancellationToken,
        dir: Option<&Path>,
        sinks: &OutputSinks,
        program: &str,
        args: &[&str],
    ) -> Result<()> {
        let display = display_command(program, args);
        if cancel.is_cancelled() {
            return Err(HiveError::cancelled(&display).into());
        }
        debug!("Running '{display}' (streaming)");

        let mut command = Self::command(dir, program, args);
        command.stdout(Stdio::piped()).stderr(Stdio::piped());
        let mut child = command
            .spawn()
            .map_err(|e| HiveError::io("spawn", &display, e))?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| HiveError::io("capture stdout", &display, "pipe unavailable"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| HiveError::io("capture stderr", &display, "pipe unavailable"))?;

        let completion = async {
            let (out, err, status) = tokio::join!(
                OutputSinks::forward(&sinks.stdout, &mut stdout),
                OutputSinks::forward(&sinks.stderr, &mut stderr),
                child.wait(),
            );
            if let Err(e) = out {
                log::warn!("Failed to forward stdout of '{display}': {e}");
            }
            if let Err(e) = err {
                log::warn!("Failed to forward stderr of '{display}': {e}");
            }
            status
        };

        let status = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(HiveError::cancelled(&display).into()),
            status = completion => status.map_err(|e| HiveError::io("wait", &display, e))?,
        };

        if !status.success() {
            return Err(HiveError::CommandFailed {
                command: display,
                status: status.code(),
                stderr: String::new(),
            }
            .into());
        }

        Ok(())
    }
}
