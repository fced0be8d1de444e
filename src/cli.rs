use anyhow::Result;
use hive::domains::git::GitClient;
use hive::domains::sessions::{
    EnrichedSession, FileSessionStore, SessionCreationParams, SessionManager,
};
use hive::domains::settings::HiveConfig;
use hive::infrastructure::{OutputSinks, ProcessExecutor};
use log::debug;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub use hive::shared::cli::{Cli, Command};

fn build_manager(cli: &Cli) -> Result<SessionManager> {
    let config = HiveConfig::load_or_default(cli.config.as_deref())?;
    debug!("Using data directory {}", config.data_dir.display());

    let executor = Arc::new(ProcessExecutor::new());
    let git = Arc::new(GitClient::new(config.git_path.clone(), executor.clone()));
    let store = Arc::new(FileSessionStore::new(config.sessions_file()));
    SessionManager::new(config, store, git, executor, OutputSinks::stdio())
}

fn print_sessions(sessions: &[EnrichedSession]) {
    if sessions.is_empty() {
        println!("No sessions");
        return;
    }

    println!(
        "{:<10} {:<10} {:<24} {:<20} {:<8} PATH",
        "ID", "STATE", "NAME", "BRANCH", "DIFF"
    );
    for entry in sessions {
        let session = &entry.session;
        let diff = entry
            .diff_stats
            .map(|d| format!("+{}/-{}", d.additions, d.deletions))
            .unwrap_or_else(|| "-".to_string());
        let branch = match (&entry.branch, entry.is_clean) {
            (Some(branch), Some(false)) => format!("{branch}*"),
            (Some(branch), _) => branch.clone(),
            (None, _) => "-".to_string(),
        };
        println!(
            "{:<10} {:<10} {:<24} {:<20} {:<8} {}",
            session.id,
            session.state,
            session.name,
            branch,
            diff,
            session.path.display()
        );
    }
}

pub async fn run(cli: Cli, cancel: CancellationToken) -> Result<()> {
    let manager = build_manager(&cli)?;

    match cli.command {
        Command::New {
            name,
            remote,
            source,
            prompt,
            batch,
        } => {
            let session = manager
                .create_session(
                    &cancel,
                    SessionCreationParams {
                        name: &name,
                        remote: remote.as_deref(),
                        source: source.as_deref(),
                        prompt: prompt.as_deref(),
                        use_batch_spawn: batch,
                    },
                )
                .await?;
            println!("{}\t{}", session.id, session.path.display());
        }
        Command::Recycle { id } => {
            let session = manager.recycle_session(&cancel, &id).await?;
            println!("Recycled {} into {}", session.id, session.path.display());
        }
        Command::Rm { id } => {
            manager.delete_session(&cancel, &id).await?;
            println!("Deleted {id}");
        }
        Command::Prune { all } => {
            let deleted = manager.prune(&cancel, all).await?;
            println!("Pruned {deleted} sessions");
        }
        Command::Ls { status, json } => {
            let mut sessions = manager.list_enriched_sessions(&cancel).await?;
            if let Some(status) = status {
                sessions.retain(|entry| entry.session.state == status);
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&sessions)?);
            } else {
                print_sessions(&sessions);
            }
        }
    }

    Ok(())
}
