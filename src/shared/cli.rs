use crate::domains::sessions::SessionState;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Parser)]
#[command(
    name = "hive",
    version = VERSION,
    about = "Ephemeral, recyclable git working copies for parallel coding agents"
)]
pub struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create a session, reusing a recycled working copy when one is available
    New {
        name: String,
        /// Remote URL; detected from the source checkout when omitted
        #[arg(long)]
        remote: Option<String>,
        /// Checkout that rule copy patterns are read from
        #[arg(long, value_name = "DIR")]
        source: Option<PathBuf>,
        /// Prompt passed to the spawn templates
        #[arg(long)]
        prompt: Option<String>,
        /// Use the batch spawn commands
        #[arg(long)]
        batch: bool,
    },
    /// Reset an active session and return it to the pool
    Recycle { id: String },
    /// Delete a session and its working copy
    #[command(alias = "delete")]
    Rm { id: String },
    /// Delete corrupted sessions and recycled sessions beyond retention
    Prune {
        /// Delete every recycled session
        #[arg(long)]
        all: bool,
    },
    /// List sessions
    Ls {
        #[arg(long, value_parser = parse_state)]
        status: Option<SessionState>,
        /// Emit JSON
        #[arg(long)]
        json: bool,
    },
}

fn parse_state(value: &str) -> Result<SessionState, String> {
    value.parse()
}
