//! CLI command definitions for the `bluebox` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod chat;
pub mod session;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Chat with the triage assistant from your terminal.
#[derive(Parser)]
#[command(name = "bluebox", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all log output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start an interactive chat.
    Chat {
        /// Owner identity. Without it the chat is memory-only.
        #[arg(long, env = "BLUEBOX_USER")]
        user: Option<String>,

        /// Open this stored session instead of the most recent one.
        #[arg(long, requires = "user", conflicts_with = "new")]
        session: Option<String>,

        /// Start a fresh conversation instead of resuming.
        #[arg(long)]
        new: bool,
    },

    /// List stored sessions for an owner, most recently updated first.
    #[command(alias = "ls")]
    Sessions {
        /// Owner identity.
        #[arg(long, env = "BLUEBOX_USER")]
        user: String,
    },

    /// Print the transcript of a stored session.
    Show {
        /// Session ID.
        session_id: String,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}
