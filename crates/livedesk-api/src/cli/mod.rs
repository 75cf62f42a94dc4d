//! CLI command definitions and dispatch for the `livedesk` binary.
//!
//! Uses clap derive macros for argument parsing. The CLI follows a verb-noun
//! pattern (e.g., `livedesk sessions --status waiting`, `livedesk config set`).

pub mod config;
pub mod session;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Run the live support chat backend.
#[derive(Parser)]
#[command(name = "livedesk", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List chat sessions.
    #[command(alias = "ls")]
    Sessions {
        /// Filter by status (waiting, active, closed).
        #[arg(long)]
        status: Option<String>,
    },

    /// Read or change chat settings in the parameter store.
    Config {
        #[command(subcommand)]
        action: config::ConfigCommand,
    },

    /// Start the REST API server.
    Serve {
        /// Port to listen on.
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to.
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}
