use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use daybook_core::SyncTrigger;

#[derive(Parser)]
#[command(name = "daybook")]
#[command(about = "Personal planner with opportunistic cloud sync")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to the local key-value store file
    #[arg(long, global = true, value_name = "PATH")]
    pub store_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Configure the sync backend
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Sign in/out of the sync backend
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
    /// Read a local field (QUICK_NOTES, CALENDAR_NOTES, ...)
    Get {
        /// Field name (case-insensitive)
        field: daybook_core::SyncField,
    },
    /// Write a local field
    Set {
        /// Field name (case-insensitive)
        field: daybook_core::SyncField,
        /// New value; structured values are passed as JSON
        value: String,
    },
    /// Run one sync pass against the remote record
    Sync {
        /// Lifecycle trigger to report
        #[arg(long, value_enum, default_value_t = TriggerArg::Foreground)]
        trigger: TriggerArg,
    },
    /// Show signed-in identity and last-sync marker
    Status,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Save backend endpoint configuration
    Init {
        /// Backend base URL (https://...)
        #[arg(long)]
        backend_url: String,
        /// Backend public (anon) API key
        #[arg(long)]
        anon_key: String,
        /// Optional remote record table name
        #[arg(long)]
        table: Option<String>,
    },
    /// Print the active configuration
    Show,
}

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Sign in with email and password
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Show the signed-in identity
    Status,
    /// Sign out and clear the stored session
    Logout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TriggerArg {
    Foreground,
    Background,
}

impl From<TriggerArg> for SyncTrigger {
    fn from(value: TriggerArg) -> Self {
        match value {
            TriggerArg::Foreground => Self::Foreground,
            TriggerArg::Background => Self::Background,
        }
    }
}
