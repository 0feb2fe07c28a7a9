//! Daybook CLI - personal planner with opportunistic cloud sync
//!
//! Edit the six synced fields locally and run the same sync pass the
//! mobile app performs on foreground/background transitions.

mod cli;
mod commands;
mod config;
mod error;
mod session;

use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::commands::{run_auth, run_config, run_get, run_set, run_status, run_sync};
use crate::commands::common::resolve_store_path;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("daybook=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let store_path = resolve_store_path(cli.store_path);

    match cli.command {
        Commands::Config { command } => run_config(command)?,
        Commands::Auth { command } => run_auth(command).await?,
        Commands::Get { field } => run_get(field, &store_path).await?,
        Commands::Set { field, value } => run_set(field, &value, &store_path).await?,
        Commands::Sync { trigger } => run_sync(trigger.into(), &store_path).await?,
        Commands::Status => run_status(&store_path).await?,
    }

    Ok(())
}
