use std::path::Path;

use daybook_core::remote::PostgrestRecordStore;
use daybook_core::store::LocalStore;
use daybook_core::sync::SYNC_MARKER_KEY;
use daybook_core::{SyncCoordinator, SyncOutcome, SyncTrigger};

use crate::commands::common::{backend_auth_client, open_store};
use crate::config::CliConfig;
use crate::error::CliError;

pub async fn run_sync(trigger: SyncTrigger, store_path: &Path) -> Result<(), CliError> {
    let config = CliConfig::load().map_err(CliError::Config)?;
    let client = backend_auth_client(&config)?;

    // No identity is a no-op, not a failure; mirror the coordinator.
    let Some(session) = client
        .restore_session()
        .await
        .map_err(|error| CliError::Auth(error.to_string()))?
    else {
        println!("Nothing to sync: not signed in.");
        return Ok(());
    };

    let (url, anon_key) = config
        .resolve_backend()
        .map_err(CliError::Config)?
        .ok_or(CliError::BackendNotConfigured)?;
    let mut remote = PostgrestRecordStore::new(url, anon_key, session.access_token.as_str())
        .map_err(|error| CliError::Sync(error.to_string()))?;
    if let Some(table) = &config.record_table {
        remote = remote.with_table(table.as_str());
    }

    let local = open_store(store_path)?;
    let coordinator = SyncCoordinator::new(client, local, remote);

    tracing::info!(%trigger, store = %store_path.display(), "running sync pass");
    match coordinator.run_sync(trigger).await {
        SyncOutcome::Idle => {
            println!("Nothing to sync: not signed in.");
            Ok(())
        }
        SyncOutcome::Synced { restored: true } => {
            println!("Restored remote data to this device.");
            Ok(())
        }
        SyncOutcome::Synced { restored: false } => {
            println!("Uploaded local data to the remote record.");
            Ok(())
        }
        SyncOutcome::Failed(error) => Err(CliError::Sync(error.to_string())),
    }
}

pub async fn run_status(store_path: &Path) -> Result<(), CliError> {
    let config = CliConfig::load().map_err(CliError::Config)?;

    match backend_auth_client(&config) {
        Ok(client) => {
            let session = client
                .restore_session()
                .await
                .map_err(|error| CliError::Auth(error.to_string()))?;
            match session {
                Some(session) => {
                    let email_label = session.user.email.as_deref().unwrap_or("(no email)");
                    println!("Signed in as {email_label}");
                }
                None => println!("Not signed in."),
            }
        }
        Err(CliError::BackendNotConfigured) => println!("No sync backend configured."),
        Err(error) => return Err(error),
    }

    let store = open_store(store_path)?;
    match store.get(SYNC_MARKER_KEY).await? {
        Some(marker) => match chrono::DateTime::parse_from_rfc3339(&marker) {
            Ok(parsed) => println!(
                "Last successful sync: {}",
                parsed.format("%Y-%m-%d %H:%M:%S %Z")
            ),
            Err(_) => println!("Last successful sync: {marker}"),
        },
        None => println!("This device has never synced."),
    }
    Ok(())
}
