use std::path::{Path, PathBuf};

use daybook_core::auth::AuthClient;
use daybook_core::store::SqliteKeyValueStore;

use crate::config::{default_store_path, CliConfig};
use crate::error::CliError;
use crate::session::KeychainSessionStore;

pub fn resolve_store_path(explicit: Option<PathBuf>) -> PathBuf {
    explicit.unwrap_or_else(default_store_path)
}

pub fn open_store(path: &Path) -> Result<SqliteKeyValueStore, CliError> {
    Ok(SqliteKeyValueStore::open(path)?)
}

/// Build the auth client for the configured backend.
///
/// Errors when the backend is unconfigured or half-configured.
pub fn backend_auth_client(
    config: &CliConfig,
) -> Result<AuthClient<KeychainSessionStore>, CliError> {
    let (url, anon_key) = config
        .resolve_backend()
        .map_err(CliError::Config)?
        .ok_or(CliError::BackendNotConfigured)?;

    AuthClient::new(url, anon_key, KeychainSessionStore::new())
        .map_err(|error| CliError::Auth(error.to_string()))
}
