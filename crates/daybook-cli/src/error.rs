use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] daybook_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Authentication error: {0}")]
    Auth(String),
    #[error("Sync failed: {0}")]
    Sync(String),
    #[error("Field value cannot be empty")]
    EmptyFieldValue,
    #[error(
        "Sync backend is not configured. Run `daybook config init --backend-url <URL> --anon-key <KEY>` first."
    )]
    BackendNotConfigured,
}
