use std::path::Path;

use daybook_core::store::LocalStore;
use daybook_core::SyncField;

use crate::commands::common::open_store;
use crate::error::CliError;

pub async fn run_get(field: SyncField, store_path: &Path) -> Result<(), CliError> {
    let store = open_store(store_path)?;
    match store.get(field.as_key()).await? {
        Some(value) => println!("{value}"),
        None => println!("(not set)"),
    }
    Ok(())
}

pub async fn run_set(field: SyncField, value: &str, store_path: &Path) -> Result<(), CliError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(CliError::EmptyFieldValue);
    }

    let store = open_store(store_path)?;
    store.set(field.as_key(), value).await?;
    println!("{field} updated");
    Ok(())
}
