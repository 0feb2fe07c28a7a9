//! Local key-value persistence

mod sqlite;

pub use sqlite::SqliteKeyValueStore;

use crate::error::Result;

/// Trait for the device-local key-value store (async)
///
/// Local storage is assumed always available on-device; callers that
/// cannot act on a failure degrade reads to "absent" and log writes.
#[allow(async_fn_in_trait)]
pub trait LocalStore {
    /// Read a single value
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Read several values in one batch, preserving input order
    async fn get_many(&self, keys: &[&str]) -> Result<Vec<(String, Option<String>)>>;

    /// Write a single value
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Write several values as one batch
    ///
    /// Atomicity of the batch is a backend contract; partial failure
    /// mid-batch is out of contract for callers.
    async fn set_many(&self, pairs: &[(String, String)]) -> Result<()>;
}
