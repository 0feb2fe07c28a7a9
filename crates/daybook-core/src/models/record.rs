//! Remote record model: the one-row-per-identity persisted payload.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

use super::SyncPayload;

/// One remote row per authenticated identity.
///
/// Created on the first successful upload for an identity, fully
/// replaced (not patched) on every subsequent upload, never deleted by
/// the sync routine.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RemoteRecord {
    /// Owning identity id (immutable after creation)
    pub user_id: String,
    /// Payload object; may be missing or null for a row that was
    /// created empty
    #[serde(default)]
    pub payload: Option<Map<String, Value>>,
    /// Server-side timestamp of the last successful upload
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl RemoteRecord {
    /// Whether the record carries any known, non-null field.
    ///
    /// A row whose payload is missing, null, empty, or made up entirely
    /// of unknown/null entries does not count as restorable.
    pub fn has_payload(&self) -> bool {
        !self.sync_payload().is_empty()
    }

    /// Decode the payload column into a typed sync payload.
    pub fn sync_payload(&self) -> SyncPayload {
        self.payload
            .as_ref()
            .map(SyncPayload::from_json_object)
            .unwrap_or_default()
    }
}
