//! Data models for Daybook

mod payload;
mod record;

pub use payload::{FieldValue, SyncField, SyncPayload};
pub use record::RemoteRecord;
