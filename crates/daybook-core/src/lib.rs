//! daybook-core - Core library for Daybook
//!
//! This crate contains the shared models, local key-value store, remote
//! record store, and the opportunistic sync coordinator used by all
//! Daybook interfaces (mobile, CLI).

pub mod auth;
pub mod error;
pub mod models;
pub mod remote;
pub mod store;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{FieldValue, RemoteRecord, SyncField, SyncPayload};
pub use sync::{SyncCoordinator, SyncOutcome, SyncStatus, SyncTrigger};
