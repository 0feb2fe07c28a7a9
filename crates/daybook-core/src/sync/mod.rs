//! Opportunistic local/remote synchronization.
//!
//! On every app foreground/background transition the coordinator runs
//! one pass: a device that has never synced pulls a populated remote
//! snapshot down (RESTORE); every other combination pushes local state
//! up, overwriting the remote record (UPLOAD). Last writer wins; there
//! is no merge.

use std::fmt;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::{watch, Mutex};

use crate::auth::{Identity, IdentitySession};
use crate::models::{FieldValue, RemoteRecord, SyncField, SyncPayload};
use crate::remote::{RemoteRecordStore, RemoteStoreError};
use crate::store::LocalStore;
use crate::util::rfc3339_now;

/// Local key holding the RFC 3339 timestamp of the last successful sync
/// on this device. Present iff the device has synced at least once.
pub const SYNC_MARKER_KEY: &str = "LAST_SUCCESS_SYNC";

/// App-lifecycle transition that triggered a sync pass.
///
/// Purely informational; it never changes the branching logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTrigger {
    /// App became visible
    Foreground,
    /// App became hidden
    Background,
}

impl fmt::Display for SyncTrigger {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Foreground => formatter.write_str("foreground"),
            Self::Background => formatter.write_str("background"),
        }
    }
}

/// Observable status emitted while a pass runs.
///
/// Terminal states are sticky until the next pass; reverting them to
/// `Idle` after a delay is a presentation concern for subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncStatus {
    #[default]
    Idle,
    Syncing,
    Downloading,
    Success,
    Error,
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Remote fetch failed: {0}")]
    Fetch(#[source] RemoteStoreError),
    #[error("Remote upsert failed: {0}")]
    Upsert(#[source] RemoteStoreError),
}

/// Terminal result of one sync pass.
///
/// Remote failures surface here, never as a panic or `Err` to the
/// caller; the next lifecycle trigger is the implicit retry.
#[derive(Debug)]
pub enum SyncOutcome {
    /// No authenticated identity; nothing was read or written
    Idle,
    /// Pass completed; `restored` marks the pull-only first-sync branch
    Synced { restored: bool },
    /// Remote fetch or upsert failed; the marker was left untouched
    Failed(SyncError),
}

impl SyncOutcome {
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Synced { .. })
    }
}

/// Runs the opportunistic sync protocol between the local key-value
/// store and the per-identity remote record.
pub struct SyncCoordinator<I, L, R> {
    identity: I,
    local: L,
    remote: R,
    // Serializes passes: at most one run_sync execution in flight.
    in_flight: Mutex<()>,
    status_tx: watch::Sender<SyncStatus>,
}

impl<I, L, R> SyncCoordinator<I, L, R>
where
    I: IdentitySession,
    L: LocalStore,
    R: RemoteRecordStore,
{
    pub fn new(identity: I, local: L, remote: R) -> Self {
        let (status_tx, _) = watch::channel(SyncStatus::default());
        Self {
            identity,
            local,
            remote,
            in_flight: Mutex::new(()),
            status_tx,
        }
    }

    /// Subscribe to status events for the lifetime of this coordinator.
    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.status_tx.subscribe()
    }

    /// Run one sync pass to completion.
    ///
    /// Concurrent invocations are serialized; each pass sees the marker
    /// state left by the previous one.
    pub async fn run_sync(&self, trigger: SyncTrigger) -> SyncOutcome {
        let _in_flight = self.in_flight.lock().await;

        let Some(identity) = self.identity.current_identity().await else {
            tracing::debug!(%trigger, "sync skipped: no authenticated identity");
            self.publish(SyncStatus::Idle);
            return SyncOutcome::Idle;
        };

        self.publish(SyncStatus::Syncing);
        tracing::info!(%trigger, user = %identity.id, "sync pass started");

        let has_synced_before = self.read_marker().await.is_some();
        let record = match self.remote.fetch_by_identity(&identity.id).await {
            Ok(record) => record,
            Err(error) => return self.fail(SyncError::Fetch(error)),
        };

        match record {
            Some(record) if !has_synced_before && record.has_payload() => {
                self.restore(&identity, &record).await
            }
            _ => self.upload(&identity).await,
        }
    }

    /// RESTORE: pull the remote snapshot onto this fresh device.
    ///
    /// Mutates local field keys plus the marker; never touches the
    /// remote record.
    async fn restore(&self, identity: &Identity, record: &RemoteRecord) -> SyncOutcome {
        self.publish(SyncStatus::Downloading);

        let pairs = record.sync_payload().to_local_pairs();
        if let Err(error) = self.local.set_many(&pairs).await {
            tracing::warn!("Failed to write restored fields locally: {}", error);
        }
        self.write_marker().await;

        tracing::info!(
            user = %identity.id,
            fields = pairs.len(),
            "restored remote snapshot to this device"
        );
        self.publish(SyncStatus::Success);
        SyncOutcome::Synced { restored: true }
    }

    /// UPLOAD: push local fields up, fully replacing the remote record.
    ///
    /// Mutates only the remote record and, on success, the local marker.
    async fn upload(&self, identity: &Identity) -> SyncOutcome {
        let keys: Vec<&str> = SyncField::ALL.iter().map(|field| field.as_key()).collect();
        let rows = match self.local.get_many(&keys).await {
            Ok(rows) => rows,
            Err(error) => {
                tracing::warn!("Failed to read local fields, uploading none: {}", error);
                Vec::new()
            }
        };

        let mut payload = SyncPayload::new();
        for (key, value) in rows {
            let (Some(field), Some(raw)) = (SyncField::from_key(&key), value) else {
                continue;
            };
            payload.insert(field, FieldValue::decode(&raw));
        }

        if let Err(error) = self.remote.upsert(&identity.id, &payload, Utc::now()).await {
            return self.fail(SyncError::Upsert(error));
        }
        self.write_marker().await;

        tracing::info!(
            user = %identity.id,
            fields = payload.len(),
            "uploaded local fields to remote record"
        );
        self.publish(SyncStatus::Success);
        SyncOutcome::Synced { restored: false }
    }

    async fn read_marker(&self) -> Option<String> {
        match self.local.get(SYNC_MARKER_KEY).await {
            Ok(marker) => marker,
            Err(error) => {
                tracing::warn!("Failed to read sync marker, treating as absent: {}", error);
                None
            }
        }
    }

    async fn write_marker(&self) {
        if let Err(error) = self.local.set(SYNC_MARKER_KEY, &rfc3339_now()).await {
            tracing::warn!("Failed to write sync marker: {}", error);
        }
    }

    fn fail(&self, error: SyncError) -> SyncOutcome {
        tracing::warn!("Sync pass failed: {}", error);
        self.publish(SyncStatus::Error);
        SyncOutcome::Failed(error)
    }

    fn publish(&self, status: SyncStatus) {
        self.status_tx.send_replace(status);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex as StdMutex};
    use std::time::Duration;

    use chrono::{DateTime, Utc};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use crate::error::{Error, Result};
    use crate::remote::RemoteStoreResult;

    use super::*;

    #[derive(Clone, Default)]
    struct FakeIdentity {
        identity: Option<Identity>,
    }

    impl FakeIdentity {
        fn signed_in(id: &str) -> Self {
            Self {
                identity: Some(Identity {
                    id: id.to_string(),
                    email: None,
                }),
            }
        }
    }

    impl IdentitySession for FakeIdentity {
        async fn current_identity(&self) -> Option<Identity> {
            self.identity.clone()
        }
    }

    /// Call-counting in-memory local store.
    #[derive(Clone, Default)]
    struct FakeLocal {
        values: Arc<StdMutex<HashMap<String, String>>>,
        calls: Arc<AtomicUsize>,
    }

    impl FakeLocal {
        fn value(&self, key: &str) -> Option<String> {
            self.values.lock().unwrap().get(key).cloned()
        }

        fn seed(&self, key: &str, value: &str) {
            self.values
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl LocalStore for FakeLocal {
        async fn get(&self, key: &str) -> Result<Option<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.value(key))
        }

        async fn get_many(&self, keys: &[&str]) -> Result<Vec<(String, Option<String>)>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(keys
                .iter()
                .map(|key| ((*key).to_string(), self.value(key)))
                .collect())
        }

        async fn set(&self, key: &str, value: &str) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seed(key, value);
            Ok(())
        }

        async fn set_many(&self, pairs: &[(String, String)]) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut values = self.values.lock().map_err(|_| Error::StorePoisoned)?;
            for (key, value) in pairs {
                values.insert(key.clone(), value.clone());
            }
            Ok(())
        }
    }

    /// Local store whose every read and write fails.
    #[derive(Clone, Default)]
    struct FailingLocal {
        write_attempts: Arc<AtomicUsize>,
    }

    impl FailingLocal {
        fn write_attempt_count(&self) -> usize {
            self.write_attempts.load(Ordering::SeqCst)
        }
    }

    impl LocalStore for FailingLocal {
        async fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(Error::StorePoisoned)
        }

        async fn get_many(&self, _keys: &[&str]) -> Result<Vec<(String, Option<String>)>> {
            Err(Error::StorePoisoned)
        }

        async fn set(&self, _key: &str, _value: &str) -> Result<()> {
            self.write_attempts.fetch_add(1, Ordering::SeqCst);
            Err(Error::StorePoisoned)
        }

        async fn set_many(&self, _pairs: &[(String, String)]) -> Result<()> {
            self.write_attempts.fetch_add(1, Ordering::SeqCst);
            Err(Error::StorePoisoned)
        }
    }

    /// Shared in-memory remote with failure injection and an event log.
    #[derive(Clone, Default)]
    struct FakeRemote {
        record: Arc<StdMutex<Option<RemoteRecord>>>,
        fail_fetch: bool,
        fail_upsert: bool,
        fetch_delay: Option<Duration>,
        upsert_calls: Arc<AtomicUsize>,
        events: Arc<StdMutex<Vec<&'static str>>>,
    }

    impl FakeRemote {
        fn with_record(record: RemoteRecord) -> Self {
            let remote = Self::default();
            *remote.record.lock().unwrap() = Some(record);
            remote
        }

        fn stored_record(&self) -> Option<RemoteRecord> {
            self.record.lock().unwrap().clone()
        }

        fn upsert_count(&self) -> usize {
            self.upsert_calls.load(Ordering::SeqCst)
        }

        fn log(&self, event: &'static str) {
            self.events.lock().unwrap().push(event);
        }
    }

    impl RemoteRecordStore for FakeRemote {
        async fn fetch_by_identity(
            &self,
            _identity_id: &str,
        ) -> RemoteStoreResult<Option<RemoteRecord>> {
            self.log("fetch-start");
            if let Some(delay) = self.fetch_delay {
                tokio::time::sleep(delay).await;
            }
            self.log("fetch-end");
            if self.fail_fetch {
                return Err(RemoteStoreError::Api("fetch refused (503)".to_string()));
            }
            Ok(self.stored_record())
        }

        async fn upsert(
            &self,
            identity_id: &str,
            payload: &SyncPayload,
            updated_at: DateTime<Utc>,
        ) -> RemoteStoreResult<()> {
            self.log("upsert");
            self.upsert_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_upsert {
                return Err(RemoteStoreError::Api("upsert refused (503)".to_string()));
            }
            *self.record.lock().unwrap() = Some(RemoteRecord {
                user_id: identity_id.to_string(),
                payload: Some(payload.to_json_object()),
                updated_at: Some(updated_at),
            });
            Ok(())
        }
    }

    fn coordinator<L: LocalStore>(
        identity: FakeIdentity,
        local: L,
        remote: FakeRemote,
    ) -> SyncCoordinator<FakeIdentity, L, FakeRemote> {
        SyncCoordinator::new(identity, local, remote)
    }

    fn remote_record(payload: serde_json::Value) -> RemoteRecord {
        RemoteRecord {
            user_id: "user-1".to_string(),
            payload: payload.as_object().cloned(),
            updated_at: Some(Utc::now()),
        }
    }

    fn assert_marker_newer_than(local: &FakeLocal, start: DateTime<Utc>) {
        let marker = local.value(SYNC_MARKER_KEY).expect("marker written");
        let parsed = DateTime::parse_from_rfc3339(&marker).expect("marker is RFC 3339");
        assert!(parsed.with_timezone(&Utc) >= start);
    }

    // No identity means zero store calls and an idle outcome.
    #[tokio::test]
    async fn signed_out_pass_is_a_no_op() {
        let local = FakeLocal::default();
        let remote = FakeRemote::default();
        let coordinator = coordinator(FakeIdentity::default(), local.clone(), remote.clone());

        let outcome = coordinator.run_sync(SyncTrigger::Foreground).await;

        assert!(matches!(outcome, SyncOutcome::Idle));
        assert_eq!(local.call_count(), 0);
        assert_eq!(remote.upsert_count(), 0);
        assert!(remote.events.lock().unwrap().is_empty());
    }

    // Fresh device + populated remote record restores, never uploads.
    #[tokio::test]
    async fn first_sync_restores_remote_snapshot() {
        let start = Utc::now();
        let local = FakeLocal::default();
        let remote = FakeRemote::with_record(remote_record(json!({"QUICK_NOTES": "abc"})));
        let coordinator = coordinator(FakeIdentity::signed_in("user-1"), local.clone(), remote.clone());

        let outcome = coordinator.run_sync(SyncTrigger::Foreground).await;

        assert!(matches!(outcome, SyncOutcome::Synced { restored: true }));
        assert_eq!(local.value("QUICK_NOTES").as_deref(), Some("abc"));
        assert_marker_newer_than(&local, start);
        assert_eq!(remote.upsert_count(), 0);
    }

    // A device that has synced before uploads and refreshes its marker.
    #[tokio::test]
    async fn steady_state_pass_uploads_local_fields() {
        let local = FakeLocal::default();
        local.seed(SYNC_MARKER_KEY, "2026-08-01T00:00:00+00:00");
        local.seed("QUICK_NOTES", "xyz");
        let remote = FakeRemote::with_record(remote_record(json!({"QUICK_NOTES": "stale"})));
        let coordinator = coordinator(FakeIdentity::signed_in("user-1"), local.clone(), remote.clone());

        let start = Utc::now();
        let outcome = coordinator.run_sync(SyncTrigger::Background).await;

        assert!(matches!(outcome, SyncOutcome::Synced { restored: false }));
        assert_eq!(remote.upsert_count(), 1);
        let record = remote.stored_record().expect("record upserted");
        assert_eq!(
            record.payload.as_ref().and_then(|p| p.get("QUICK_NOTES")),
            Some(&json!("xyz"))
        );
        // Restore branch never ran: local field kept its value.
        assert_eq!(local.value("QUICK_NOTES").as_deref(), Some("xyz"));
        assert_marker_newer_than(&local, start);
    }

    // An existing-but-empty remote payload forces the upload path.
    #[tokio::test]
    async fn empty_remote_payload_forces_upload() {
        let local = FakeLocal::default();
        local.seed("CALENDAR_NOTES", "notes");
        let remote = FakeRemote::with_record(remote_record(json!({})));
        let coordinator = coordinator(FakeIdentity::signed_in("user-1"), local.clone(), remote.clone());

        let outcome = coordinator.run_sync(SyncTrigger::Foreground).await;

        assert!(matches!(outcome, SyncOutcome::Synced { restored: false }));
        assert_eq!(remote.upsert_count(), 1);
    }

    // Missing remote record on a fresh device also uploads (creates the row).
    #[tokio::test]
    async fn missing_remote_record_uploads_and_creates_row() {
        let local = FakeLocal::default();
        local.seed("NOTIF_ENABLED", "true");
        let remote = FakeRemote::default();
        let coordinator = coordinator(FakeIdentity::signed_in("user-1"), local.clone(), remote.clone());

        let outcome = coordinator.run_sync(SyncTrigger::Foreground).await;

        assert!(matches!(outcome, SyncOutcome::Synced { restored: false }));
        let record = remote.stored_record().expect("record created");
        assert_eq!(record.user_id, "user-1");
        // "true" decodes as JSON, so it uploads as a boolean.
        assert_eq!(
            record.payload.as_ref().and_then(|p| p.get("NOTIF_ENABLED")),
            Some(&json!(true))
        );
    }

    // A failed fetch aborts the pass without touching local state.
    #[tokio::test]
    async fn fetch_failure_is_non_destructive() {
        let local = FakeLocal::default();
        let remote = FakeRemote {
            fail_fetch: true,
            ..FakeRemote::default()
        };
        let coordinator = coordinator(FakeIdentity::signed_in("user-1"), local.clone(), remote.clone());

        let outcome = coordinator.run_sync(SyncTrigger::Foreground).await;

        assert!(matches!(outcome, SyncOutcome::Failed(SyncError::Fetch(_))));
        assert_eq!(local.value(SYNC_MARKER_KEY), None);
        assert_eq!(remote.upsert_count(), 0);
    }

    // A failed upsert leaves the marker untouched so the next trigger retries.
    #[tokio::test]
    async fn upsert_failure_leaves_marker_untouched() {
        let local = FakeLocal::default();
        local.seed(SYNC_MARKER_KEY, "2026-08-01T00:00:00+00:00");
        let remote = FakeRemote {
            fail_upsert: true,
            ..FakeRemote::default()
        };
        let coordinator = coordinator(FakeIdentity::signed_in("user-1"), local.clone(), remote.clone());

        let outcome = coordinator.run_sync(SyncTrigger::Background).await;

        assert!(matches!(outcome, SyncOutcome::Failed(SyncError::Upsert(_))));
        assert_eq!(
            local.value(SYNC_MARKER_KEY).as_deref(),
            Some("2026-08-01T00:00:00+00:00")
        );
    }

    // A local store whose writes all fail cannot abort a restore, and the
    // restore branch still never uploads.
    #[tokio::test]
    async fn local_write_failures_never_abort_a_restore() {
        let local = FailingLocal::default();
        let remote = FakeRemote::with_record(remote_record(json!({"QUICK_NOTES": "abc"})));
        let coordinator = coordinator(FakeIdentity::signed_in("user-1"), local.clone(), remote.clone());

        let outcome = coordinator.run_sync(SyncTrigger::Foreground).await;

        assert!(matches!(outcome, SyncOutcome::Synced { restored: true }));
        // Field batch plus marker, both attempted and both swallowed.
        assert_eq!(local.write_attempt_count(), 2);
        assert_eq!(remote.upsert_count(), 0);
    }

    // A local store whose reads all fail degrades the upload to an empty
    // payload instead of failing the pass.
    #[tokio::test]
    async fn local_read_failures_degrade_an_upload_to_empty() {
        let local = FailingLocal::default();
        let remote = FakeRemote::default();
        let coordinator = coordinator(FakeIdentity::signed_in("user-1"), local, remote.clone());

        let outcome = coordinator.run_sync(SyncTrigger::Foreground).await;

        assert!(matches!(outcome, SyncOutcome::Synced { restored: false }));
        assert_eq!(remote.upsert_count(), 1);
        let record = remote.stored_record().expect("record upserted");
        assert_eq!(record.payload, Some(serde_json::Map::new()));
    }

    // Structured values survive upload on one device and restore on another.
    #[tokio::test]
    async fn structured_values_round_trip_across_devices() {
        let reminders = json!([
            {"title": "dentist", "at": "09:00"},
            {"title": "water plants", "at": "18:30"},
        ]);

        let device_a = FakeLocal::default();
        device_a.seed(SYNC_MARKER_KEY, "2026-08-01T00:00:00+00:00");
        device_a.seed("USER_REMINDERS", &reminders.to_string());
        let remote = FakeRemote::default();
        let coordinator_a =
            coordinator(FakeIdentity::signed_in("user-1"), device_a, remote.clone());
        let outcome = coordinator_a.run_sync(SyncTrigger::Background).await;
        assert!(outcome.is_success());

        // Fresh device, same identity.
        let device_b = FakeLocal::default();
        let coordinator_b =
            coordinator(FakeIdentity::signed_in("user-1"), device_b.clone(), remote);
        let outcome = coordinator_b.run_sync(SyncTrigger::Foreground).await;
        assert!(matches!(outcome, SyncOutcome::Synced { restored: true }));

        let restored = device_b.value("USER_REMINDERS").expect("field restored");
        assert_eq!(FieldValue::decode(&restored), FieldValue::Json(reminders));
    }

    // Back-to-back passes serialize; remote windows never interleave.
    #[tokio::test]
    async fn concurrent_passes_are_serialized() {
        let local = FakeLocal::default();
        local.seed(SYNC_MARKER_KEY, "2026-08-01T00:00:00+00:00");
        let remote = FakeRemote {
            fetch_delay: Some(Duration::from_millis(20)),
            ..FakeRemote::default()
        };
        let coordinator = coordinator(FakeIdentity::signed_in("user-1"), local, remote.clone());

        let (first, second) = tokio::join!(
            coordinator.run_sync(SyncTrigger::Foreground),
            coordinator.run_sync(SyncTrigger::Background),
        );

        assert!(first.is_success());
        assert!(second.is_success());
        assert_eq!(remote.upsert_count(), 2);
        assert_eq!(
            *remote.events.lock().unwrap(),
            vec![
                "fetch-start",
                "fetch-end",
                "upsert",
                "fetch-start",
                "fetch-end",
                "upsert",
            ]
        );
    }

    // Status observers see the terminal state of each pass.
    #[tokio::test]
    async fn status_events_reach_subscribers() {
        let remote = FakeRemote::with_record(remote_record(json!({"QUICK_NOTES": "abc"})));
        let restoring = coordinator(
            FakeIdentity::signed_in("user-1"),
            FakeLocal::default(),
            remote,
        );
        let receiver = restoring.subscribe();
        assert_eq!(*receiver.borrow(), SyncStatus::Idle);

        restoring.run_sync(SyncTrigger::Foreground).await;
        assert_eq!(*receiver.borrow(), SyncStatus::Success);

        let failing = coordinator(
            FakeIdentity::signed_in("user-1"),
            FakeLocal::default(),
            FakeRemote {
                fail_fetch: true,
                ..FakeRemote::default()
            },
        );
        let receiver = failing.subscribe();
        failing.run_sync(SyncTrigger::Background).await;
        assert_eq!(*receiver.borrow(), SyncStatus::Error);
    }
}
