//! Remote record store: one sync row per identity on the managed backend.

use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::models::{RemoteRecord, SyncPayload};
use crate::util::{compact_text, is_http_url, normalize_text_option};

const DEFAULT_RECORD_TABLE: &str = "sync_records";

#[derive(Debug, Error)]
pub enum RemoteStoreError {
    #[error("Invalid remote store configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Remote store HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Remote store API error: {0}")]
    Api(String),
    #[error("Invalid remote record payload: {0}")]
    InvalidPayload(String),
}

pub type RemoteStoreResult<T> = Result<T, RemoteStoreError>;

/// Trait for the per-identity remote record (async)
///
/// `upsert` has insert-if-absent, fully-replace-if-present semantics
/// keyed by identity id; the backend enforces at most one row per
/// identity.
#[allow(async_fn_in_trait)]
pub trait RemoteRecordStore {
    /// Fetch the record for an identity, if one exists.
    async fn fetch_by_identity(&self, identity_id: &str) -> RemoteStoreResult<Option<RemoteRecord>>;

    /// Create or fully replace the record for an identity.
    async fn upsert(
        &self,
        identity_id: &str,
        payload: &SyncPayload,
        updated_at: DateTime<Utc>,
    ) -> RemoteStoreResult<()>;
}

/// PostgREST-backed implementation of `RemoteRecordStore`.
#[derive(Clone)]
pub struct PostgrestRecordStore {
    rest_url: String,
    table: String,
    anon_key: String,
    access_token: String,
    client: Client,
}

impl PostgrestRecordStore {
    pub fn new(
        base_url: impl Into<String>,
        anon_key: impl Into<String>,
        access_token: impl Into<String>,
    ) -> RemoteStoreResult<Self> {
        let rest_url = normalize_rest_url(base_url.into())?;
        let anon_key = require_value(anon_key.into(), "anon key")?;
        let access_token = require_value(access_token.into(), "access token")?;

        Ok(Self {
            rest_url,
            table: DEFAULT_RECORD_TABLE.to_string(),
            anon_key,
            access_token,
            client: Client::builder().build()?,
        })
    }

    /// Override the backing table name.
    #[must_use]
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    fn table_url(&self) -> String {
        format!("{}/{}", self.rest_url, self.table)
    }
}

impl RemoteRecordStore for PostgrestRecordStore {
    async fn fetch_by_identity(&self, identity_id: &str) -> RemoteStoreResult<Option<RemoteRecord>> {
        let identity_filter = format!("eq.{identity_id}");
        let response = self
            .client
            .get(self.table_url())
            .query(&[
                ("select", "user_id,payload,updated_at"),
                ("user_id", identity_filter.as_str()),
            ])
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.access_token)
            .header("Accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteStoreError::Api(parse_api_error(status, &body)));
        }

        let body = response.text().await?;
        parse_record_rows(&body)
    }

    async fn upsert(
        &self,
        identity_id: &str,
        payload: &SyncPayload,
        updated_at: DateTime<Utc>,
    ) -> RemoteStoreResult<()> {
        let row = UpsertRow {
            user_id: identity_id,
            payload: payload.to_json_object(),
            updated_at,
        };

        let response = self
            .client
            .post(self.table_url())
            .query(&[("on_conflict", "user_id")])
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.access_token)
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&[row])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteStoreError::Api(parse_api_error(status, &body)));
        }

        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct UpsertRow<'a> {
    user_id: &'a str,
    payload: Map<String, Value>,
    updated_at: DateTime<Utc>,
}

/// Parse a PostgREST row array into at most one record.
fn parse_record_rows(body: &str) -> RemoteStoreResult<Option<RemoteRecord>> {
    let mut rows: Vec<RemoteRecord> = serde_json::from_str(body)
        .map_err(|error| RemoteStoreError::InvalidPayload(error.to_string()))?;

    if rows.len() > 1 {
        return Err(RemoteStoreError::InvalidPayload(format!(
            "expected at most one sync record per identity, got {}",
            rows.len()
        )));
    }
    Ok(rows.pop())
}

fn normalize_rest_url(raw: String) -> RemoteStoreResult<String> {
    let base = normalize_text_option(Some(raw)).ok_or_else(|| {
        RemoteStoreError::InvalidConfiguration("base URL must not be empty".to_string())
    })?;
    if !is_http_url(&base) {
        return Err(RemoteStoreError::InvalidConfiguration(
            "base URL must include http:// or https://".to_string(),
        ));
    }

    let base = base.trim_end_matches('/');
    if base.ends_with("/rest/v1") {
        Ok(base.to_string())
    } else {
        Ok(format!("{base}/rest/v1"))
    }
}

fn require_value(raw: String, field: &str) -> RemoteStoreResult<String> {
    normalize_text_option(Some(raw)).ok_or_else(|| {
        RemoteStoreError::InvalidConfiguration(format!("{field} must not be empty"))
    })
}

#[derive(Debug, Deserialize)]
struct PostgrestErrorBody {
    message: Option<String>,
    details: Option<String>,
    hint: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<PostgrestErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.details).or(payload.hint) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}
