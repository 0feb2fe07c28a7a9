//! Sync payload model: the field-name-to-value bundle exchanged between
//! a device and its remote record.
//!
//! Values cross the wire as strings with JSON encoding applied to
//! structured values, so each field is a tagged union of "plain text" and
//! "JSON document" rather than a runtime type guess.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};

use crate::error::Error;

/// The closed set of logical fields synchronized between devices.
///
/// Wire keys use exact casings for cross-implementation compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SyncField {
    /// Free-form quick notes blob
    QuickNotes,
    /// Per-day calendar notes blob
    CalendarNotes,
    /// User-defined reminders blob
    UserReminders,
    /// Tracked cycle start date
    CycleStartDate,
    /// Whether local notifications are enabled
    NotifEnabled,
    /// API key for the external generative-AI service
    GeminiApiKey,
}

impl SyncField {
    /// All fields in stable wire order.
    pub const ALL: [Self; 6] = [
        Self::QuickNotes,
        Self::CalendarNotes,
        Self::UserReminders,
        Self::CycleStartDate,
        Self::NotifEnabled,
        Self::GeminiApiKey,
    ];

    /// The exact local-store / remote-payload key for this field.
    pub const fn as_key(self) -> &'static str {
        match self {
            Self::QuickNotes => "QUICK_NOTES",
            Self::CalendarNotes => "CALENDAR_NOTES",
            Self::UserReminders => "USER_REMINDERS",
            Self::CycleStartDate => "CYCLE_START_DATE",
            Self::NotifEnabled => "NOTIF_ENABLED",
            Self::GeminiApiKey => "GEMINI_API_KEY",
        }
    }

    /// Look up a field by its exact wire key.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.as_key() == key)
    }
}

impl fmt::Display for SyncField {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_key())
    }
}

impl FromStr for SyncField {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_uppercase();
        Self::from_key(&normalized).ok_or_else(|| {
            Error::InvalidInput(format!(
                "unknown sync field '{raw}' (expected one of: {})",
                Self::ALL.map(Self::as_key).join(", ")
            ))
        })
    }
}

/// A single payload value: plain text or a structured JSON document.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Plain string, stored and transmitted as-is
    Text(String),
    /// JSON-serializable structure, stored as its compact JSON encoding
    Json(Value),
}

impl FieldValue {
    /// Decode a raw local-store string.
    ///
    /// A string that parses as a non-string JSON document becomes `Json`;
    /// parse failures and JSON string scalars stay `Text`.
    pub fn decode(raw: &str) -> Self {
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::String(text)) => Self::Text(text),
            Ok(value) => Self::Json(value),
            Err(_) => Self::Text(raw.to_string()),
        }
    }

    /// Encode for local storage: text as-is, structures as compact JSON.
    pub fn encode(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Json(value) => value.to_string(),
        }
    }

    /// Convert a remote JSON value into a field value.
    ///
    /// `null` means "field absent" and yields `None`.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::String(text) => Some(Self::Text(text.clone())),
            other => Some(Self::Json(other.clone())),
        }
    }

    /// Convert into the remote JSON representation.
    pub fn into_json(self) -> Value {
        match self {
            Self::Text(text) => Value::String(text),
            Self::Json(value) => value,
        }
    }
}

/// A partial mapping from sync fields to values.
///
/// Fields are independent; payloads with missing fields are valid both
/// locally and remotely.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncPayload {
    fields: BTreeMap<SyncField, FieldValue>,
}

impl SyncPayload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: SyncField, value: FieldValue) {
        self.fields.insert(field, value);
    }

    pub fn get(&self, field: SyncField) -> Option<&FieldValue> {
        self.fields.get(&field)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Build a payload from a remote JSON object.
    ///
    /// Unknown keys are ignored; `null` values are treated as absent.
    pub fn from_json_object(object: &Map<String, Value>) -> Self {
        let mut payload = Self::new();
        for (key, value) in object {
            let Some(field) = SyncField::from_key(key) else {
                continue;
            };
            if let Some(value) = FieldValue::from_json(value) {
                payload.insert(field, value);
            }
        }
        payload
    }

    /// Convert into the remote JSON object representation.
    pub fn to_json_object(&self) -> Map<String, Value> {
        self.fields
            .iter()
            .map(|(field, value)| (field.as_key().to_string(), value.clone().into_json()))
            .collect()
    }

    /// Produce local-store `(key, value)` pairs for every present field.
    pub fn to_local_pairs(&self) -> Vec<(String, String)> {
        self.fields
            .iter()
            .map(|(field, value)| (field.as_key().to_string(), value.encode()))
            .collect()
    }
}
