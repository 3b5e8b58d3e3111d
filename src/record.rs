//! Communication log record.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::types::{LogId, Timestamp};

/// One communication event (call, message) as persisted in the log.
///
/// `id`, `service` and `timestamp` are fixed at construction. Every other
/// field may be edited before the record is written with `put`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    id: LogId,
    service: String,
    timestamp: Timestamp,
    /// Entry type, e.g. `incoming`, `outgoing` or `missed`.
    #[serde(rename = "type", default)]
    pub record_type: Option<String>,
    /// Free-form status.
    #[serde(default)]
    pub status: Option<String>,
    /// Opaque contact references.
    #[serde(default)]
    pub contact_id: Vec<String>,
    /// Phone numbers involved.
    #[serde(default)]
    pub tel: Vec<String>,
    /// Reference to a related object such as a message body.
    #[serde(default)]
    pub object_id: Option<String>,
    /// Display title.
    #[serde(default)]
    pub title: Option<String>,
    /// Display description.
    #[serde(default)]
    pub description: Option<String>,
    /// Arbitrary structured payload. An explicit `null` is kept apart from
    /// an absent payload.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present_value"
    )]
    pub extra: Option<Value>,
}

impl LogRecord {
    /// Creates a record shell with only its identity populated.
    pub fn new(id: impl Into<LogId>, service: impl Into<String>, timestamp: Timestamp) -> Self {
        Self {
            id: id.into(),
            service: service.into(),
            timestamp,
            record_type: None,
            status: None,
            contact_id: Vec::new(),
            tel: Vec::new(),
            object_id: None,
            title: None,
            description: None,
            extra: None,
        }
    }

    /// Primary key.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Originating service.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Creation time in epoch milliseconds.
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
}

fn present_value<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}
