//! Audit events appended to a walk's `events` list

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Member id recorded on events written by migrations
pub const MIGRATION_ACTOR: &str = "migration";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEventType {
    LocationGeocoded,
    LocationGeocodeFailed,
}

/// Append-only audit record
///
/// `data` holds the audited fields as they are *after* the update the event
/// travels with, so diff viewers comparing consecutive events see the
/// correction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    pub event_type: AuditEventType,
    /// Epoch milliseconds
    pub date: i64,
    pub member_id: String,
    pub description: String,
    pub notes: String,
    pub data: Map<String, Value>,
}

impl AuditEvent {
    /// Parse a stored event, ignoring events written by other tools
    pub fn from_value(value: &Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }

    pub fn is_failure(&self) -> bool {
        self.event_type == AuditEventType::LocationGeocodeFailed
    }
}
