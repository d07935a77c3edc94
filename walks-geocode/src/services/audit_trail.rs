//! Audit events for location corrections
//!
//! Pure builders: no I/O and no clock, the caller supplies `now`. Each
//! event snapshots the audited fields as they stand after the update it is
//! written with.

use crate::models::record::paths;
use crate::models::{
    AuditEvent, AuditEventType, MigrationRecord, RecordUpdate, ResolutionAttempt, ResolutionResult, MIGRATION_ACTOR,
};
use crate::models::update::get_path;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// Fields captured in every audit snapshot
pub const AUDITED_FIELDS: [&str; 8] = [
    paths::TITLE,
    paths::LATITUDE,
    paths::LONGITUDE,
    paths::POSTCODE,
    paths::DESCRIPTION,
    paths::GRID_REFERENCE_6,
    paths::GRID_REFERENCE_8,
    paths::GRID_REFERENCE_10,
];

/// Audited fields keyed by dotted path; absent fields are `null`
pub fn audited_snapshot(document: &Value) -> Map<String, Value> {
    AUDITED_FIELDS
        .iter()
        .map(|path| (path.to_string(), get_path(document, path).cloned().unwrap_or(Value::Null)))
        .collect()
}

/// Field corrections for a resolved walk
///
/// The postcode is always written. Coordinates are only written when the
/// walk has none of its own, and grid references and the location
/// description only fill empty fields; existing data is never overwritten.
pub fn field_updates_for(record: &MigrationRecord, result: &ResolutionResult) -> RecordUpdate {
    let mut update = RecordUpdate::new().set(paths::POSTCODE, result.postcode.trim());

    if record.coordinate().is_none() {
        if let Some(coordinate) = result.coordinate.filter(|c| c.is_plausible()) {
            update = update
                .set(paths::LATITUDE, coordinate.lat)
                .set(paths::LONGITUDE, coordinate.lng);
        }
    }

    let location = record.start_location();
    let grid_fields = [
        (paths::GRID_REFERENCE_6, &location.grid_reference_6, &result.grid_reference_6),
        (paths::GRID_REFERENCE_8, &location.grid_reference_8, &result.grid_reference_8),
        (paths::GRID_REFERENCE_10, &location.grid_reference_10, &result.grid_reference_10),
    ];
    for (path, current, resolved) in grid_fields {
        if is_blank(current) {
            if let Some(value) = resolved {
                update = update.set(path, value.as_str());
            }
        }
    }

    if !record.has_location_description() {
        if let Some(description) = &result.description {
            update = update.set(paths::DESCRIPTION, description.as_str());
        }
    }

    update
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

/// `LOCATION_GEOCODED` event for a resolved walk
///
/// `update` holds the field corrections the event is written with.
pub fn build_success_event(
    document: &Value,
    result: &ResolutionResult,
    update: &RecordUpdate,
    now: DateTime<Utc>,
) -> serde_json::Result<AuditEvent> {
    let mut updated = document.clone();
    update.apply_to(&mut updated)?;

    let source = result
        .match_type
        .map(|m| format!("{} ({})", m.describe(), m))
        .unwrap_or_else(|| "unknown source".to_string());
    let mut notes = format!("Postcode {} resolved from {}", result.postcode.trim(), source);
    if let Some(distance) = result.distance_miles {
        notes.push_str(&format!(", {:.2} miles away", distance));
    }

    Ok(AuditEvent {
        event_type: AuditEventType::LocationGeocoded,
        date: walks_common::time::to_epoch_millis(now),
        member_id: MIGRATION_ACTOR.to_string(),
        description: "Start location postcode added".to_string(),
        notes,
        data: audited_snapshot(&updated),
    })
}

/// `LOCATION_GEOCODE_FAILED` event listing every signal that was tried
pub fn build_failure_event(document: &Value, attempts: &[ResolutionAttempt], now: DateTime<Utc>) -> AuditEvent {
    let tried = if attempts.is_empty() {
        "nothing".to_string()
    } else {
        attempts.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
    };

    AuditEvent {
        event_type: AuditEventType::LocationGeocodeFailed,
        date: walks_common::time::to_epoch_millis(now),
        member_id: MIGRATION_ACTOR.to_string(),
        description: "Start location postcode lookup failed".to_string(),
        notes: format!("No postcode found. Tried: {}", tried),
        data: audited_snapshot(document),
    }
}

/// True if the walk's latest event is the same failure
///
/// Re-running over an unchanged walk must not pile up identical failures.
pub fn is_repeat_failure(record: &MigrationRecord, event: &AuditEvent) -> bool {
    record
        .events
        .last()
        .and_then(AuditEvent::from_value)
        .is_some_and(|last| last.is_failure() && last.notes == event.notes && last.data == event.data)
}
