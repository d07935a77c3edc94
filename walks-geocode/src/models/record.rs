//! Walk documents as stored
//!
//! Only the fields the location pipeline reads are modelled; the raw JSON
//! document is kept alongside so updates never drop unknown fields.
//! Legacy walks are inconsistent about types, so numeric fields accept
//! numbers, numeric strings, empty strings and null.

use crate::models::Coordinate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// `fields.inputSource` of walks typed in by hand; never touched by migrations
pub const MANUALLY_CREATED: &str = "manually-created";

/// Dotted document paths written by the migration
pub mod paths {
    pub const TITLE: &str = "groupEvent.title";
    pub const LATITUDE: &str = "groupEvent.start_location.latitude";
    pub const LONGITUDE: &str = "groupEvent.start_location.longitude";
    pub const POSTCODE: &str = "groupEvent.start_location.postcode";
    pub const DESCRIPTION: &str = "groupEvent.start_location.description";
    pub const GRID_REFERENCE_6: &str = "groupEvent.start_location.grid_reference_6";
    pub const GRID_REFERENCE_8: &str = "groupEvent.start_location.grid_reference_8";
    pub const GRID_REFERENCE_10: &str = "groupEvent.start_location.grid_reference_10";
    pub const EVENTS: &str = "events";
}

/// Walk document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MigrationRecord {
    /// Store key, not part of the document body
    #[serde(skip)]
    pub id: String,
    #[serde(rename = "groupEvent", default)]
    pub group_event: GroupEvent,
    #[serde(default)]
    pub fields: RecordFields,
    #[serde(default)]
    pub events: Vec<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupEvent {
    #[serde(default, deserialize_with = "loose_string")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub description: Option<String>,
    #[serde(default)]
    pub start_location: StartLocation,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StartLocation {
    #[serde(default, deserialize_with = "loose_f64")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "loose_f64")]
    pub longitude: Option<f64>,
    #[serde(default, deserialize_with = "loose_string")]
    pub grid_reference_6: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub grid_reference_8: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub grid_reference_10: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub postcode: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordFields {
    #[serde(rename = "inputSource", default, deserialize_with = "loose_string")]
    pub input_source: Option<String>,
}

/// Grid reference precision tiers as stored on a walk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GridReferenceField {
    Ten,
    Eight,
    Six,
}

impl GridReferenceField {
    /// Most precise first
    pub const ALL: [GridReferenceField; 3] = [
        GridReferenceField::Ten,
        GridReferenceField::Eight,
        GridReferenceField::Six,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            GridReferenceField::Ten => paths::GRID_REFERENCE_10,
            GridReferenceField::Eight => paths::GRID_REFERENCE_8,
            GridReferenceField::Six => paths::GRID_REFERENCE_6,
        }
    }
}

impl MigrationRecord {
    /// Parse a stored document
    pub fn from_document(id: impl Into<String>, document: &Value) -> serde_json::Result<Self> {
        let mut record: MigrationRecord = serde_json::from_value(document.clone())?;
        record.id = id.into();
        Ok(record)
    }

    pub fn start_location(&self) -> &StartLocation {
        &self.group_event.start_location
    }

    pub fn title(&self) -> &str {
        self.group_event.title.as_deref().unwrap_or("")
    }

    pub fn description(&self) -> &str {
        self.group_event.description.as_deref().unwrap_or("")
    }

    /// Stored coordinate, if both components are present and plausible
    pub fn coordinate(&self) -> Option<Coordinate> {
        let location = self.start_location();
        match (location.latitude, location.longitude) {
            (Some(lat), Some(lng)) => Some(Coordinate::new(lat, lng)).filter(Coordinate::is_plausible),
            _ => None,
        }
    }

    pub fn grid_reference(&self, field: GridReferenceField) -> Option<&str> {
        let location = self.start_location();
        let value = match field {
            GridReferenceField::Ten => location.grid_reference_10.as_deref(),
            GridReferenceField::Eight => location.grid_reference_8.as_deref(),
            GridReferenceField::Six => location.grid_reference_6.as_deref(),
        };
        value.map(str::trim).filter(|v| !v.is_empty())
    }

    /// Non-empty grid reference fields, most precise first
    pub fn grid_references(&self) -> Vec<(GridReferenceField, &str)> {
        GridReferenceField::ALL
            .iter()
            .filter_map(|field| self.grid_reference(*field).map(|value| (*field, value)))
            .collect()
    }

    pub fn has_postcode(&self) -> bool {
        self.start_location()
            .postcode
            .as_deref()
            .is_some_and(|p| !p.trim().is_empty())
    }

    pub fn is_manually_created(&self) -> bool {
        self.fields.input_source.as_deref() == Some(MANUALLY_CREATED)
    }

    pub fn has_location_description(&self) -> bool {
        self.start_location()
            .description
            .as_deref()
            .is_some_and(|d| !d.trim().is_empty())
    }

    pub fn has_text(&self) -> bool {
        !self.title().trim().is_empty() || !self.description().trim().is_empty()
    }

    /// Selection criterion of the migration
    ///
    /// Once a walk has a postcode it never matches again, so re-running
    /// after an interruption only picks up the walks still outstanding.
    pub fn needs_location_backfill(&self) -> bool {
        !self.has_postcode()
            && !self.is_manually_created()
            && (self.coordinate().is_some() || !self.grid_references().is_empty())
    }
}

fn loose_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    })
}

fn loose_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(document: Value) -> MigrationRecord {
        MigrationRecord::from_document("walk-1", &document).unwrap()
    }

    #[test]
    fn test_lenient_numeric_fields() {
        let walk = record(json!({
            "groupEvent": {
                "title": "Wye circular",
                "start_location": { "latitude": "51.1834", "longitude": 0.9378, "postcode": null }
            }
        }));
        assert_eq!(walk.id, "walk-1");
        assert_eq!(walk.coordinate(), Some(Coordinate::new(51.1834, 0.9378)));

        let blank = record(json!({
            "groupEvent": { "start_location": { "latitude": "", "longitude": 0 } }
        }));
        assert_eq!(blank.coordinate(), None);
    }

    #[test]
    fn test_grid_references_most_precise_first() {
        let walk = record(json!({
            "groupEvent": { "start_location": {
                "grid_reference_6": "TR 150 577",
                "grid_reference_8": "  ",
                "grid_reference_10": "TR 15069 57724"
            }}
        }));
        assert_eq!(
            walk.grid_references(),
            vec![
                (GridReferenceField::Ten, "TR 15069 57724"),
                (GridReferenceField::Six, "TR 150 577"),
            ]
        );
    }

    #[test]
    fn test_selection_criterion() {
        let with_coords = record(json!({
            "groupEvent": { "start_location": { "latitude": 51.28, "longitude": 1.08 } }
        }));
        assert!(with_coords.needs_location_backfill());

        let already_fixed = record(json!({
            "groupEvent": { "start_location": { "latitude": 51.28, "longitude": 1.08, "postcode": "CT1 2EH" } }
        }));
        assert!(!already_fixed.needs_location_backfill());

        let manual = record(json!({
            "groupEvent": { "start_location": { "grid_reference_6": "TR 150 577" } },
            "fields": { "inputSource": "manually-created" }
        }));
        assert!(!manual.needs_location_backfill());

        let text_only = record(json!({
            "groupEvent": { "title": "Canterbury to Whitstable", "start_location": {} }
        }));
        assert!(!text_only.needs_location_backfill());
    }
}
