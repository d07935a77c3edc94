//! Resolution results produced by the location pipeline

use crate::error::LocationError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// WGS84 coordinate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Finite, non-zero, and within WGS84 bounds
    ///
    /// Legacy walks store `0`/`0` for "unknown", which is treated as absent.
    pub fn is_plausible(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && self.lat != 0.0
            && self.lng != 0.0
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6},{:.6}", self.lat, self.lng)
    }
}

/// Which pipeline stage produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchType {
    Coordinates,
    GridReference,
    Postcode,
    TitleExtraction,
    PlaceName,
    StartLocation,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::Coordinates => "COORDINATES",
            MatchType::GridReference => "GRID_REFERENCE",
            MatchType::Postcode => "POSTCODE",
            MatchType::TitleExtraction => "TITLE_EXTRACTION",
            MatchType::PlaceName => "PLACE_NAME",
            MatchType::StartLocation => "START_LOCATION",
        }
    }

    /// Human readable stage name used in audit notes
    pub fn describe(&self) -> &'static str {
        match self {
            MatchType::Coordinates => "existing coordinates",
            MatchType::GridReference => "grid reference",
            MatchType::Postcode => "postcode found in text",
            MatchType::TitleExtraction => "place names in title",
            MatchType::PlaceName => "place name in text",
            MatchType::StartLocation => "start location in description",
        }
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized location lookup result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolutionResult {
    pub postcode: String,
    pub coordinate: Option<Coordinate>,
    pub grid_reference_6: Option<String>,
    pub grid_reference_8: Option<String>,
    pub grid_reference_10: Option<String>,
    pub description: Option<String>,
    /// Distance reported by the lookup service, or computed from the area center
    pub distance_miles: Option<f64>,
    pub match_type: Option<MatchType>,
}

impl ResolutionResult {
    /// Successful iff a postcode was found and the producing stage is recorded
    pub fn is_successful(&self) -> bool {
        !self.postcode.trim().is_empty() && self.match_type.is_some()
    }

    pub fn with_match_type(mut self, match_type: MatchType) -> Self {
        self.match_type = Some(match_type);
        self
    }
}

/// One signal the orchestrator tried, and why it did not resolve
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionAttempt {
    /// e.g. `coordinates 51.279800,1.082800` or `place name "Wye"`
    pub signal: String,
    pub failure: LocationError,
}

impl ResolutionAttempt {
    pub fn new(signal: impl Into<String>, failure: LocationError) -> Self {
        Self {
            signal: signal.into(),
            failure,
        }
    }
}

impl fmt::Display for ResolutionAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.signal, self.failure)
    }
}

/// Terminal per-record outcome of the orchestrator
#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionOutcome {
    Resolved(ResolutionResult),
    Failed { attempts: Vec<ResolutionAttempt> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_requires_postcode_and_match_type() {
        let mut result = ResolutionResult {
            postcode: "CT1 2EH".to_string(),
            ..Default::default()
        };
        assert!(!result.is_successful());

        result = result.with_match_type(MatchType::Coordinates);
        assert!(result.is_successful());

        result.postcode = "   ".to_string();
        assert!(!result.is_successful());
    }

    #[test]
    fn test_zero_coordinate_is_not_plausible() {
        assert!(!Coordinate::new(0.0, 0.0).is_plausible());
        assert!(!Coordinate::new(51.2, 0.0).is_plausible());
        assert!(!Coordinate::new(f64::NAN, 1.0).is_plausible());
        assert!(!Coordinate::new(95.0, 1.0).is_plausible());
        assert!(Coordinate::new(51.2798, 1.0828).is_plausible());
    }

    #[test]
    fn test_match_type_serializes_screaming_snake() {
        let json = serde_json::to_string(&MatchType::TitleExtraction).unwrap();
        assert_eq!(json, "\"TITLE_EXTRACTION\"");
        assert_eq!(MatchType::StartLocation.to_string(), "START_LOCATION");
    }
}
