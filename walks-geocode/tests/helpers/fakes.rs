//! In-memory stand-ins for the lookup services
//!
//! Both fakes record every call so tests can assert which stages ran.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use walks_geocode::models::{Coordinate, ResolutionResult};
use walks_geocode::LocationError;
use walks_geocode::services::{haversine_miles, CoordinateLookup, PlaceResult, PlaceSearch};

/// Answers lookups near registered points
#[derive(Default)]
pub struct FakeCoordinateLookup {
    answers: Vec<(Coordinate, ResolutionResult)>,
    fallback: Option<ResolutionResult>,
    unreachable: bool,
    calls: Mutex<Vec<(&'static str, Coordinate)>>,
}

impl FakeCoordinateLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer lookups within half a mile of `point`
    pub fn answer_near(mut self, point: Coordinate, result: ResolutionResult) -> Self {
        self.answers.push((point, result));
        self
    }

    /// Answer every other lookup
    pub fn answer_anywhere(mut self, result: ResolutionResult) -> Self {
        self.fallback = Some(result);
        self
    }

    /// Fail every lookup as if the service were down
    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    pub fn calls(&self) -> Vec<(&'static str, Coordinate)> {
        self.calls.lock().unwrap().clone()
    }

    fn answer(&self, call_site: &'static str, coordinate: Coordinate) -> Result<ResolutionResult, LocationError> {
        self.calls.lock().unwrap().push((call_site, coordinate));
        if self.unreachable {
            return Err(LocationError::NetworkFailure("connection refused".to_string()));
        }
        self.answers
            .iter()
            .find(|(point, _)| haversine_miles(*point, coordinate) < 0.5)
            .map(|(_, result)| result.clone())
            .or_else(|| self.fallback.clone())
            .ok_or_else(|| LocationError::NoMatchFound(format!("coordinates {}", coordinate)))
    }
}

#[async_trait]
impl CoordinateLookup for FakeCoordinateLookup {
    async fn reverse_geocode(&self, coordinate: Coordinate) -> Result<ResolutionResult, LocationError> {
        self.answer("reverse_geocode", coordinate)
    }

    async fn grid_reference_lookup(&self, coordinate: Coordinate) -> Result<ResolutionResult, LocationError> {
        self.answer("grid_reference_lookup", coordinate)
    }
}

/// Canned search results keyed by exact query
#[derive(Default)]
pub struct FakePlaceSearch {
    results: HashMap<String, Vec<PlaceResult>>,
    queries: Mutex<Vec<String>>,
}

impl FakePlaceSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_results(mut self, query: &str, results: Vec<PlaceResult>) -> Self {
        self.results.insert(query.to_string(), results);
        self
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl PlaceSearch for FakePlaceSearch {
    async fn search(&self, query: &str) -> Vec<PlaceResult> {
        self.queries.lock().unwrap().push(query.to_string());
        self.results.get(query).cloned().unwrap_or_default()
    }
}

/// Town in Kent at the given point
pub fn place(name: &str, point: Coordinate) -> PlaceResult {
    serde_json::from_value(serde_json::json!({
        "lat": point.lat.to_string(),
        "lon": point.lng.to_string(),
        "display_name": format!("{}, Kent, England, United Kingdom", name),
        "type": "town",
        "importance": 0.4,
        "address": {"town": name, "county": "Kent", "state": "England", "country_code": "gb"}
    }))
    .unwrap()
}

/// Same as `place`, with the search service's own postcode for it
pub fn place_with_postcode(name: &str, point: Coordinate, postcode: &str) -> PlaceResult {
    let mut result = place(name, point);
    result.address.postcode = Some(postcode.to_string());
    result
}

pub fn postcode_result(postcode: &str) -> ResolutionResult {
    ResolutionResult {
        postcode: postcode.to_string(),
        grid_reference_6: Some("TR 150 577".to_string()),
        distance_miles: Some(0.05),
        ..Default::default()
    }
}
