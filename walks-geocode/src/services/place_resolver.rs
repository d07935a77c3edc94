//! Place name search and disambiguation
//!
//! Free-text queries go to a Nominatim-style search service restricted to
//! Great Britain. Common names are ambiguous ("Sandwich", "Newport"), so
//! the candidates are ranked before one is turned into a postcode through
//! the coordinate lookup:
//!
//! 1. Results in the target country, if any exist
//! 2. Results matching the preferred county, if any exist
//! 3. Place type: city 3, town 2, village 1, other 0
//! 4. Importance, with differences of 0.01 or less treated as equal
//! 5. Number of populated county/state/region fields

use crate::error::{LocationError, LookupError};
use crate::models::{Coordinate, ResolutionResult};
use crate::services::coordinate_lookup::CoordinateLookup;
use crate::services::grid_reference::precisions_for;
use crate::services::rate_limiter::RateLimiter;
use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;

const TARGET_COUNTRY_CODE: &str = "gb";
const TARGET_COUNTRY_NAME: &str = "united kingdom";
const IMPORTANCE_EPSILON: f64 = 0.01;

/// Administrative address parts of a search result
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PlaceAddress {
    pub county: Option<String>,
    pub state: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    pub town: Option<String>,
    pub village: Option<String>,
    pub country_code: Option<String>,
    pub postcode: Option<String>,
}

/// One place search hit
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlaceResult {
    #[serde(deserialize_with = "number_or_string")]
    pub lat: f64,
    #[serde(deserialize_with = "number_or_string")]
    pub lon: f64,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub address: PlaceAddress,
    pub importance: Option<f64>,
    #[serde(rename = "type")]
    pub place_type: Option<String>,
    pub addresstype: Option<String>,
}

/// Nominatim sends coordinates as strings
fn number_or_string<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Loose {
        Number(f64),
        Text(String),
    }

    match Loose::deserialize(deserializer)? {
        Loose::Number(n) => Ok(n),
        Loose::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

impl PlaceResult {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lon)
    }

    fn in_target_country(&self) -> bool {
        self.address
            .country_code
            .as_deref()
            .is_some_and(|code| code.eq_ignore_ascii_case(TARGET_COUNTRY_CODE))
            || contains_ignore_case(&self.display_name, TARGET_COUNTRY_NAME)
    }

    fn matches_county(&self, county: &str) -> bool {
        self.address
            .county
            .as_deref()
            .is_some_and(|c| contains_ignore_case(c, county))
            || contains_ignore_case(&self.display_name, county)
    }

    /// city 3, town 2, village 1, anything else 0
    pub fn place_type_score(&self) -> u8 {
        let by_type = [self.place_type.as_deref(), self.addresstype.as_deref()]
            .into_iter()
            .flatten()
            .map(type_score)
            .max()
            .unwrap_or(0);
        if by_type > 0 {
            return by_type;
        }
        if self.address.city.is_some() {
            3
        } else if self.address.town.is_some() {
            2
        } else if self.address.village.is_some() {
            1
        } else {
            0
        }
    }

    fn importance(&self) -> f64 {
        self.importance.unwrap_or(0.0)
    }

    fn admin_field_count(&self) -> usize {
        [&self.address.county, &self.address.state, &self.address.region]
            .iter()
            .filter(|field| field.as_deref().is_some_and(|v| !v.trim().is_empty()))
            .count()
    }
}

fn type_score(place_type: &str) -> u8 {
    match place_type {
        "city" => 3,
        "town" => 2,
        "village" => 1,
        _ => 0,
    }
}

/// Ranking of steps 3 to 5; `Greater` means `a` is the better place
fn compare_places(a: &PlaceResult, b: &PlaceResult) -> Ordering {
    let by_type = a.place_type_score().cmp(&b.place_type_score());
    if by_type != Ordering::Equal {
        return by_type;
    }
    let importance_diff = a.importance() - b.importance();
    if importance_diff.abs() > IMPORTANCE_EPSILON {
        return if importance_diff > 0.0 { Ordering::Greater } else { Ordering::Less };
    }
    a.admin_field_count().cmp(&b.admin_field_count())
}

/// Pick the best candidate; earlier results win full ties
pub fn select_best<'a>(results: &'a [PlaceResult], preferred_county: Option<&str>) -> Option<&'a PlaceResult> {
    let mut candidates: Vec<&PlaceResult> = results.iter().collect();

    if candidates.iter().any(|r| r.in_target_country()) {
        candidates.retain(|r| r.in_target_country());
    }

    if let Some(county) = preferred_county.map(str::trim).filter(|c| !c.is_empty()) {
        if candidates.iter().any(|r| r.matches_county(county)) {
            candidates.retain(|r| r.matches_county(county));
        }
    }

    candidates
        .into_iter()
        .reduce(|best, r| if compare_places(r, best) == Ordering::Greater { r } else { best })
}

/// Free-text place search
///
/// Errors are soft: implementations log and return an empty list.
#[async_trait]
pub trait PlaceSearch: Send + Sync {
    async fn search(&self, query: &str) -> Vec<PlaceResult>;
}

/// Nominatim search client
pub struct NominatimClient {
    http_client: reqwest::Client,
    base_url: String,
    limit: usize,
    rate_limiter: Arc<RateLimiter>,
}

impl NominatimClient {
    pub fn new(
        base_url: impl Into<String>,
        user_agent: &str,
        timeout: Duration,
        limit: usize,
        delay_ms: u64,
    ) -> Result<Self, LookupError> {
        let http_client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| LookupError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into(),
            limit,
            rate_limiter: Arc::new(RateLimiter::new(delay_ms)),
        })
    }

    pub async fn fetch(&self, query: &str) -> Result<Vec<PlaceResult>, LookupError> {
        self.rate_limiter.wait().await;

        tracing::debug!(query = %query, url = %self.base_url, "Querying place search service");

        let limit = self.limit.to_string();
        let response = self
            .http_client
            .get(&self.base_url)
            .query(&[
                ("q", query),
                ("format", "json"),
                ("addressdetails", "1"),
                ("countrycodes", TARGET_COUNTRY_CODE),
                ("limit", limit.as_str()),
            ])
            .send()
            .await
            .map_err(|e| LookupError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(LookupError::ApiError(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| LookupError::ParseError(e.to_string()))
    }
}

#[async_trait]
impl PlaceSearch for NominatimClient {
    async fn search(&self, query: &str) -> Vec<PlaceResult> {
        match self.fetch(query).await {
            Ok(results) => {
                tracing::debug!(query = %query, count = results.len(), "Place search returned results");
                results
            }
            Err(e) => {
                let failure = LocationError::from(e);
                tracing::warn!(query = %query, error = %failure, "Place search failed");
                Vec::new()
            }
        }
    }
}

/// Query to postcode via place search and coordinate lookup
pub struct PlaceNameResolver {
    search: Arc<dyn PlaceSearch>,
    lookup: Arc<dyn CoordinateLookup>,
    preferred_county: Option<String>,
}

impl PlaceNameResolver {
    pub fn new(search: Arc<dyn PlaceSearch>, lookup: Arc<dyn CoordinateLookup>, preferred_county: Option<String>) -> Self {
        Self {
            search,
            lookup,
            preferred_county,
        }
    }

    pub fn preferred_county(&self) -> Option<&str> {
        self.preferred_county.as_deref()
    }

    /// Resolve a free-text query to a postcode
    ///
    /// The chosen place's coordinate is looked up for the nearest postcode.
    /// When that yields nothing, the place's own postcode (if the search
    /// service supplied one) is used with grid references derived locally.
    /// Without either, the lookup's own failure is returned.
    pub async fn resolve(&self, query: &str) -> Result<ResolutionResult, LocationError> {
        let results = self.search.search(query).await;
        let Some(place) = select_best(&results, self.preferred_county()) else {
            return Err(LocationError::NoMatchFound(format!("place search {:?}", query)));
        };
        let coordinate = place.coordinate();

        tracing::debug!(
            query = %query,
            place = %place.display_name,
            %coordinate,
            candidates = results.len(),
            "Selected place"
        );

        let lookup_failure = match self.lookup.grid_reference_lookup(coordinate).await {
            Ok(mut result) => {
                if result.coordinate.is_none() {
                    result.coordinate = Some(coordinate);
                }
                return Ok(result);
            }
            Err(failure) => failure,
        };

        let Some(postcode) = place
            .address
            .postcode
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
        else {
            return Err(match lookup_failure {
                LocationError::NoMatchFound(_) => {
                    LocationError::NoMatchFound(format!("postcode near {:?}", place.display_name))
                }
                other => other,
            });
        };

        let precisions = precisions_for(coordinate);
        Ok(ResolutionResult {
            postcode: postcode.to_string(),
            coordinate: Some(coordinate),
            grid_reference_6: precisions.as_ref().map(|p| p.six.clone()),
            grid_reference_8: precisions.as_ref().map(|p| p.eight.clone()),
            grid_reference_10: precisions.map(|p| p.ten),
            description: Some(place.display_name.clone()).filter(|d| !d.is_empty()),
            distance_miles: None,
            match_type: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn place(value: serde_json::Value) -> PlaceResult {
        serde_json::from_value(value).unwrap()
    }

    fn sandwich_results() -> Vec<PlaceResult> {
        vec![
            place(json!({
                "lat": "41.6470", "lon": "-88.6215",
                "display_name": "Sandwich, DeKalb County, Illinois, United States",
                "type": "city",
                "importance": 0.55,
                "address": {"city": "Sandwich", "county": "DeKalb County", "state": "Illinois", "country_code": "us"}
            })),
            place(json!({
                "lat": "51.2725", "lon": "1.3395",
                "display_name": "Sandwich, Dover, Kent, England, United Kingdom",
                "type": "town",
                "importance": 0.45,
                "address": {"town": "Sandwich", "county": "Kent", "state": "England", "country_code": "gb", "postcode": "CT13 9EJ"}
            })),
            place(json!({
                "lat": "50.9", "lon": "-1.4",
                "display_name": "Sandwich Road, Southampton, England, United Kingdom",
                "type": "city",
                "importance": 0.30,
                "address": {"city": "Southampton", "county": "Hampshire", "country_code": "gb"}
            })),
        ]
    }

    #[test]
    fn test_parses_string_coordinates() {
        let result = place(json!({"lat": "51.2798", "lon": 1.0828, "display_name": "Canterbury"}));
        assert_eq!(result.coordinate(), Coordinate::new(51.2798, 1.0828));
        assert_eq!(result.importance, None);
    }

    #[test]
    fn test_county_match_outranks_place_type() {
        let results = sandwich_results();
        let best = select_best(&results, Some("kent")).unwrap();
        assert_eq!(best.address.county.as_deref(), Some("Kent"));
        assert_eq!(best.place_type_score(), 2);
    }

    #[test]
    fn test_target_country_filter() {
        let results = sandwich_results();
        // Without a county the GB city wins over the GB town, the US city is out
        let best = select_best(&results, None).unwrap();
        assert_eq!(best.address.city.as_deref(), Some("Southampton"));
    }

    #[test]
    fn test_unmatched_county_keeps_all() {
        let results = sandwich_results();
        let best = select_best(&results, Some("Cumbria")).unwrap();
        assert_eq!(best.address.city.as_deref(), Some("Southampton"));
    }

    #[test]
    fn test_importance_tolerance_and_admin_fields() {
        let results = vec![
            place(json!({"lat": "51.0", "lon": "1.0", "display_name": "A", "type": "village", "importance": 0.405,
                "address": {"county": "Kent", "country_code": "gb"}})),
            place(json!({"lat": "51.1", "lon": "1.1", "display_name": "B", "type": "village", "importance": 0.40,
                "address": {"county": "Kent", "state": "England", "country_code": "gb"}})),
        ];
        assert_eq!(select_best(&results, None).unwrap().display_name, "B");

        let results = vec![
            place(json!({"lat": "51.0", "lon": "1.0", "display_name": "A", "type": "village", "importance": 0.30,
                "address": {"country_code": "gb"}})),
            place(json!({"lat": "51.1", "lon": "1.1", "display_name": "B", "type": "village", "importance": 0.50,
                "address": {"country_code": "gb"}})),
        ];
        assert_eq!(select_best(&results, None).unwrap().display_name, "B");
    }

    #[test]
    fn test_place_type_from_address() {
        let hamlet = place(json!({"lat": "51.0", "lon": "1.0", "type": "administrative",
            "address": {"village": "Wye"}}));
        assert_eq!(hamlet.place_type_score(), 1);
        let bare = place(json!({"lat": "51.0", "lon": "1.0"}));
        assert_eq!(bare.place_type_score(), 0);
    }

    #[test]
    fn test_select_best_empty() {
        assert!(select_best(&[], Some("Kent")).is_none());
    }
}
