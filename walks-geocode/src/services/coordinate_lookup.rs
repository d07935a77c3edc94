//! Reverse geocode by coordinate
//!
//! Client for the address service's reverse-geocode endpoint. The service
//! answers either a single address object or an array of the nearest
//! addresses; the shape is normalized here to the first (closest) entry so
//! nothing past this module sees the union.

use crate::error::{LocationError, LookupError};
use crate::models::{Coordinate, ResolutionResult};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// Coordinate to postcode lookups used by the resolution stages
///
/// Both methods hit the same service; they are separate so logs and fakes
/// can tell a walk's own coordinates from a grid-reference-derived position.
/// Failures are soft: they are logged here and returned as a
/// `LocationError` for the caller to record, never raised further.
/// `NetworkFailure` means the service could not be asked; `NoMatchFound`
/// means it answered without a postcode.
#[async_trait]
pub trait CoordinateLookup: Send + Sync {
    async fn reverse_geocode(&self, coordinate: Coordinate) -> Result<ResolutionResult, LocationError>;

    async fn grid_reference_lookup(&self, coordinate: Coordinate) -> Result<ResolutionResult, LocationError>;
}

/// One address entry as returned by the service
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressResponse {
    pub postcode: Option<String>,
    pub grid_reference_6: Option<String>,
    pub grid_reference_8: Option<String>,
    pub grid_reference_10: Option<String>,
    pub distance: Option<f64>,
    pub description: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ReverseGeocodeBody {
    Many(Vec<AddressResponse>),
    One(AddressResponse),
}

impl ReverseGeocodeBody {
    fn into_first(self) -> Option<AddressResponse> {
        match self {
            ReverseGeocodeBody::Many(entries) => entries.into_iter().next(),
            ReverseGeocodeBody::One(entry) => Some(entry),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl AddressResponse {
    /// Typed result, or `None` for error entries and entries without a postcode
    pub fn into_result(self) -> Option<ResolutionResult> {
        if self.error.is_some() {
            return None;
        }
        let postcode = non_empty(self.postcode)?;
        let coordinate = match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) => Some(Coordinate::new(lat, lng)).filter(Coordinate::is_plausible),
            _ => None,
        };
        Some(ResolutionResult {
            postcode,
            coordinate,
            grid_reference_6: non_empty(self.grid_reference_6),
            grid_reference_8: non_empty(self.grid_reference_8),
            grid_reference_10: non_empty(self.grid_reference_10),
            description: non_empty(self.description),
            distance_miles: self.distance,
            match_type: None,
        })
    }
}

/// HTTP client for the reverse-geocode endpoint
pub struct CoordinateLookupClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl CoordinateLookupClient {
    pub fn new(base_url: impl Into<String>, user_agent: &str, timeout: Duration) -> Result<Self, LookupError> {
        let http_client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| LookupError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into(),
        })
    }

    /// Query the service and normalize to the closest entry
    pub async fn fetch(&self, coordinate: Coordinate) -> Result<Option<AddressResponse>, LookupError> {
        tracing::debug!(url = %self.base_url, lat = coordinate.lat, lng = coordinate.lng, "Querying reverse geocode service");

        let response = self
            .http_client
            .get(&self.base_url)
            .query(&[("lat", coordinate.lat), ("lng", coordinate.lng)])
            .send()
            .await
            .map_err(|e| LookupError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(LookupError::ApiError(status.as_u16(), error_text));
        }

        let body: ReverseGeocodeBody = response
            .json()
            .await
            .map_err(|e| LookupError::ParseError(e.to_string()))?;

        Ok(body.into_first())
    }

    async fn lookup(&self, coordinate: Coordinate, call_site: &'static str) -> Result<ResolutionResult, LocationError> {
        let no_match = || LocationError::NoMatchFound(format!("coordinates {}", coordinate));
        match self.fetch(coordinate).await {
            Ok(Some(entry)) => {
                if let Some(error) = &entry.error {
                    tracing::warn!(call_site, %coordinate, error = %error, "Reverse geocode service reported an error");
                    return Err(LocationError::NoMatchFound(format!("coordinates {} ({})", coordinate, error)));
                }
                entry.into_result().ok_or_else(|| {
                    tracing::debug!(call_site, %coordinate, "Reverse geocode returned no postcode");
                    no_match()
                })
            }
            Ok(None) => {
                tracing::debug!(call_site, %coordinate, "Reverse geocode returned no addresses");
                Err(no_match())
            }
            Err(e) => {
                let failure = LocationError::from(e);
                tracing::warn!(call_site, %coordinate, error = %failure, "Reverse geocode failed");
                Err(failure)
            }
        }
    }
}

#[async_trait]
impl CoordinateLookup for CoordinateLookupClient {
    async fn reverse_geocode(&self, coordinate: Coordinate) -> Result<ResolutionResult, LocationError> {
        self.lookup(coordinate, "reverse_geocode").await
    }

    async fn grid_reference_lookup(&self, coordinate: Coordinate) -> Result<ResolutionResult, LocationError> {
        self.lookup(coordinate, "grid_reference_lookup").await
    }
}
