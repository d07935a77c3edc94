//! Error types for walks-geocode
//!
//! Location errors never abort a migration run. They are caught at the
//! stage boundary, logged, and recorded as a failed attempt; only store
//! errors (`walks_common::Error`) propagate out of the runner.

use thiserror::Error;

/// Per-signal failure taxonomy of the resolution pipeline
#[derive(Debug, Clone, Error, PartialEq)]
pub enum LocationError {
    /// Malformed, unparseable or untrusted grid reference
    #[error("invalid grid reference: {0}")]
    InvalidGridReference(String),

    /// Lookup service unreachable or returned an error
    #[error("lookup service failure: {0}")]
    NetworkFailure(String),

    /// Lookup completed but produced nothing usable
    #[error("no match found for {0}")]
    NoMatchFound(String),

    /// Match found but too far from the configured area center
    #[error("implausible match {distance_miles:.1} miles from area center (threshold {threshold_miles:.0})")]
    ImplausibleMatch {
        distance_miles: f64,
        threshold_miles: f64,
    },
}

/// HTTP lookup client errors
///
/// Internal to the clients; converted to `LocationError::NetworkFailure`
/// when logged at the client boundary.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

impl From<LookupError> for LocationError {
    fn from(err: LookupError) -> Self {
        LocationError::NetworkFailure(err.to_string())
    }
}
