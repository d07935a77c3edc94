//! Great-circle distance and area plausibility

use crate::error::LocationError;
use crate::models::Coordinate;

/// Mean earth radius in miles
pub const EARTH_RADIUS_MILES: f64 = 3958.8;

/// Default plausibility radius around the area center
pub const DEFAULT_THRESHOLD_MILES: f64 = 50.0;

/// Haversine distance in miles
pub fn haversine_miles(a: Coordinate, b: Coordinate) -> f64 {
    let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
    let d_lat = lat2 - lat1;
    let d_lng = (b.lng - a.lng).to_radians();
    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_MILES * h.sqrt().min(1.0).asin()
}

pub fn is_within_area(point: Coordinate, center: Coordinate, threshold_miles: f64) -> bool {
    haversine_miles(point, center) <= threshold_miles
}

/// Plausibility check against the configured area center
///
/// Without a center every point is plausible.
#[derive(Debug, Clone)]
pub struct DistanceValidator {
    center: Option<Coordinate>,
    threshold_miles: f64,
}

impl DistanceValidator {
    pub fn new(center: Option<Coordinate>, threshold_miles: f64) -> Self {
        Self {
            center,
            threshold_miles,
        }
    }

    /// Distance from the center when the point is plausible
    pub fn check(&self, point: Coordinate) -> Result<Option<f64>, LocationError> {
        let Some(center) = self.center else {
            return Ok(None);
        };
        let distance_miles = haversine_miles(point, center);
        if !is_within_area(point, center, self.threshold_miles) {
            return Err(LocationError::ImplausibleMatch {
                distance_miles,
                threshold_miles: self.threshold_miles,
            });
        }
        Ok(Some(distance_miles))
    }
}
