//! Great-circle helpers and a haversine route matcher (fallback when OSRM
//! is unavailable).
//!
//! Distances ignore the road network, so mileage from `HaversineMatcher` is a
//! lower bound on what a map-matched route would report.

use crate::error::PipelineError;
use crate::model::{GeoSample, MatchMode, MatchResult, Trajectory};
use crate::traits::RouteMatcher;

/// Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

fn hav(theta: f64) -> f64 {
    (theta / 2.0).sin().powi(2)
}

/// Great-circle distance between two (lat, lng) points in kilometers.
pub fn haversine_km((lat1, lng1): (f64, f64), (lat2, lng2): (f64, f64)) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let h = hav(phi2 - phi1) + phi1.cos() * phi2.cos() * hav((lng2 - lng1).to_radians());
    // rounding can push h a hair past 1 for antipodal points
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

/// Implied speed between two samples in km/h.
///
/// Any movement with no elapsed time counts as infinitely fast.
pub fn speed_kmh(from: &GeoSample, to: &GeoSample) -> f64 {
    let km = haversine_km(from.lat_lng(), to.lat_lng());
    let hours = (to.timestamp - from.timestamp).num_milliseconds().abs() as f64 / 3_600_000.0;
    if hours > 0.0 {
        km / hours
    } else if km > 0.0 {
        f64::INFINITY
    } else {
        0.0
    }
}

/// Route matcher that joins the raw points with straight lines.
#[derive(Debug, Clone, Default)]
pub struct HaversineMatcher;

impl HaversineMatcher {
    pub fn new() -> Self {
        Self
    }
}

impl RouteMatcher for HaversineMatcher {
    fn match_trajectory(
        &self,
        trajectory: &Trajectory,
        _mode: MatchMode,
    ) -> Result<MatchResult, PipelineError> {
        trajectory.validate()?;
        if trajectory.len() < 2 {
            return Ok(MatchResult::empty());
        }
        let meters = trajectory.straight_line_km() * 1000.0;
        Ok(MatchResult::from_meters(meters, trajectory.to_polyline()))
    }
}
