//! Value types shared by every pipeline stage.
//!
//! Each stage takes these by reference and hands back new values; nothing
//! in the pipeline mutates a trajectory in place.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::haversine::{haversine_km, speed_kmh};
use crate::polyline::Polyline;

/// Meters to statute miles. Applied once, where a matcher builds its result.
pub const METERS_TO_MILES: f64 = 0.0006213712;

pub fn meters_to_miles(meters: f64) -> f64 {
    meters * METERS_TO_MILES
}

/// One GPS ping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoSample {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: DateTime<Utc>,
    pub accuracy: Option<f64>,
}

impl GeoSample {
    pub fn new(
        latitude: f64,
        longitude: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, PipelineError> {
        let sample = Self {
            latitude,
            longitude,
            timestamp,
            accuracy: None,
        };
        sample.validate()?;
        Ok(sample)
    }

    pub fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = Some(accuracy);
        self
    }

    /// Rejects NaN, infinite, or out-of-range coordinates.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let lat_ok = self.latitude.is_finite() && (-90.0..=90.0).contains(&self.latitude);
        let lng_ok = self.longitude.is_finite() && (-180.0..=180.0).contains(&self.longitude);
        if lat_ok && lng_ok {
            Ok(())
        } else {
            Err(PipelineError::InvalidCoordinate {
                latitude: self.latitude,
                longitude: self.longitude,
            })
        }
    }

    /// (lat, lng) tuple, the order the haversine helpers take.
    pub fn lat_lng(&self) -> (f64, f64) {
        (self.latitude, self.longitude)
    }

    /// `[lng, lat]`, the order the routing service and `Polyline` use.
    pub fn lng_lat(&self) -> [f64; 2] {
        [self.longitude, self.latitude]
    }
}

/// Time-ordered GPS samples.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Trajectory {
    samples: Vec<GeoSample>,
}

impl Trajectory {
    /// Wraps samples that are already sorted by timestamp.
    pub fn new(samples: Vec<GeoSample>) -> Self {
        debug_assert!(samples.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        Self { samples }
    }

    /// Sorts by timestamp; equal timestamps keep their input order.
    pub fn from_unsorted(mut samples: Vec<GeoSample>) -> Self {
        samples.sort_by_key(|s| s.timestamp);
        Self { samples }
    }

    pub fn samples(&self) -> &[GeoSample] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<GeoSample> {
        self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn first(&self) -> Option<&GeoSample> {
        self.samples.first()
    }

    pub fn last(&self) -> Option<&GeoSample> {
        self.samples.last()
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        self.samples.iter().try_for_each(GeoSample::validate)
    }

    /// Samples with `start <= timestamp <= end`.
    pub fn between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Trajectory {
        Trajectory {
            samples: self
                .samples
                .iter()
                .filter(|s| s.timestamp >= start && s.timestamp <= end)
                .cloned()
                .collect(),
        }
    }

    pub fn within(&self, window: &TimeWindow) -> Trajectory {
        self.between(window.start, window.end)
    }

    /// `self` followed by `other`.
    pub fn concat(&self, other: &Trajectory) -> Trajectory {
        let mut samples = self.samples.clone();
        samples.extend(other.samples.iter().cloned());
        Trajectory { samples }
    }

    pub fn duration(&self) -> Duration {
        match (self.first(), self.last()) {
            (Some(first), Some(last)) => last.timestamp - first.timestamp,
            _ => Duration::zero(),
        }
    }

    /// Sum of great-circle distances between consecutive samples.
    pub fn straight_line_km(&self) -> f64 {
        self.samples
            .windows(2)
            .map(|w| haversine_km(w[0].lat_lng(), w[1].lat_lng()))
            .sum()
    }

    /// Mean of the implied speeds between consecutive samples, in m/s.
    ///
    /// Pairs with no elapsed time are skipped.
    pub fn average_speed_mps(&self) -> f64 {
        let speeds: Vec<f64> = self
            .samples
            .windows(2)
            .filter(|w| w[1].timestamp > w[0].timestamp)
            .map(|w| speed_kmh(&w[0], &w[1]) / 3.6)
            .collect();
        if speeds.is_empty() {
            0.0
        } else {
            speeds.iter().sum::<f64>() / speeds.len() as f64
        }
    }

    /// `[lng, lat]` of every sample, in order.
    pub fn to_polyline(&self) -> Polyline {
        Polyline::new(self.samples.iter().map(GeoSample::lng_lat).collect())
    }
}

/// Closed time interval used to restrict a shift's samples to one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, PipelineError> {
        if end < start {
            return Err(PipelineError::InvalidTimeWindow);
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        t >= self.start && t <= self.end
    }
}

/// A span where the device stayed put.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopInterval {
    pub latitude: f64,
    pub longitude: f64,
    pub arrival_time: DateTime<Utc>,
    pub leaving_time: DateTime<Utc>,
}

impl StopInterval {
    /// Zero-length stop at a single sample; used for the trajectory's first
    /// and last points.
    pub fn at_sample(sample: &GeoSample) -> Self {
        Self {
            latitude: sample.latitude,
            longitude: sample.longitude,
            arrival_time: sample.timestamp,
            leaving_time: sample.timestamp,
        }
    }

    pub fn duration(&self) -> Duration {
        self.leaving_time - self.arrival_time
    }
}

/// The stops on either side of a trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripBookend {
    pub start: StopInterval,
    pub stop: StopInterval,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub min_lat: f64,
    pub min_lng: f64,
    pub max_lat: f64,
    pub max_lng: f64,
}

impl BoundingBox {
    /// `[minLng, minLat, maxLng, maxLat]`.
    pub fn as_array(&self) -> [f64; 4] {
        [self.min_lng, self.min_lat, self.max_lng, self.max_lat]
    }

    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min_lat: self.min_lat.min(other.min_lat),
            min_lng: self.min_lng.min(other.min_lng),
            max_lat: self.max_lat.max(other.max_lat),
            max_lng: self.max_lng.max(other.max_lng),
        }
    }
}

/// One driving segment between two stops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub trajectory: Trajectory,
    pub bookend: TripBookend,
    pub distance_miles: f64,
    pub geometry: Polyline,
    pub bounding_box: Option<BoundingBox>,
    /// How many segmenter drafts this trip was built from.
    pub segments: usize,
    /// Outcome of the last match; `Error` means no mileage is available.
    pub status: MatchStatus,
    pub message: String,
}

impl Trip {
    /// Unmatched trip straight out of the segmenter.
    pub fn draft(trajectory: Trajectory, bookend: TripBookend) -> Self {
        Self {
            trajectory,
            bookend,
            distance_miles: 0.0,
            geometry: Polyline::default(),
            bounding_box: None,
            segments: 1,
            status: MatchStatus::Ok,
            message: String::new(),
        }
    }

    /// Copies a match outcome onto the trip. Failed matches leave it at zero
    /// distance and carry the error status and message.
    pub fn with_match(mut self, result: &MatchResult) -> Self {
        if result.is_ok() {
            self.distance_miles = result.distance_miles;
            self.geometry = result.geometry.clone();
            self.bounding_box = result.bounding_box;
        } else {
            self.distance_miles = 0.0;
            self.geometry = Polyline::default();
            self.bounding_box = None;
        }
        self.status = result.status;
        self.message = result.message.clone();
        self
    }

    pub fn is_matched(&self) -> bool {
        self.status == MatchStatus::Ok
    }

    /// Joins `self` with the trip that directly follows it.
    ///
    /// Distances are summed, not re-matched. An error on either side stays
    /// on the result.
    pub fn absorb(self, next: Trip) -> Trip {
        let (status, message) = if self.is_matched() {
            (next.status, next.message)
        } else {
            (self.status, self.message)
        };
        let bounding_box = match (self.bounding_box, next.bounding_box) {
            (Some(a), Some(b)) => Some(a.union(&b)),
            (a, b) => a.or(b),
        };
        Trip {
            trajectory: self.trajectory.concat(&next.trajectory),
            bookend: TripBookend {
                start: self.bookend.start,
                stop: next.bookend.stop,
            },
            distance_miles: self.distance_miles + next.distance_miles,
            geometry: self.geometry.concat(&next.geometry),
            bounding_box,
            segments: self.segments + next.segments,
            status,
            message,
        }
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.bookend.start.leaving_time
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.bookend.stop.arrival_time
    }

    /// (lat, lng) of the stop the trip leaves from.
    pub fn start_location(&self) -> (f64, f64) {
        (self.bookend.start.latitude, self.bookend.start.longitude)
    }

    pub fn end_location(&self) -> (f64, f64) {
        (self.bookend.stop.latitude, self.bookend.stop.longitude)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Ok,
    Error,
}

/// Which flavour of map matching to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// One match request; the service's matchings are taken as-is.
    Plain,
    /// Low-confidence matchings, or a trace with no matchings at all, are
    /// replaced by point-to-point routes.
    ConfidenceFallback,
}

/// Outcome of one matcher invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub status: MatchStatus,
    pub distance_miles: f64,
    pub geometry: Polyline,
    pub bounding_box: Option<BoundingBox>,
    pub message: String,
}

impl MatchResult {
    /// Successful result from a distance in meters and a geometry.
    pub fn from_meters(distance_m: f64, geometry: Polyline) -> Self {
        let bounding_box = geometry.bounding_box();
        Self {
            status: MatchStatus::Ok,
            distance_miles: meters_to_miles(distance_m),
            geometry,
            bounding_box,
            message: String::new(),
        }
    }

    /// Zero distance, no geometry. What too-short input matches to.
    pub fn empty() -> Self {
        Self::from_meters(0.0, Polyline::default())
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: MatchStatus::Error,
            distance_miles: 0.0,
            geometry: Polyline::default(),
            bounding_box: None,
            message: message.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == MatchStatus::Ok
    }
}
