//! Pipeline entry points: clean, detect stops, segment, match, merge.

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use tracing::{info, warn};

use crate::cleaner::{clean_trajectory, CleanParams};
use crate::error::PipelineError;
use crate::merge::merge_short_trips;
use crate::model::{GeoSample, MatchMode, MatchResult, TimeWindow, Trajectory, Trip};
use crate::segment::segment_trips;
use crate::stops::{detect_stops, StopParams};
use crate::traits::RouteMatcher;

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Trips at or under this many miles are merged into a neighbour.
    pub min_trip_distance_mi: f64,
    pub minutes_for_stop: i64,
    pub no_data_for_minutes: i64,
    pub stop_radius_km: f64,
    pub max_speed_kmh: f64,
    pub compression_radius_km: f64,
    /// Re-match merged trips as a whole instead of summing their parts.
    pub rematch_merged: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            min_trip_distance_mi: 1.0,
            minutes_for_stop: 5,
            no_data_for_minutes: 120,
            stop_radius_km: 0.5,
            max_speed_kmh: 500.0,
            compression_radius_km: 0.05,
            rematch_merged: false,
        }
    }
}

impl PipelineOptions {
    pub fn clean_params(&self) -> CleanParams {
        CleanParams {
            max_speed_kmh: self.max_speed_kmh,
            compression_radius_km: self.compression_radius_km,
        }
    }

    pub fn stop_params(&self) -> StopParams {
        StopParams {
            minutes_for_stop: self.minutes_for_stop,
            spatial_radius_km: self.stop_radius_km,
            no_data_for_minutes: self.no_data_for_minutes,
        }
    }
}

/// Input to the single-match pipeline.
#[derive(Debug, Clone, Copy)]
pub enum RouteInput<'a> {
    /// Raw location records; cleaned before matching.
    Locations(&'a [GeoSample]),
    /// An already-cleaned trajectory; matched as-is.
    Trajectory(&'a Trajectory),
}

impl<'a> From<&'a [GeoSample]> for RouteInput<'a> {
    fn from(locations: &'a [GeoSample]) -> Self {
        RouteInput::Locations(locations)
    }
}

impl<'a> From<&'a Trajectory> for RouteInput<'a> {
    fn from(trajectory: &'a Trajectory) -> Self {
        RouteInput::Trajectory(trajectory)
    }
}

/// Breaks a shift's locations into matched trips.
pub fn get_trips_from_locations<M>(
    locations: &[GeoSample],
    matcher: &M,
    options: &PipelineOptions,
) -> Result<Vec<Trip>, PipelineError>
where
    M: RouteMatcher + Sync,
{
    get_trips_within(locations, None, matcher, options)
}

/// Like `get_trips_from_locations`, but only keeps the part of the shift
/// inside `window`. Stops are still detected over the whole shift, so a
/// stop straddling the window edge is not lost.
pub fn get_trips_within<M>(
    locations: &[GeoSample],
    window: Option<&TimeWindow>,
    matcher: &M,
    options: &PipelineOptions,
) -> Result<Vec<Trip>, PipelineError>
where
    M: RouteMatcher + Sync,
{
    info!(locations = locations.len(), "extracting trips");
    let report = clean_trajectory(locations, &options.clean_params())?;
    let trajectory = report.trajectory;

    let in_window = window.map_or(trajectory.len(), |w| {
        trajectory.samples().iter().filter(|s| w.contains(s.timestamp)).count()
    });
    if in_window == 0 {
        return Ok(Vec::new());
    }

    let stops = detect_stops(&trajectory, &options.stop_params())?;
    let drafts = segment_trips(&trajectory, &stops, window)?;
    let drafted = drafts.len();

    let matched = match_trips(drafts, matcher)?;
    let mut trips = merge_short_trips(matched, options.min_trip_distance_mi);
    if options.rematch_merged {
        trips = rematch_merged(trips, matcher)?;
    }

    info!(
        filtered = report.filtered,
        compressed = report.compressed,
        stops = stops.len(),
        drafted,
        trips = trips.len(),
        unmatched = trips.iter().filter(|trip| !trip.is_matched()).count(),
        "extracted trips"
    );
    Ok(trips)
}

/// Matches each draft concurrently; order is preserved.
fn match_trips<M>(drafts: Vec<Trip>, matcher: &M) -> Result<Vec<Trip>, PipelineError>
where
    M: RouteMatcher + Sync,
{
    drafts
        .into_par_iter()
        .enumerate()
        .map(|(index, trip)| {
            let result = matcher.match_trajectory(&trip.trajectory, MatchMode::ConfidenceFallback)?;
            if !result.is_ok() {
                warn!(index, message = %result.message, "trip match failed, using zero distance");
            }
            Ok(trip.with_match(&result))
        })
        .collect()
}

fn rematch_merged<M>(trips: Vec<Trip>, matcher: &M) -> Result<Vec<Trip>, PipelineError>
where
    M: RouteMatcher + Sync,
{
    trips
        .into_par_iter()
        .map(|trip| {
            if trip.segments < 2 {
                return Ok(trip);
            }
            let result = matcher.match_trajectory(&trip.trajectory, MatchMode::ConfidenceFallback)?;
            if result.is_ok() {
                Ok(trip.with_match(&result))
            } else {
                warn!(
                    message = %result.message,
                    "re-match of merged trip failed, keeping summed distance"
                );
                Ok(trip)
            }
        })
        .collect()
}

/// One match over the whole input, for shift-level mileage.
///
/// Inputs too short to match come back as an ok result with zero distance
/// and no geometry.
pub fn get_route_distance_and_geometry<'a, M>(
    input: impl Into<RouteInput<'a>>,
    matcher: &M,
    options: &PipelineOptions,
) -> Result<MatchResult, PipelineError>
where
    M: RouteMatcher,
{
    let cleaned;
    let trajectory = match input.into() {
        RouteInput::Locations(locations) => {
            cleaned = clean_trajectory(locations, &options.clean_params())?.trajectory;
            &cleaned
        }
        RouteInput::Trajectory(trajectory) => trajectory,
    };

    if trajectory.len() < 2 {
        return Ok(MatchResult::empty());
    }

    info!(points = trajectory.len(), "matching route");
    let result = matcher.match_trajectory(trajectory, MatchMode::Plain)?;
    if !result.is_ok() {
        warn!(message = %result.message, "failed to match route");
    }
    Ok(result)
}

/// Mileage for one job: the shift's locations between `start` and `end`
/// (or now, for a job still running). Needs more than two locations. A
/// running job whose start is ahead of the local clock matches to the empty
/// result.
pub fn get_job_distance_and_geometry<M>(
    locations: &[GeoSample],
    start: DateTime<Utc>,
    end: Option<DateTime<Utc>>,
    matcher: &M,
    options: &PipelineOptions,
) -> Result<MatchResult, PipelineError>
where
    M: RouteMatcher,
{
    let end = match end {
        Some(end) => end,
        None => {
            let now = Utc::now();
            if start > now {
                warn!(%start, %now, "job starts in the future, no mileage");
                return Ok(MatchResult::empty());
            }
            now
        }
    };
    let window = TimeWindow::new(start, end)?;
    let job_locations: Vec<GeoSample> = locations
        .iter()
        .filter(|l| window.contains(l.timestamp))
        .cloned()
        .collect();

    if job_locations.len() <= 2 {
        return Ok(MatchResult::empty());
    }
    get_route_distance_and_geometry(job_locations.as_slice(), matcher, options)
}
