//! Stop detection over a cleaned trajectory.

use chrono::Duration;
use tracing::debug;

use crate::error::PipelineError;
use crate::haversine::haversine_km;
use crate::model::{GeoSample, StopInterval, Trajectory};

#[derive(Debug, Clone)]
pub struct StopParams {
    /// Minimum dwell inside the radius for a stop.
    pub minutes_for_stop: i64,
    pub spatial_radius_km: f64,
    /// Gaps between samples longer than this are treated as stops.
    pub no_data_for_minutes: i64,
}

impl Default for StopParams {
    fn default() -> Self {
        Self {
            minutes_for_stop: 5,
            spatial_radius_km: 0.5,
            no_data_for_minutes: 120,
        }
    }
}

/// Finds stops in a time-ordered trajectory.
///
/// A stop is a maximal run of samples that all lie within `spatial_radius_km`
/// of the run's first sample and span at least `minutes_for_stop`. A gap in
/// the data longer than `no_data_for_minutes` ends the run and is itself
/// counted as part of a stop: the device is assumed to have stayed where it
/// was last seen until the next sample arrived.
///
/// Stops come back ordered by arrival and never overlap. An empty trajectory
/// is an error.
pub fn detect_stops(
    trajectory: &Trajectory,
    params: &StopParams,
) -> Result<Vec<StopInterval>, PipelineError> {
    if trajectory.is_empty() {
        return Err(PipelineError::EmptyTrajectory);
    }

    let samples = trajectory.samples();
    let min_dwell = Duration::minutes(params.minutes_for_stop);
    let max_gap = Duration::minutes(params.no_data_for_minutes);
    let mut stops = Vec::new();

    let mut i = 0;
    while i < samples.len() {
        let anchor = &samples[i];
        let mut j = i + 1;
        let mut gap_follows = false;
        while j < samples.len() {
            if samples[j].timestamp - samples[j - 1].timestamp > max_gap {
                gap_follows = true;
                break;
            }
            if haversine_km(anchor.lat_lng(), samples[j].lat_lng()) > params.spatial_radius_km {
                break;
            }
            j += 1;
        }

        let last = &samples[j - 1];
        let dwelt = j - 1 > i && last.timestamp - anchor.timestamp >= min_dwell;

        if dwelt {
            let (latitude, longitude) = representative(&samples[i..j]);
            let leaving_time = if gap_follows {
                samples[j].timestamp
            } else {
                last.timestamp
            };
            stops.push(StopInterval {
                latitude,
                longitude,
                arrival_time: anchor.timestamp,
                leaving_time,
            });
            i = j;
        } else if gap_follows {
            stops.push(StopInterval {
                latitude: last.latitude,
                longitude: last.longitude,
                arrival_time: last.timestamp,
                leaving_time: samples[j].timestamp,
            });
            i = j;
        } else {
            i += 1;
        }
    }

    debug!(samples = samples.len(), stops = stops.len(), "detected stops");
    Ok(stops)
}

/// Median latitude and longitude of a run.
fn representative(run: &[GeoSample]) -> (f64, f64) {
    let mut lats: Vec<f64> = run.iter().map(|s| s.latitude).collect();
    let mut lngs: Vec<f64> = run.iter().map(|s| s.longitude).collect();
    (median(&mut lats), median(&mut lngs))
}

fn median(values: &mut [f64]) -> f64 {
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn sample(lat: f64, lng: f64, secs: i64) -> GeoSample {
        GeoSample::new(lat, lng, t(secs)).unwrap()
    }

    fn params(minutes: i64) -> StopParams {
        StopParams {
            minutes_for_stop: minutes,
            spatial_radius_km: 0.5,
            no_data_for_minutes: 120,
        }
    }

    #[test]
    fn test_empty_trajectory_is_error() {
        let result = detect_stops(&Trajectory::default(), &params(5));
        assert!(matches!(result, Err(PipelineError::EmptyTrajectory)));
    }

    #[test]
    fn test_single_sample_has_no_stops() {
        let traj = Trajectory::new(vec![sample(36.0, -115.0, 0)]);
        assert!(detect_stops(&traj, &params(5)).unwrap().is_empty());
    }

    #[test]
    fn test_constant_drive_has_no_stops() {
        // 1.1 km per minute
        let traj = Trajectory::new(
            (0..30)
                .map(|i| sample(36.0 + 0.01 * i as f64, -115.0, 60 * i))
                .collect(),
        );
        assert!(detect_stops(&traj, &params(2)).unwrap().is_empty());
    }

    #[test]
    fn test_detects_dwell() {
        let mut samples: Vec<GeoSample> = (0..5)
            .map(|i| sample(36.0 + 0.01 * i as f64, -115.0, 60 * i))
            .collect();
        // parked at 36.05 from t=300 to t=1200
        samples.push(sample(36.05, -115.0, 300));
        samples.push(sample(36.05001, -115.0, 750));
        samples.push(sample(36.05, -115.0, 1200));
        samples.extend((1..5).map(|i| sample(36.05 + 0.01 * i as f64, -115.0, 1200 + 60 * i)));

        let stops = detect_stops(&Trajectory::new(samples), &params(10)).unwrap();
        assert_eq!(stops.len(), 1);
        assert_eq!(stops[0].arrival_time, t(300));
        assert_eq!(stops[0].leaving_time, t(1200));
        assert!((stops[0].latitude - 36.05).abs() < 1e-4);
    }

    #[test]
    fn test_short_dwell_is_not_a_stop() {
        let samples = vec![
            sample(36.0, -115.0, 0),
            sample(36.0, -115.0, 60),
            sample(36.0, -115.0, 120),
            sample(36.1, -115.0, 600),
        ];
        assert!(detect_stops(&Trajectory::new(samples), &params(5)).unwrap().is_empty());
    }

    #[test]
    fn test_data_gap_becomes_stop() {
        let samples = vec![
            sample(36.0, -115.0, 0),
            sample(36.01, -115.0, 60),
            // three hours of silence
            sample(36.5, -115.0, 60 + 3 * 3600),
            sample(36.51, -115.0, 120 + 3 * 3600),
        ];
        let stops = detect_stops(&Trajectory::new(samples), &params(5)).unwrap();
        assert_eq!(stops.len(), 1);
        assert_eq!(stops[0].arrival_time, t(60));
        assert_eq!(stops[0].leaving_time, t(60 + 3 * 3600));
        assert_eq!(stops[0].latitude, 36.01);
    }

    #[test]
    fn test_dwell_before_gap_extends_to_next_sample() {
        let samples = vec![
            sample(36.0, -115.0, 0),
            sample(36.0, -115.0, 600),
            sample(36.5, -115.0, 600 + 3 * 3600),
        ];
        let stops = detect_stops(&Trajectory::new(samples), &params(5)).unwrap();
        assert_eq!(stops.len(), 1);
        assert_eq!(stops[0].arrival_time, t(0));
        assert_eq!(stops[0].leaving_time, t(600 + 3 * 3600));
    }

    #[test]
    fn test_stops_are_ordered_and_disjoint() {
        let mut samples = Vec::new();
        let mut secs = 0;
        for leg in 0..3 {
            let base = 36.0 + 0.2 * leg as f64;
            for i in 0..5 {
                samples.push(sample(base + 0.01 * i as f64, -115.0, secs));
                secs += 60;
            }
            for _ in 0..4 {
                samples.push(sample(base + 0.05, -115.0, secs));
                secs += 300;
            }
        }
        let stops = detect_stops(&Trajectory::new(samples), &params(10)).unwrap();
        assert_eq!(stops.len(), 3);
        for pair in stops.windows(2) {
            assert!(pair[0].arrival_time <= pair[0].leaving_time);
            assert!(pair[0].leaving_time <= pair[1].arrival_time);
        }
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&mut [3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&mut [4.0, 1.0, 2.0, 3.0]), 2.5);
    }
}
