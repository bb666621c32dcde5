//! Trajectory cleaning: sort, drop speed outliers, compress near-duplicates.

use tracing::debug;

use crate::error::PipelineError;
use crate::haversine::{haversine_km, speed_kmh};
use crate::model::{GeoSample, Trajectory};

#[derive(Debug, Clone)]
pub struct CleanParams {
    /// Samples implying a faster jump than this from the last kept sample are dropped.
    pub max_speed_kmh: f64,
    /// Runs of samples within this radius of the run's first sample collapse.
    pub compression_radius_km: f64,
}

impl Default for CleanParams {
    fn default() -> Self {
        Self {
            max_speed_kmh: 500.0,
            compression_radius_km: 0.05,
        }
    }
}

/// Cleaned trajectory plus how many samples each step removed.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanReport {
    pub trajectory: Trajectory,
    pub filtered: usize,
    pub compressed: usize,
}

impl CleanReport {
    pub fn dropped(&self) -> usize {
        self.filtered + self.compressed
    }
}

/// Sorts `samples` by time, then filters and compresses them.
///
/// Fewer than two samples come back sorted but otherwise untouched. Invalid
/// coordinates are an error.
pub fn clean_trajectory(
    samples: &[GeoSample],
    params: &CleanParams,
) -> Result<CleanReport, PipelineError> {
    samples.iter().try_for_each(GeoSample::validate)?;
    let sorted = Trajectory::from_unsorted(samples.to_vec());

    if sorted.len() < 2 {
        return Ok(CleanReport {
            trajectory: sorted,
            filtered: 0,
            compressed: 0,
        });
    }

    let total = sorted.len();
    let filtered = filter_by_speed(sorted.samples(), params.max_speed_kmh);
    let after_filter = filtered.len();
    let compressed = compress(&filtered, params.compression_radius_km);

    let report = CleanReport {
        filtered: total - after_filter,
        compressed: after_filter - compressed.len(),
        trajectory: Trajectory::new(compressed),
    };
    debug!(
        total,
        filtered = report.filtered,
        compressed = report.compressed,
        remaining = report.trajectory.len(),
        "cleaned trajectory"
    );
    Ok(report)
}

/// Keeps the first sample, then every sample reachable from the previously
/// kept one without exceeding `max_speed_kmh`.
fn filter_by_speed(samples: &[GeoSample], max_speed_kmh: f64) -> Vec<GeoSample> {
    let mut kept: Vec<GeoSample> = Vec::with_capacity(samples.len());
    for sample in samples {
        match kept.last() {
            Some(prev) if speed_kmh(prev, sample) > max_speed_kmh => {}
            _ => kept.push(sample.clone()),
        }
    }
    kept
}

/// Collapses each run of samples that stay within `radius_km` of the run's
/// first sample down to that first sample and, if later in time, the run's
/// last sample. Keeping both ends preserves how long the device dwelt.
fn compress(samples: &[GeoSample], radius_km: f64) -> Vec<GeoSample> {
    let mut out = Vec::with_capacity(samples.len());
    let mut i = 0;
    while i < samples.len() {
        let anchor = &samples[i];
        let mut j = i + 1;
        while j < samples.len()
            && haversine_km(anchor.lat_lng(), samples[j].lat_lng()) <= radius_km
        {
            j += 1;
        }
        out.push(anchor.clone());
        let tail = &samples[j - 1];
        if j - 1 > i && tail.timestamp > anchor.timestamp {
            out.push(tail.clone());
        }
        i = j;
    }
    out
}
