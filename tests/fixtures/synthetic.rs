//! Synthetic GPS traces around the Las Vegas Strip.

use chrono::{DateTime, TimeZone, Utc};

use shift_trips::model::GeoSample;

/// Bellagio fountains.
pub const ORIGIN: (f64, f64) = (36.1126, -115.1767);

/// Kilometers per degree of latitude (equirectangular approximation).
const KM_PER_DEG: f64 = 111.32;

pub fn t(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

/// Seconds since the fixture epoch.
pub fn secs(time: DateTime<Utc>) -> i64 {
    (time - t(0)).num_seconds()
}

/// Moves a (lat, lng) point by the given offsets in kilometers.
pub fn offset_km((lat, lng): (f64, f64), north_km: f64, east_km: f64) -> (f64, f64) {
    let dlat = north_km / KM_PER_DEG;
    let dlng = east_km / (KM_PER_DEG * lat.to_radians().cos());
    (lat + dlat, lng + dlng)
}

/// Builds a trace step by step. The first sample sits at `start` at t=0.
pub struct TraceBuilder {
    samples: Vec<GeoSample>,
    position: (f64, f64),
    secs: i64,
}

impl TraceBuilder {
    pub fn new(start: (f64, f64)) -> Self {
        let first = GeoSample::new(start.0, start.1, t(0)).unwrap();
        Self {
            samples: vec![first],
            position: start,
            secs: 0,
        }
    }

    pub fn at_origin() -> Self {
        Self::new(ORIGIN)
    }

    fn push(&mut self, position: (f64, f64), interval_s: i64) {
        self.secs += interval_s;
        self.samples
            .push(GeoSample::new(position.0, position.1, t(self.secs)).unwrap());
    }

    /// `steps` samples, each `step_km` further east.
    pub fn drive_east(mut self, steps: usize, step_km: f64, interval_s: i64) -> Self {
        for _ in 0..steps {
            self.position = offset_km(self.position, 0.0, step_km);
            let position = self.position;
            self.push(position, interval_s);
        }
        self
    }

    /// `steps` samples, each `step_km` further north.
    pub fn drive_north(mut self, steps: usize, step_km: f64, interval_s: i64) -> Self {
        for _ in 0..steps {
            self.position = offset_km(self.position, step_km, 0.0);
            let position = self.position;
            self.push(position, interval_s);
        }
        self
    }

    /// `count` samples at the current position, alternating a few meters
    /// north and south of it.
    pub fn dwell(mut self, count: usize, interval_s: i64, jitter_km: f64) -> Self {
        for i in 0..count {
            let north = if i % 2 == 0 { jitter_km } else { -jitter_km };
            let position = offset_km(self.position, north, 0.0);
            self.push(position, interval_s);
        }
        self
    }

    /// Advances the clock without recording anything.
    pub fn silence(mut self, seconds: i64) -> Self {
        self.secs += seconds;
        self
    }

    pub fn elapsed(&self) -> i64 {
        self.secs
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn build(self) -> Vec<GeoSample> {
        self.samples
    }
}

/// 200 samples, 36 s apart (~2 hours), driving 0.6 km per sample with one
/// 15-minute dwell in the middle. The dwell starts at sample 88 and its last
/// sample is 113.
pub fn two_hour_shift_with_midpoint_stop() -> Vec<GeoSample> {
    TraceBuilder::at_origin()
        .drive_east(88, 0.6, 36)
        .dwell(25, 36, 0.004)
        .drive_north(86, 0.6, 36)
        .build()
}

/// 50 samples in a straight line at constant speed.
pub fn straight_drive(n: usize) -> Vec<GeoSample> {
    TraceBuilder::at_origin().drive_east(n - 1, 0.6, 36).build()
}
