//! Splits a trajectory into draft trips between consecutive stops.

use tracing::debug;

use crate::error::PipelineError;
use crate::model::{StopInterval, TimeWindow, Trajectory, Trip, TripBookend};

/// Cuts `trajectory` into `stops.len() + 1` draft trips.
///
/// The first and last samples act as zero-length bookend stops. Each trip
/// holds the samples from its start stop's leaving time through its end
/// stop's arrival time, inclusive; samples strictly inside a stop belong to no
/// trip. With `window` set, the trajectory is first restricted to it and stops
/// outside it are ignored.
///
/// Trips may come back with no samples; matching treats those as zero
/// distance.
pub fn segment_trips(
    trajectory: &Trajectory,
    stops: &[StopInterval],
    window: Option<&TimeWindow>,
) -> Result<Vec<Trip>, PipelineError> {
    let clipped;
    let trajectory = match window {
        Some(window) => {
            clipped = trajectory.within(window);
            &clipped
        }
        None => trajectory,
    };

    let (Some(first), Some(last)) = (trajectory.first(), trajectory.last()) else {
        return Err(PipelineError::EmptyTrajectory);
    };

    let mut bookends = Vec::with_capacity(stops.len() + 2);
    bookends.push(StopInterval::at_sample(first));
    bookends.extend(
        stops
            .iter()
            .filter(|stop| {
                stop.leaving_time >= first.timestamp && stop.arrival_time <= last.timestamp
            })
            .map(|stop| StopInterval {
                arrival_time: stop.arrival_time.max(first.timestamp),
                leaving_time: stop.leaving_time.min(last.timestamp),
                ..stop.clone()
            }),
    );
    bookends.push(StopInterval::at_sample(last));

    let trips: Vec<Trip> = bookends
        .windows(2)
        .map(|pair| {
            let (start, stop) = (&pair[0], &pair[1]);
            Trip::draft(
                trajectory.between(start.leaving_time, stop.arrival_time),
                TripBookend {
                    start: start.clone(),
                    stop: stop.clone(),
                },
            )
        })
        .collect();

    debug!(stops = bookends.len() - 2, trips = trips.len(), "segmented trajectory");
    Ok(trips)
}
