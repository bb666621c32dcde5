//! Short-trip merging.

use tracing::debug;

use crate::model::Trip;

/// Folds trips of at most `min_distance_mi` into their neighbours.
///
/// Single greedy pass, left to right. A short trip joins the trip emitted
/// just before it. Short trips with nothing to join (at the head of the list,
/// or right after a failed trip) accumulate and are carried forward into the
/// next trip until the running distance clears the threshold. Merged
/// distances are the sum of the constituents' matched distances.
///
/// Trips whose match failed have no known distance, so they are never merged
/// and nothing is merged into them; they come back as-is, in order.
///
/// Every returned matched trip is longer than `min_distance_mi`, unless the
/// trips around it add up to less, in which case they come back as one.
pub fn merge_short_trips(trips: Vec<Trip>, min_distance_mi: f64) -> Vec<Trip> {
    let input = trips.len();
    let mut emitted: Vec<Trip> = Vec::with_capacity(input);
    let mut leading: Option<Trip> = None;

    for trip in trips {
        if !trip.is_matched() {
            emitted.extend(leading.take());
            emitted.push(trip);
            continue;
        }

        let trip = match leading.take() {
            Some(carried) => carried.absorb(trip),
            None => trip,
        };

        if trip.distance_miles > min_distance_mi {
            emitted.push(trip);
            continue;
        }

        match emitted.pop() {
            Some(previous) if previous.is_matched() => emitted.push(previous.absorb(trip)),
            Some(failed) => {
                emitted.push(failed);
                leading = Some(trip);
            }
            None => leading = Some(trip),
        }
    }

    emitted.extend(leading);

    debug!(input, output = emitted.len(), min_distance_mi, "merged short trips");
    emitted
}
