//! shift-trips core
//!
//! Turns a shift's raw GPS pings into discrete trips with road-snapped
//! mileage: clean, detect stops, segment, map-match, merge short trips.

pub mod error;
pub mod model;
pub mod polyline;
pub mod haversine;
pub mod cleaner;
pub mod stops;
pub mod segment;
pub mod merge;
pub mod traits;
pub mod osrm;
pub mod osrm_data;
pub mod pipeline;

pub use error::PipelineError;
pub use model::{
    GeoSample, MatchMode, MatchResult, MatchStatus, StopInterval, TimeWindow, Trajectory, Trip,
    TripBookend,
};
pub use pipeline::{get_route_distance_and_geometry, get_trips_from_locations, PipelineOptions};
