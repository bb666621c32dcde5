//! Error type for the trip pipeline.
//!
//! Only contract violations and setup problems surface here. Anything the
//! routing service reports is carried in a `MatchResult` instead.

use std::fmt;

#[derive(Debug)]
pub enum PipelineError {
    /// Stop detection or segmentation was asked to work on zero points,
    /// including a time window that clips every point away.
    EmptyTrajectory,
    /// A coordinate was NaN, infinite, or outside the valid lat/lng range.
    InvalidCoordinate { latitude: f64, longitude: f64 },
    /// A time window whose end precedes its start.
    InvalidTimeWindow,
    Config(String),
    Http(reqwest::Error),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::EmptyTrajectory => write!(f, "trajectory is empty"),
            PipelineError::InvalidCoordinate {
                latitude,
                longitude,
            } => write!(f, "invalid coordinate ({}, {})", latitude, longitude),
            PipelineError::InvalidTimeWindow => write!(f, "time window ends before it starts"),
            PipelineError::Config(msg) => write!(f, "configuration error: {}", msg),
            PipelineError::Http(err) => write!(f, "http client error: {}", err),
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PipelineError::Http(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for PipelineError {
    fn from(err: reqwest::Error) -> Self {
        PipelineError::Http(err)
    }
}

/// Failure to get any HTTP response out of the routing service.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportError {
    Connection(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Connection(msg) => write!(f, "connection error: {}", msg),
        }
    }
}

impl std::error::Error for TransportError {}
