//! Seams between the pipeline and the outside world.
//!
//! The pipeline only ever talks to a `RouteMatcher`; the OSRM client in turn
//! only talks to an `HttpTransport`, so both can be swapped out in tests.

use crate::error::{PipelineError, TransportError};
use crate::model::{MatchMode, MatchResult, Trajectory};

/// Turns a trajectory into a road distance and geometry.
///
/// Service-level failures come back as `MatchStatus::Error`; `Err` is reserved
/// for malformed input such as NaN coordinates.
pub trait RouteMatcher {
    fn match_trajectory(
        &self,
        trajectory: &Trajectory,
        mode: MatchMode,
    ) -> Result<MatchResult, PipelineError>;
}

impl<T: RouteMatcher + ?Sized> RouteMatcher for &T {
    fn match_trajectory(
        &self,
        trajectory: &Trajectory,
        mode: MatchMode,
    ) -> Result<MatchResult, PipelineError> {
        (**self).match_trajectory(trajectory, mode)
    }
}

/// Raw HTTP response from the routing service.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Sends a single POST. Retries are the caller's business.
pub trait HttpTransport {
    fn post(&self, url: &str, params: &[(&str, &str)]) -> Result<HttpResponse, TransportError>;
}

impl<T: HttpTransport + ?Sized> HttpTransport for &T {
    fn post(&self, url: &str, params: &[(&str, &str)]) -> Result<HttpResponse, TransportError> {
        (**self).post(url, params)
    }
}
