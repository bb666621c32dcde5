//! OSRM HTTP adapter for map matching and point-to-point routing.

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{PipelineError, TransportError};
use crate::model::{MatchMode, MatchResult, Trajectory};
use crate::polyline::Polyline;
use crate::traits::{HttpResponse, HttpTransport, RouteMatcher};

pub const CONNECTION_ERROR: &str = "Connection error";
pub const SERVICE_UNAVAILABLE: &str = "routing service unavailable";
pub const TRACE_TOO_LARGE: &str = "trace too large";
pub const FAILED_TO_MATCH: &str = "failed to match route";
pub const INVALID_RESPONSE: &str = "invalid response from routing service";

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Sleep before the first retry; doubles for each retry after.
    pub base_backoff: Duration,
    /// HTTP statuses worth retrying.
    pub retry_statuses: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_backoff: Duration::from_millis(100),
            retry_statuses: vec![500, 502, 503, 504],
        }
    }
}

impl RetryPolicy {
    /// Sleep before retry number `retry` (1-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        self.base_backoff * 2u32.saturating_pow(retry.saturating_sub(1))
    }

    pub fn should_retry(&self, status: u16) -> bool {
        self.retry_statuses.contains(&status)
    }
}

#[derive(Debug, Clone)]
pub struct OsrmConfig {
    pub base_url: String,
    pub profile: String,
    pub timeout_secs: u64,
    /// Matchings at or below this confidence are replaced by a route.
    pub min_confidence: f64,
    pub retry: RetryPolicy,
}

impl Default for OsrmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            profile: "car".to_string(),
            timeout_secs: 10,
            min_confidence: 0.5,
            retry: RetryPolicy::default(),
        }
    }
}

impl OsrmConfig {
    /// Reads `OSRM_URI` (required) and `OSRM_PROFILE` (optional).
    pub fn from_env() -> Result<Self, PipelineError> {
        let base_url = std::env::var("OSRM_URI")
            .map_err(|_| PipelineError::Config("OSRM_URI is not set".to_string()))?;
        let mut config = Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            ..Self::default()
        };
        if let Ok(profile) = std::env::var("OSRM_PROFILE") {
            config.profile = profile;
        }
        Ok(config)
    }
}

/// Blocking reqwest transport. The inner client pools connections, so build
/// one per process and share it.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    pub fn new(timeout_secs: u64) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self { client })
    }
}

impl HttpTransport for ReqwestTransport {
    fn post(&self, url: &str, params: &[(&str, &str)]) -> Result<HttpResponse, TransportError> {
        let response = self
            .client
            .post(url)
            .query(params)
            .send()
            .map_err(|err| TransportError::Connection(err.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|err| TransportError::Connection(err.to_string()))?;
        Ok(HttpResponse { status, body })
    }
}

/// What became of one matching segment.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    Matched {
        distance_m: f64,
        geometry: Polyline,
        confidence: f64,
    },
    Routed {
        distance_m: f64,
        geometry: Polyline,
    },
    Failed(String),
}

impl MatchOutcome {
    fn geometry(&self) -> Option<&Polyline> {
        match self {
            MatchOutcome::Matched { geometry, .. } | MatchOutcome::Routed { geometry, .. } => {
                Some(geometry)
            }
            MatchOutcome::Failed(_) => None,
        }
    }
}

/// Sums distances and concatenates geometry of the usable outcomes.
/// Meters become miles here and nowhere else.
pub fn combine_outcomes(outcomes: &[MatchOutcome]) -> MatchResult {
    let mut distance_m = 0.0;
    let mut geometry = Polyline::default();
    for outcome in outcomes {
        match outcome {
            MatchOutcome::Matched {
                distance_m: d,
                geometry: g,
                ..
            }
            | MatchOutcome::Routed {
                distance_m: d,
                geometry: g,
            } => {
                distance_m += d;
                geometry.extend(g);
            }
            MatchOutcome::Failed(_) => {}
        }
    }
    MatchResult::from_meters(distance_m, geometry)
}

#[derive(Debug, Deserialize)]
struct OsrmMatchResponse {
    code: String,
    #[serde(default)]
    matchings: Option<Vec<OsrmMatching>>,
}

#[derive(Debug, Deserialize)]
struct OsrmMatching {
    distance: f64,
    #[serde(default)]
    confidence: f64,
    geometry: OsrmGeometry,
}

#[derive(Debug, Deserialize)]
struct OsrmRouteResponse {
    #[serde(default)]
    routes: Option<Vec<OsrmRoute>>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    distance: f64,
    geometry: OsrmGeometry,
}

#[derive(Debug, Deserialize)]
struct OsrmGeometry {
    coordinates: Vec<[f64; 2]>,
}

impl From<OsrmMatching> for MatchOutcome {
    fn from(matching: OsrmMatching) -> Self {
        MatchOutcome::Matched {
            distance_m: matching.distance,
            geometry: Polyline::new(matching.geometry.coordinates),
            confidence: matching.confidence,
        }
    }
}

/// `lng,lat;lng,lat;...` path segment.
pub fn coordinate_path(points: &[[f64; 2]]) -> String {
    points
        .iter()
        .map(|[lng, lat]| format!("{:.6},{:.6}", lng, lat))
        .collect::<Vec<_>>()
        .join(";")
}

#[derive(Debug, Clone)]
pub struct OsrmClient<T = ReqwestTransport> {
    config: OsrmConfig,
    transport: T,
}

impl OsrmClient<ReqwestTransport> {
    pub fn new(config: OsrmConfig) -> Result<Self, reqwest::Error> {
        let transport = ReqwestTransport::new(config.timeout_secs)?;
        Ok(Self { config, transport })
    }

    /// Client for the service named by `OSRM_URI`.
    pub fn from_env() -> Result<Self, PipelineError> {
        let config = OsrmConfig::from_env()?;
        Ok(Self::new(config)?)
    }
}

impl<T: HttpTransport> OsrmClient<T> {
    pub fn with_transport(config: OsrmConfig, transport: T) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &OsrmConfig {
        &self.config
    }

    /// POSTs with the configured retry policy. After the last attempt the
    /// failure is reduced to a message for a `MatchResult`.
    fn post_with_retry(
        &self,
        url: &str,
        params: &[(&str, &str)],
    ) -> Result<HttpResponse, &'static str> {
        let policy = &self.config.retry;
        let mut failure = CONNECTION_ERROR;

        for attempt in 1..=policy.max_attempts {
            match self.transport.post(url, params) {
                Ok(response) if policy.should_retry(response.status) => {
                    warn!(attempt, status = response.status, "routing service error");
                    failure = SERVICE_UNAVAILABLE;
                }
                Ok(response) => return Ok(response),
                Err(err) => {
                    warn!(attempt, error = %err, "routing service unreachable");
                    failure = CONNECTION_ERROR;
                }
            }

            if attempt < policy.max_attempts {
                let backoff = policy.backoff(attempt);
                debug!(attempt, ?backoff, "retrying routing request");
                std::thread::sleep(backoff);
            }
        }

        Err(failure)
    }

    fn request_match(&self, points: &[[f64; 2]]) -> Result<OsrmMatchResponse, &'static str> {
        let url = format!(
            "{}/match/v1/{}/{}",
            self.config.base_url,
            self.config.profile,
            coordinate_path(points)
        );
        let params = [
            ("geometries", "geojson"),
            ("tidy", "true"),
            ("gaps", "ignore"),
            ("overview", "full"),
        ];
        debug!(points = points.len(), "requesting map match");
        let response = self.post_with_retry(&url, &params)?;
        serde_json::from_str(&response.body).map_err(|err| {
            warn!(status = response.status, error = %err, "unreadable match response");
            INVALID_RESPONSE
        })
    }

    /// Point-to-point route between two `[lng, lat]` points.
    pub fn route_between(&self, from: [f64; 2], to: [f64; 2]) -> MatchOutcome {
        let url = format!(
            "{}/route/v1/{}/{}",
            self.config.base_url,
            self.config.profile,
            coordinate_path(&[from, to])
        );
        let params = [("geometries", "geojson"), ("overview", "full")];

        let response = match self.post_with_retry(&url, &params) {
            Ok(response) => response,
            Err(reason) => return MatchOutcome::Failed(reason.to_string()),
        };
        let body: OsrmRouteResponse = match serde_json::from_str(&response.body) {
            Ok(body) => body,
            Err(_) => return MatchOutcome::Failed(INVALID_RESPONSE.to_string()),
        };
        match body.routes.and_then(|routes| routes.into_iter().next()) {
            Some(route) => MatchOutcome::Routed {
                distance_m: route.distance,
                geometry: Polyline::new(route.geometry.coordinates),
            },
            None => MatchOutcome::Failed("no route found".to_string()),
        }
    }

    /// Swaps each low-confidence matching for a route that starts where the
    /// geometry so far ends (or at the matching's own first point, if it is
    /// the first) and ends at the matching's last point. A matching whose
    /// route cannot be fetched is kept as-is.
    fn replace_low_confidence(&self, matchings: Vec<OsrmMatching>) -> Vec<MatchOutcome> {
        let mut outcomes: Vec<MatchOutcome> = Vec::with_capacity(matchings.len());
        let mut last_point: Option<[f64; 2]> = None;

        for (index, matching) in matchings.into_iter().enumerate() {
            let confidence = matching.confidence;
            let matched = MatchOutcome::from(matching);

            let outcome = if confidence > self.config.min_confidence {
                matched
            } else {
                let geometry = matched.geometry().cloned().unwrap_or_default();
                match (last_point.or(geometry.first()), geometry.last()) {
                    (Some(from), Some(to)) => {
                        info!(index, confidence, "routing around low-confidence matching");
                        match self.route_between(from, to) {
                            routed @ MatchOutcome::Routed { .. } => routed,
                            _ => {
                                warn!(index, "fallback route failed, keeping matching");
                                matched
                            }
                        }
                    }
                    _ => matched,
                }
            };

            if let Some(point) = outcome.geometry().and_then(Polyline::last) {
                last_point = Some(point);
            }
            outcomes.push(outcome);
        }

        outcomes
    }
}

impl<T: HttpTransport> RouteMatcher for OsrmClient<T> {
    fn match_trajectory(
        &self,
        trajectory: &Trajectory,
        mode: MatchMode,
    ) -> Result<MatchResult, PipelineError> {
        trajectory.validate()?;
        if trajectory.len() < 2 {
            return Ok(MatchResult::empty());
        }

        let points: Vec<[f64; 2]> = trajectory.to_polyline().into_points();
        let response = match self.request_match(&points) {
            Ok(response) => response,
            Err(reason) => return Ok(MatchResult::error(reason)),
        };

        if response.code == "TooBig" {
            warn!(points = points.len(), "trace too large to match");
            return Ok(MatchResult::error(TRACE_TOO_LARGE));
        }

        let matchings = response.matchings.unwrap_or_default();
        if matchings.is_empty() {
            warn!(code = %response.code, "no matchings returned");
            if mode == MatchMode::Plain {
                return Ok(MatchResult::error(FAILED_TO_MATCH));
            }
            let (Some(&from), Some(&to)) = (points.first(), points.last()) else {
                return Ok(MatchResult::error(FAILED_TO_MATCH));
            };
            return Ok(match self.route_between(from, to) {
                routed @ MatchOutcome::Routed { .. } => combine_outcomes(&[routed]),
                _ => MatchResult::error(FAILED_TO_MATCH),
            });
        }

        let outcomes: Vec<MatchOutcome> = match mode {
            MatchMode::Plain => matchings.into_iter().map(MatchOutcome::from).collect(),
            MatchMode::ConfidenceFallback => self.replace_low_confidence(matchings),
        };
        Ok(combine_outcomes(&outcomes))
    }
}
