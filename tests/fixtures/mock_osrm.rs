//! Scripted stand-ins for the routing service.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use serde_json::json;

use shift_trips::error::TransportError;
use shift_trips::osrm::{OsrmClient, OsrmConfig, RetryPolicy};
use shift_trips::traits::{HttpResponse, HttpTransport};

/// One recorded request.
#[derive(Debug, Clone)]
pub struct Call {
    pub url: String,
    pub params: Vec<(String, String)>,
}

/// Replays responses in order and records every request.
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedTransport {
    pub fn new(responses: Vec<Result<HttpResponse, TransportError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl HttpTransport for ScriptedTransport {
    fn post(&self, url: &str, params: &[(&str, &str)]) -> Result<HttpResponse, TransportError> {
        self.calls.lock().unwrap().push(Call {
            url: url.to_string(),
            params: params.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        });
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Connection("script exhausted".to_string())))
    }
}

/// Answers every request with a closure of the URL.
pub struct FnTransport<F>(pub F);

impl<F> HttpTransport for FnTransport<F>
where
    F: Fn(&str) -> HttpResponse,
{
    fn post(&self, url: &str, _params: &[(&str, &str)]) -> Result<HttpResponse, TransportError> {
        Ok((self.0)(url))
    }
}

/// Config with millisecond backoff so retry tests stay fast.
pub fn fast_config() -> OsrmConfig {
    OsrmConfig {
        base_url: "http://osrm.test".to_string(),
        retry: RetryPolicy {
            base_backoff: Duration::from_millis(1),
            ..RetryPolicy::default()
        },
        ..OsrmConfig::default()
    }
}

pub fn client<T: HttpTransport>(transport: T) -> OsrmClient<T> {
    OsrmClient::with_transport(fast_config(), transport)
}

pub fn ok(body: serde_json::Value) -> Result<HttpResponse, TransportError> {
    Ok(HttpResponse::new(200, body.to_string()))
}

pub fn status(code: u16) -> Result<HttpResponse, TransportError> {
    Ok(HttpResponse::new(code, "<html>upstream error</html>"))
}

pub fn unreachable() -> Result<HttpResponse, TransportError> {
    Err(TransportError::Connection("connection refused".to_string()))
}

/// `/match` body with one matching per `(distance_m, confidence, coordinates)`.
pub fn match_body(matchings: &[(f64, f64, Vec<[f64; 2]>)]) -> serde_json::Value {
    let matchings: Vec<serde_json::Value> = matchings
        .iter()
        .map(|(distance, confidence, coordinates)| {
            json!({
                "distance": distance,
                "duration": distance / 10.0,
                "confidence": confidence,
                "geometry": { "type": "LineString", "coordinates": coordinates },
            })
        })
        .collect();
    json!({ "code": "Ok", "matchings": matchings, "tracepoints": [] })
}

/// `/route` body with a single route.
pub fn route_body(distance: f64, coordinates: Vec<[f64; 2]>) -> serde_json::Value {
    json!({
        "code": "Ok",
        "routes": [{
            "distance": distance,
            "duration": distance / 10.0,
            "geometry": { "type": "LineString", "coordinates": coordinates },
        }],
        "waypoints": [],
    })
}
