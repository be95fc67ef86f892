//! HTTP helpers shared by every adapter: client construction, failure
//! classification, and API key rotation.

use super::{CircuitBreaker, ProviderFailure, ProviderResult};
use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Blocking client whose every request is bounded by `timeout`.
pub fn build_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
}

/// Classify a transport error. Timeouts, refused connections and every other
/// transport failure count as `network_timeout`; a broken body is malformed.
pub fn classify_send_error(provider: &str, err: &reqwest::Error) -> ProviderFailure {
    if err.is_decode() || err.is_body() {
        ProviderFailure::malformed(provider, err.to_string())
    } else {
        ProviderFailure::timeout(provider, err.to_string())
    }
}

/// Classify a transport error and count it toward the breaker.
pub fn send_failure(provider: &str, err: &reqwest::Error, breaker: &CircuitBreaker) -> ProviderFailure {
    let failure = classify_send_error(provider, err);
    breaker.record_failure(&failure);
    failure
}

/// Map a non-success status to a failure, updating the breaker on the way.
pub fn check_status(provider: &str, status: StatusCode, breaker: &CircuitBreaker) -> ProviderResult<()> {
    if status.is_success() {
        return Ok(());
    }
    match status {
        StatusCode::FORBIDDEN => {
            let failure = ProviderFailure::rate_limited(provider, "HTTP 403, circuit breaker tripped");
            breaker.trip(&failure);
            Err(failure)
        }
        StatusCode::TOO_MANY_REQUESTS => {
            let failure = ProviderFailure::rate_limited(provider, "HTTP 429");
            breaker.record_failure(&failure);
            Err(failure)
        }
        StatusCode::UNAUTHORIZED => Err(ProviderFailure::unavailable(provider, "HTTP 401, credential rejected")),
        s if s.is_server_error() => {
            let failure = ProviderFailure::timeout(provider, format!("HTTP {s}"));
            breaker.record_failure(&failure);
            Err(failure)
        }
        s => Err(ProviderFailure::malformed(provider, format!("unexpected HTTP {s}"))),
    }
}

/// Read the whole body as text after checking the status.
pub fn read_body(provider: &str, resp: Response, breaker: &CircuitBreaker) -> ProviderResult<String> {
    check_status(provider, resp.status(), breaker)?;
    resp.text().map_err(|e| classify_send_error(provider, &e))
}

/// Decode a JSON body, classifying failures as malformed.
pub fn decode_json<T: serde::de::DeserializeOwned>(provider: &str, body: &str) -> ProviderResult<T> {
    serde_json::from_str(body).map_err(|e| ProviderFailure::malformed(provider, format!("invalid JSON: {e}")))
}

/// Round-robin rotation over one or more API keys.
#[derive(Debug, Default)]
pub struct KeyRing {
    keys: Vec<String>,
    next: AtomicUsize,
}

impl KeyRing {
    /// Blank keys are dropped.
    pub fn new(keys: Vec<String>) -> Self {
        let keys = keys
            .into_iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
        Self {
            keys,
            next: AtomicUsize::new(0),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Next key in rotation, or `None` if the ring is empty.
    pub fn next_key(&self) -> Option<&str> {
        if self.keys.is_empty() {
            return None;
        }
        let i = self.next.fetch_add(1, Ordering::Relaxed) % self.keys.len();
        Some(self.keys[i].as_str())
    }
}
