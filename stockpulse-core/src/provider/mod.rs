//! Shared ProviderAdapter plumbing for market-data and news sources.
//!
//! Every adapter reports the same classified failure so orchestrators never
//! special-case a specific upstream.

pub mod circuit_breaker;
pub mod http;

pub use circuit_breaker::CircuitBreaker;
pub use http::{build_client, KeyRing};

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Why a single adapter call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Timeout, refused connection, or any other transport-level failure.
    NetworkTimeout,
    EmptyResult,
    RateLimited,
    MalformedResponse,
    /// Missing or rejected credential, or the adapter is switched off.
    Unavailable,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::NetworkTimeout => "network_timeout",
            FailureKind::EmptyResult => "empty_result",
            FailureKind::RateLimited => "rate_limited",
            FailureKind::MalformedResponse => "malformed_response",
            FailureKind::Unavailable => "unavailable",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified failure from one named adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{provider}: {kind} ({detail})")]
pub struct ProviderFailure {
    pub provider: String,
    pub kind: FailureKind,
    pub detail: String,
}

impl ProviderFailure {
    pub fn new(provider: impl Into<String>, kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            kind,
            detail: detail.into(),
        }
    }

    pub fn timeout(provider: &str, detail: impl Into<String>) -> Self {
        Self::new(provider, FailureKind::NetworkTimeout, detail)
    }

    pub fn empty(provider: &str, detail: impl Into<String>) -> Self {
        Self::new(provider, FailureKind::EmptyResult, detail)
    }

    pub fn rate_limited(provider: &str, detail: impl Into<String>) -> Self {
        Self::new(provider, FailureKind::RateLimited, detail)
    }

    pub fn malformed(provider: &str, detail: impl Into<String>) -> Self {
        Self::new(provider, FailureKind::MalformedResponse, detail)
    }

    pub fn unavailable(provider: &str, detail: impl Into<String>) -> Self {
        Self::new(provider, FailureKind::Unavailable, detail)
    }
}

/// Tagged outcome of one adapter call.
pub type ProviderResult<T> = Result<T, ProviderFailure>;
