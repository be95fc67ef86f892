//! Per-adapter circuit breaker.
//!
//! An HTTP 403 (IP ban) opens the circuit at once; rate limits, 5xx answers
//! and transport failures open it after `failure_threshold` in a row. While
//! open, the adapter reports itself unavailable and names the failure that
//! opened the circuit, so skipped adapters still explain themselves in
//! `DataUnavailable` causes and news bundles.

use super::ProviderFailure;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    /// Refusing requests until `cooldown` has passed since `tripped_at`.
    Open {
        tripped_at: Instant,
        cause: ProviderFailure,
    },
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    consecutive_failures: u32,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    inner: Mutex<Inner>,
    cooldown: Duration,
    failure_threshold: u32,
}

impl CircuitBreaker {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
            }),
            cooldown,
            failure_threshold: 3,
        }
    }

    // A panic while holding the lock leaves a plain state behind; keep using it.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Closes an expired circuit on the way.
    pub fn is_allowed(&self) -> bool {
        let mut inner = self.lock();
        match &inner.state {
            BreakerState::Closed => true,
            BreakerState::Open { tripped_at, .. } => {
                if tripped_at.elapsed() >= self.cooldown {
                    inner.state = BreakerState::Closed;
                    inner.consecutive_failures = 0;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        self.lock().consecutive_failures = 0;
    }

    /// Count a throttling or transport failure toward the threshold.
    pub fn record_failure(&self, failure: &ProviderFailure) {
        let mut inner = self.lock();
        inner.consecutive_failures += 1;
        if inner.consecutive_failures >= self.failure_threshold {
            inner.state = BreakerState::Open {
                tripped_at: Instant::now(),
                cause: failure.clone(),
            };
        }
    }

    /// Open the circuit at once.
    pub fn trip(&self, failure: &ProviderFailure) {
        self.lock().state = BreakerState::Open {
            tripped_at: Instant::now(),
            cause: failure.clone(),
        };
    }

    /// Remaining cooldown time (zero if not tripped).
    pub fn remaining_cooldown(&self) -> Duration {
        match &self.lock().state {
            BreakerState::Closed => Duration::ZERO,
            BreakerState::Open { tripped_at, .. } => self.cooldown.saturating_sub(tripped_at.elapsed()),
        }
    }

    /// The `unavailable` failure to report for `provider` while the circuit is
    /// open, or `None` once it has closed.
    pub fn open_failure(&self, provider: &str) -> Option<ProviderFailure> {
        if self.is_allowed() {
            return None;
        }
        let inner = self.lock();
        match &inner.state {
            BreakerState::Open { tripped_at, cause } => {
                let remaining = self.cooldown.saturating_sub(tripped_at.elapsed());
                Some(ProviderFailure::unavailable(
                    provider,
                    format!(
                        "circuit open for another {}s after {}: {}",
                        remaining.as_secs(),
                        cause.kind,
                        cause.detail
                    ),
                ))
            }
            BreakerState::Closed => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::FailureKind;

    fn throttled() -> ProviderFailure {
        ProviderFailure::rate_limited("eastmoney", "HTTP 429")
    }

    #[test]
    fn starts_closed() {
        let cb = CircuitBreaker::new(Duration::from_secs(60));
        assert!(cb.is_allowed());
        assert_eq!(cb.remaining_cooldown(), Duration::ZERO);
        assert_eq!(cb.open_failure("eastmoney"), None);
    }

    #[test]
    fn opens_after_three_failures() {
        let cb = CircuitBreaker::new(Duration::from_secs(60));
        cb.record_failure(&throttled());
        cb.record_failure(&throttled());
        assert!(cb.is_allowed());
        cb.record_failure(&ProviderFailure::timeout("eastmoney", "HTTP 502"));
        assert!(!cb.is_allowed());
        assert!(cb.remaining_cooldown() > Duration::ZERO);
    }

    #[test]
    fn open_failure_names_the_cause() {
        let cb = CircuitBreaker::new(Duration::from_secs(600));
        cb.trip(&ProviderFailure::rate_limited("eastmoney", "HTTP 403"));
        let failure = cb.open_failure("eastmoney").unwrap();
        assert_eq!(failure.kind, FailureKind::Unavailable);
        assert_eq!(failure.provider, "eastmoney");
        assert!(failure.detail.starts_with("circuit open for another"));
        assert!(failure.detail.ends_with("after rate_limited: HTTP 403"));
    }

    #[test]
    fn success_resets_counter() {
        let cb = CircuitBreaker::new(Duration::from_secs(60));
        cb.record_failure(&throttled());
        cb.record_failure(&throttled());
        cb.record_success();
        cb.record_failure(&throttled());
        assert!(cb.is_allowed());
    }

    #[test]
    fn closes_after_cooldown() {
        let cb = CircuitBreaker::new(Duration::from_millis(10));
        cb.trip(&throttled());
        assert!(!cb.is_allowed());
        std::thread::sleep(Duration::from_millis(15));
        assert!(cb.is_allowed());
        assert_eq!(cb.open_failure("eastmoney"), None);
    }
}
