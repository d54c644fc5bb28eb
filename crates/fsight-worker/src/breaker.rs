//! Circuit breaker for the downstream analysis service.
//!
//! Counts consecutive downstream failures and fails fast once a threshold
//! is reached, so a degraded service is not hammered by the worker pool.
//! After the cooldown window a probe attempt is let through: one success
//! closes the breaker, one failure re-opens it and restarts the cooldown.

use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

/// Circuit breaker states.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BreakerState {
    /// Normal operation
    Closed,
    /// Failing fast since `opened_at`
    Open { opened_at: Instant },
}

struct BreakerInner {
    state: BreakerState,
    consecutive_failures: u32,
}

/// Failure-counting gate in front of the analysis gateway.
#[derive(Clone)]
pub struct CircuitBreaker {
    inner: Arc<RwLock<BreakerInner>>,
    failure_threshold: u32,
    cooldown: Duration,
}

impl CircuitBreaker {
    /// Create a new breaker.
    pub fn new(failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            inner: Arc::new(RwLock::new(BreakerInner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
            })),
            failure_threshold,
            cooldown,
        }
    }

    /// Check if an attempt may reach the gateway.
    ///
    /// While open, returns false until the cooldown has elapsed; after
    /// that a probe is allowed through without closing the breaker (the
    /// probe's outcome decides).
    pub fn allow(&self) -> bool {
        let inner = self.inner.read().expect("breaker lock poisoned");
        match inner.state {
            BreakerState::Closed => true,
            BreakerState::Open { opened_at } => opened_at.elapsed() > self.cooldown,
        }
    }

    /// Record a successful downstream call.
    pub fn record_success(&self) {
        let mut inner = self.inner.write().expect("breaker lock poisoned");
        inner.consecutive_failures = 0;
        inner.state = BreakerState::Closed;
    }

    /// Record a failed downstream call.
    pub fn record_failure(&self) {
        let mut inner = self.inner.write().expect("breaker lock poisoned");
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
        if inner.consecutive_failures >= self.failure_threshold {
            inner.state = BreakerState::Open {
                opened_at: Instant::now(),
            };
        }
    }

    /// Check whether the breaker is open.
    pub fn is_open(&self) -> bool {
        matches!(
            self.inner.read().expect("breaker lock poisoned").state,
            BreakerState::Open { .. }
        )
    }

    /// Current state for monitoring.
    pub fn state(&self) -> BreakerState {
        self.inner.read().expect("breaker lock poisoned").state
    }

    /// Consecutive downstream failures since the last success.
    pub fn consecutive_failures(&self) -> u32 {
        self.inner
            .read()
            .expect("breaker lock poisoned")
            .consecutive_failures
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opens_after_exactly_threshold_failures() {
        let breaker = CircuitBreaker::new(3, Duration::from_secs(60));

        breaker.record_failure();
        breaker.record_failure();
        assert!(breaker.allow());
        assert!(!breaker.is_open());

        breaker.record_failure();
        assert!(breaker.is_open());
        assert!(!breaker.allow());
        assert_eq!(breaker.consecutive_failures(), 3);
    }

    #[test]
    fn test_success_resets_counter_and_closes() {
        let breaker = CircuitBreaker::new(3, Duration::from_secs(60));

        breaker.record_failure();
        breaker.record_failure();
        breaker.record_failure();
        assert!(breaker.is_open());

        breaker.record_success();
        assert!(!breaker.is_open());
        assert_eq!(breaker.consecutive_failures(), 0);
        assert!(breaker.allow());
    }

    #[test]
    fn test_cooldown_allows_a_probe() {
        let breaker = CircuitBreaker::new(1, Duration::from_millis(20));

        breaker.record_failure();
        assert!(!breaker.allow());

        std::thread::sleep(Duration::from_millis(30));
        // Cooldown elapsed: the probe is allowed while the breaker stays open.
        assert!(breaker.allow());
        assert!(breaker.is_open());
    }

    #[test]
    fn test_probe_failure_restarts_cooldown() {
        let breaker = CircuitBreaker::new(1, Duration::from_millis(30));

        breaker.record_failure();
        std::thread::sleep(Duration::from_millis(40));
        assert!(breaker.allow());

        // The probe failed: cooldown restarts from now.
        breaker.record_failure();
        assert!(!breaker.allow());
    }
}
