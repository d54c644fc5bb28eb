//! Retry policy with exponential backoff.

use std::time::Duration;

/// Outcome of a retry decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Re-queue the job, eligible again after `delay`
    Retry { delay: Duration },
    /// The job has exhausted its attempts and is abandoned
    Abandon,
}

/// Pure backoff policy: attempt count in, delay or abandonment out.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Base delay, doubled each attempt
    pub base_delay: Duration,
    /// Cap on the computed delay
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Create a new policy.
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
        }
    }

    /// Backoff delay for a given attempt count: `base * 2^attempt`, capped.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Decide what happens after a failed attempt.
    ///
    /// `attempt` is the count including the failure just recorded.
    pub fn decide(&self, attempt: u32, max_attempts: u32) -> RetryDecision {
        if attempt >= max_attempts {
            RetryDecision::Abandon
        } else {
            RetryDecision::Retry {
                delay: self.delay_for_attempt(attempt),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
        }
    }
}
