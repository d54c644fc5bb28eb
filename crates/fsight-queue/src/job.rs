//! Queued job representation.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use fsight_models::{JobId, JobKind, JobPayload};

/// Payloads at or under this size get a priority boost so quick jobs are
/// not starved behind large ones.
pub const SMALL_PAYLOAD_BYTES: u64 = 256 * 1024;

/// Priority boost applied to small payloads.
pub const SMALL_PAYLOAD_BOOST: i32 = 20;

/// Derive the effective priority for a job from its kind and size hint.
pub fn derive_priority(kind: JobKind, estimated_size: Option<u64>) -> i32 {
    let base = kind.base_priority();
    match estimated_size {
        Some(size) if size <= SMALL_PAYLOAD_BYTES => base + SMALL_PAYLOAD_BOOST,
        _ => base,
    }
}

/// One unit of enqueued analysis work.
///
/// A job is owned by exactly one of the queue or an in-flight worker slot
/// at any instant. Retries re-enter the queue as a new instance produced
/// by [`Job::next_attempt`], keeping the same id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique job ID, stable across retries
    pub id: JobId,
    /// Kind of analysis requested
    pub kind: JobKind,
    /// Immutable reference data for the work
    pub payload: JobPayload,
    /// Effective priority (higher is served first)
    pub priority: i32,
    /// Processing attempts so far
    pub attempt: u32,
    /// Ceiling after which the job is abandoned
    pub max_attempts: u32,
    /// Earliest instant at which the job is eligible to run
    pub scheduled_for: DateTime<Utc>,
    /// Creation timestamp, used for FIFO ties within a priority band
    pub created_at: DateTime<Utc>,
    /// Error message from the most recent failed attempt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl Job {
    /// Create a new job, eligible immediately.
    pub fn new(kind: JobKind, payload: JobPayload, max_attempts: u32) -> Self {
        let now = Utc::now();
        let priority = derive_priority(kind, payload.estimated_size);
        Self {
            id: JobId::new(),
            kind,
            payload,
            priority,
            attempt: 0,
            max_attempts,
            scheduled_for: now,
            created_at: now,
            last_error: None,
        }
    }

    /// Override the derived priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Check whether the job may run at `now`.
    pub fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        self.scheduled_for <= now
    }

    /// Produce the re-queued instance for the next attempt.
    ///
    /// Same id and payload; the attempt counter is incremented and the
    /// job becomes eligible only after `delay`.
    pub fn next_attempt(mut self, delay: Duration, error: impl Into<String>) -> Self {
        self.attempt += 1;
        self.scheduled_for =
            Utc::now() + ChronoDuration::from_std(delay).unwrap_or_else(|_| ChronoDuration::zero());
        self.last_error = Some(error.into());
        self
    }
}
