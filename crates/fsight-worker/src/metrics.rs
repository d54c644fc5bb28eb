//! Worker pool metrics.

use metrics::{counter, gauge, histogram};

/// Metric names as constants for consistency.
pub mod names {
    // Job metrics
    pub const JOBS_ENQUEUED_TOTAL: &str = "fsight_jobs_enqueued_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "fsight_jobs_completed_total";
    pub const JOBS_RETRIED_TOTAL: &str = "fsight_jobs_retried_total";
    pub const JOBS_ABANDONED_TOTAL: &str = "fsight_jobs_abandoned_total";

    // Queue metrics
    pub const QUEUE_DEPTH: &str = "fsight_queue_depth";
    pub const LOCAL_IN_FLIGHT: &str = "fsight_local_in_flight";
    pub const DOWNSTREAM_IN_FLIGHT: &str = "fsight_downstream_in_flight";

    // Downstream metrics
    pub const SUBMIT_DURATION_SECONDS: &str = "fsight_submit_duration_seconds";
    pub const BREAKER_OPEN: &str = "fsight_breaker_open";
}

/// Record a job accepted into the queue.
pub fn record_job_enqueued(kind: &str) {
    let labels = [("kind", kind.to_string())];
    counter!(names::JOBS_ENQUEUED_TOTAL, &labels).increment(1);
}

/// Record a job acknowledged by the downstream service.
pub fn record_job_completed(kind: &str) {
    let labels = [("kind", kind.to_string())];
    counter!(names::JOBS_COMPLETED_TOTAL, &labels).increment(1);
}

/// Record a failed attempt that was re-queued.
pub fn record_job_retried(kind: &str) {
    let labels = [("kind", kind.to_string())];
    counter!(names::JOBS_RETRIED_TOTAL, &labels).increment(1);
}

/// Record a job abandoned after exhausting its attempts.
pub fn record_job_abandoned(kind: &str) {
    let labels = [("kind", kind.to_string())];
    counter!(names::JOBS_ABANDONED_TOTAL, &labels).increment(1);
}

/// Update the queue depth gauge.
pub fn set_queue_depth(depth: usize) {
    gauge!(names::QUEUE_DEPTH).set(depth as f64);
}

/// Update the local in-flight gauge.
pub fn set_local_in_flight(count: usize) {
    gauge!(names::LOCAL_IN_FLIGHT).set(count as f64);
}

/// Update the downstream in-flight gauge.
pub fn set_downstream_in_flight(count: usize) {
    gauge!(names::DOWNSTREAM_IN_FLIGHT).set(count as f64);
}

/// Record one downstream submit, labeled by outcome.
pub fn record_submit_duration(outcome: &str, duration_secs: f64) {
    let labels = [("outcome", outcome.to_string())];
    histogram!(names::SUBMIT_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Update the breaker state gauge (1 = open).
pub fn set_breaker_open(open: bool) {
    gauge!(names::BREAKER_OPEN).set(if open { 1.0 } else { 0.0 });
}
