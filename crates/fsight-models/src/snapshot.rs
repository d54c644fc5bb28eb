//! Queue diagnostics snapshot.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Read-only operational view of the pipeline.
///
/// Advisory only: counts are sampled independently and may be mutually
/// inconsistent under load.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
pub struct QueueSnapshot {
    /// Jobs currently held by the queue (eligible or backing off)
    #[serde(rename = "queueLen")]
    pub queue_len: usize,
    /// Jobs currently occupying a local worker slot
    #[serde(rename = "localInFlight")]
    pub local_in_flight: usize,
    /// Local worker ceiling
    #[serde(rename = "localCapacity")]
    pub local_capacity: usize,
    /// Jobs currently in flight to the downstream service
    #[serde(rename = "downstreamInFlight")]
    pub downstream_in_flight: usize,
    /// Downstream concurrency ceiling
    #[serde(rename = "downstreamCapacity")]
    pub downstream_capacity: usize,
    /// Whether the circuit breaker is currently open
    #[serde(rename = "breakerOpen")]
    pub breaker_open: bool,
    /// Consecutive downstream failures observed by the breaker
    #[serde(rename = "consecutiveFailures")]
    pub consecutive_failures: u32,
}
