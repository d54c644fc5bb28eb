//! In-process job queue for the FrameSight pipeline.
//!
//! This crate provides:
//! - A capacity-bounded priority queue with delayed eligibility
//! - The per-job transfer status tracker
//! - Queue error types and backpressure signaling

pub mod error;
pub mod job;
pub mod queue;
pub mod status;

pub use error::{QueueError, QueueResult};
pub use job::{derive_priority, Job, SMALL_PAYLOAD_BOOST, SMALL_PAYLOAD_BYTES};
pub use queue::{PriorityQueue, QueueConfig};
pub use status::TransferStatusTracker;
