//! Shared data models for the FrameSight pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Media, project and job identifiers
//! - Job kinds and payloads
//! - Transfer status reporting
//! - Notification message schemas
//! - Queue diagnostics snapshots

pub mod job;
pub mod media;
pub mod notify;
pub mod snapshot;
pub mod transfer;

// Re-export common types
pub use job::{AnalysisOutcome, JobId, JobKind, JobPayload, ParseJobKindError};
pub use media::{MediaId, ProjectId, UserId};
pub use notify::{JobNotification, NotifyMessage, OutstandingJob};
pub use snapshot::QueueSnapshot;
pub use transfer::{TransferStatus, TransferStatusDetail, TransferStatusReport};
