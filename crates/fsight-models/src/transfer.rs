//! Transfer status types for job lifecycle reporting.
//!
//! Transfer status is the externally observable lifecycle of a job
//! (`queued -> sending -> sent | failed`), distinct from the scheduler's
//! internal retry bookkeeping.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::JobId;

/// Externally observable lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    /// Job is waiting in the queue (or waiting out a retry backoff)
    #[default]
    Queued,
    /// Job is being submitted to the downstream service
    Sending,
    /// Downstream submission was acknowledged
    Sent,
    /// Job was abandoned after exhausting its attempts
    Failed,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Queued => "queued",
            TransferStatus::Sending => "sending",
            TransferStatus::Sent => "sent",
            TransferStatus::Failed => "failed",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferStatus::Sent | TransferStatus::Failed)
    }
}

impl std::fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-job detail within a status report.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TransferStatusDetail {
    /// Job this detail refers to
    #[serde(rename = "jobId")]
    pub job_id: JobId,
    /// Current status
    pub status: TransferStatus,
    /// Last error message, if the job has failed an attempt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the status was last updated
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

/// Aggregated answer to a transfer status query.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
pub struct TransferStatusReport {
    /// Number of jobs queried
    pub total: usize,
    /// Jobs currently queued (including retry backoff)
    pub queued: usize,
    /// Jobs currently being submitted
    pub sending: usize,
    /// Jobs acknowledged by the downstream service
    pub sent: usize,
    /// Jobs permanently failed
    pub failed: usize,
    /// Per-job details, in query order
    #[serde(rename = "perId")]
    pub per_id: Vec<TransferStatusDetail>,
}

impl TransferStatusReport {
    /// Add one detail entry, updating the aggregate counts.
    pub fn push(&mut self, detail: TransferStatusDetail) {
        self.total += 1;
        match detail.status {
            TransferStatus::Queued => self.queued += 1,
            TransferStatus::Sending => self.sending += 1,
            TransferStatus::Sent => self.sent += 1,
            TransferStatus::Failed => self.failed += 1,
        }
        self.per_id.push(detail);
    }
}
