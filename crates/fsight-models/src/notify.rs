//! Notification message types.
//!
//! These messages are what subscribers receive from the change notifier,
//! shaped for direct serialization to browser clients.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{JobId, MediaId, ProjectId, TransferStatus};

/// A terminal job outcome, as observed by the notifier.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct JobNotification {
    /// Job that finished
    #[serde(rename = "jobId")]
    pub job_id: JobId,
    /// Project the media item belongs to
    #[serde(rename = "projectId")]
    pub project_id: ProjectId,
    /// Media item that was analyzed
    #[serde(rename = "mediaId")]
    pub media_id: MediaId,
    /// Whether the downstream submission succeeded
    pub succeeded: bool,
    /// Error message for failed jobs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the outcome was observed
    pub timestamp: DateTime<Utc>,
}

impl JobNotification {
    /// Create a success notification.
    pub fn success(job_id: JobId, project_id: ProjectId, media_id: MediaId) -> Self {
        Self {
            job_id,
            project_id,
            media_id,
            succeeded: true,
            error: None,
            timestamp: Utc::now(),
        }
    }

    /// Create a failure notification.
    pub fn failure(
        job_id: JobId,
        project_id: ProjectId,
        media_id: MediaId,
        error: impl Into<String>,
    ) -> Self {
        Self {
            job_id,
            project_id,
            media_id,
            succeeded: false,
            error: Some(error.into()),
            timestamp: Utc::now(),
        }
    }
}

/// One still-outstanding job in a snapshot message.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct OutstandingJob {
    /// Job identifier
    #[serde(rename = "jobId")]
    pub job_id: JobId,
    /// Current transfer status
    pub status: TransferStatus,
    /// When the status was last updated
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

/// Message envelope delivered to notification subscribers.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotifyMessage {
    /// A job reached a terminal state
    JobCompleted {
        #[serde(flatten)]
        notification: JobNotification,
    },

    /// Snapshot of everything still in flight for a project
    OutstandingSnapshot {
        #[serde(rename = "projectId")]
        project_id: ProjectId,
        jobs: Vec<OutstandingJob>,
        timestamp: DateTime<Utc>,
    },

    /// Informational message
    Log {
        message: String,
        timestamp: DateTime<Utc>,
    },
}

impl NotifyMessage {
    /// Create a completion message.
    pub fn completed(notification: JobNotification) -> Self {
        NotifyMessage::JobCompleted { notification }
    }

    /// Create an outstanding-set snapshot message.
    pub fn outstanding(project_id: ProjectId, jobs: Vec<OutstandingJob>) -> Self {
        NotifyMessage::OutstandingSnapshot {
            project_id,
            jobs,
            timestamp: Utc::now(),
        }
    }

    /// Create a log message.
    pub fn log(message: impl Into<String>) -> Self {
        NotifyMessage::Log {
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}
