//! Queue error types.

use thiserror::Error;

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },

    #[error("Enqueue failed: {0}")]
    EnqueueFailed(String),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl QueueError {
    pub fn queue_full(capacity: usize) -> Self {
        Self::QueueFull { capacity }
    }

    pub fn enqueue_failed(msg: impl Into<String>) -> Self {
        Self::EnqueueFailed(msg.into())
    }

    /// Check if this error means the caller should apply backpressure.
    pub fn is_backpressure(&self) -> bool {
        matches!(self, QueueError::QueueFull { .. })
    }
}
