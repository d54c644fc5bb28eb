//! Store error types.

use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Media not found: {0}")]
    NotFound(String),

    #[error("Store request failed: {0}")]
    RequestFailed(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn request_failed(msg: impl Into<String>) -> Self {
        Self::RequestFailed(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Check if the operation is worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::RequestFailed(_) | StoreError::Unavailable(_))
    }
}
