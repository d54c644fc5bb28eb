//! Gateway error types.

use thiserror::Error;

pub type GatewayResult<T> = Result<T, GatewayError>;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Analysis request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Analysis request failed: {0}")]
    RequestFailed(String),

    #[error("Analysis service rejected the submission ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid gateway configuration: {0}")]
    Config(String),
}

impl GatewayError {
    pub fn request_failed(msg: impl Into<String>) -> Self {
        Self::RequestFailed(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Check if the submission is worth retrying.
    ///
    /// Client-side rejections (4xx other than 429) will fail the same way
    /// again; everything else is assumed transient.
    pub fn is_retryable(&self) -> bool {
        match self {
            GatewayError::Timeout(_) | GatewayError::Network(_) | GatewayError::RequestFailed(_) => {
                true
            }
            GatewayError::Rejected { status, .. } => *status == 429 || *status >= 500,
            GatewayError::Config(_) => false,
        }
    }
}
