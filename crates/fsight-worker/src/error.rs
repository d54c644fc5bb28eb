//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Downstream service unavailable (circuit open)")]
    DownstreamUnavailable,

    #[error("Job failed: {0}")]
    JobFailed(String),

    #[error("Gateway error: {0}")]
    Gateway(#[from] fsight_gateway::GatewayError),

    #[error("Store error: {0}")]
    Store(#[from] fsight_store::StoreError),

    #[error("Queue error: {0}")]
    Queue(#[from] fsight_queue::QueueError),
}

impl WorkerError {
    pub fn job_failed(msg: impl Into<String>) -> Self {
        Self::JobFailed(msg.into())
    }

    /// Check if this failure should count against the circuit breaker.
    ///
    /// Only real downstream outcomes move the breaker; fast-fails while
    /// it is already open and local store trouble do not.
    pub fn is_downstream_failure(&self) -> bool {
        matches!(self, WorkerError::Gateway(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsight_gateway::GatewayError;

    #[test]
    fn test_breaker_attribution() {
        assert!(WorkerError::Gateway(GatewayError::request_failed("boom")).is_downstream_failure());
        assert!(!WorkerError::DownstreamUnavailable.is_downstream_failure());
        assert!(!WorkerError::Store(fsight_store::StoreError::unavailable("db"))
            .is_downstream_failure());
    }
}
