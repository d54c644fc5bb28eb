//! The `MediaStore` collaborator interface.

use async_trait::async_trait;
use tokio::sync::broadcast;

use fsight_models::{AnalysisOutcome, JobId, MediaId};

use crate::error::StoreResult;
use crate::types::{MediaChange, MediaItem};

/// Durable storage for media blobs and their analysis state.
///
/// The pipeline treats the store as an external collaborator: it loads
/// blobs for submission, records lifecycle transitions, and tails the
/// change feed for completions. Implementations must be safe to share
/// across worker tasks.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Load a media item (bytes plus metadata).
    async fn load(&self, id: &MediaId) -> StoreResult<MediaItem>;

    /// Check whether a media record still exists.
    ///
    /// The scheduler consults this before persisting results so that
    /// media withdrawn mid-flight does not get resurrected.
    async fn exists(&self, id: &MediaId) -> StoreResult<bool>;

    /// Record that a job was enqueued for the item.
    async fn mark_queued(&self, id: &MediaId, job_id: &JobId) -> StoreResult<()>;

    /// Record that a worker started submitting the item downstream.
    async fn mark_processing(&self, id: &MediaId, job_id: &JobId) -> StoreResult<()>;

    /// Record a successful downstream acknowledgement.
    async fn mark_completed(
        &self,
        id: &MediaId,
        job_id: &JobId,
        outcome: AnalysisOutcome,
    ) -> StoreResult<()>;

    /// Record permanent failure after the job exhausted its attempts.
    async fn mark_failed(&self, id: &MediaId, job_id: &JobId, error: &str) -> StoreResult<()>;

    /// Subscribe to the live change feed.
    ///
    /// Every call returns a fresh receiver positioned at the current
    /// tail; a consumer that fell behind re-subscribes after a backoff.
    fn watch_changes(&self) -> broadcast::Receiver<MediaChange>;
}
