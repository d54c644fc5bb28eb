//! In-memory `MediaStore` implementation.
//!
//! Used by the worker binary in self-contained deployments and by tests.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::debug;

use fsight_models::{AnalysisOutcome, JobId, MediaId};

use crate::error::{StoreError, StoreResult};
use crate::store::MediaStore;
use crate::types::{MediaChange, MediaItem, MediaStatus};

/// Default change-feed buffer size.
const CHANGE_FEED_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
struct MediaRecord {
    item: MediaItem,
    status: MediaStatus,
    job_id: Option<JobId>,
    error: Option<String>,
    outcome: Option<AnalysisOutcome>,
    updated_at: DateTime<Utc>,
}

/// In-memory media store with a broadcast change feed.
pub struct MemoryMediaStore {
    records: RwLock<HashMap<MediaId, MediaRecord>>,
    changes: broadcast::Sender<MediaChange>,
}

impl MemoryMediaStore {
    /// Create an empty store.
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self {
            records: RwLock::new(HashMap::new()),
            changes,
        }
    }

    /// Insert a media item in the `Pending` state.
    pub fn insert(&self, item: MediaItem) {
        let mut records = self.records.write().expect("store map poisoned");
        records.insert(
            item.id.clone(),
            MediaRecord {
                item,
                status: MediaStatus::Pending,
                job_id: None,
                error: None,
                outcome: None,
                updated_at: Utc::now(),
            },
        );
    }

    /// Remove a media item, simulating out-of-band withdrawal.
    pub fn remove(&self, id: &MediaId) -> bool {
        let mut records = self.records.write().expect("store map poisoned");
        records.remove(id).is_some()
    }

    /// Current status of a record, if present.
    pub fn status_of(&self, id: &MediaId) -> Option<MediaStatus> {
        let records = self.records.read().expect("store map poisoned");
        records.get(id).map(|r| r.status)
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.read().expect("store map poisoned").len()
    }

    /// Check whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn transition(
        &self,
        id: &MediaId,
        job_id: &JobId,
        status: MediaStatus,
        error: Option<String>,
        outcome: Option<AnalysisOutcome>,
    ) -> StoreResult<()> {
        let change = {
            let mut records = self.records.write().expect("store map poisoned");
            let record = records
                .get_mut(id)
                .ok_or_else(|| StoreError::not_found(id.as_str()))?;

            record.status = status;
            record.job_id = Some(job_id.clone());
            record.error = error.clone();
            record.outcome = outcome.clone();
            record.updated_at = Utc::now();

            MediaChange {
                media_id: id.clone(),
                project_id: record.item.project_id.clone(),
                job_id: Some(job_id.clone()),
                status,
                error,
                outcome,
                occurred_at: record.updated_at,
            }
        };

        debug!(media_id = %id, status = %status, "Media status transition");
        // No receivers is fine; the feed is best effort.
        let _ = self.changes.send(change);
        Ok(())
    }
}

impl Default for MemoryMediaStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaStore for MemoryMediaStore {
    async fn load(&self, id: &MediaId) -> StoreResult<MediaItem> {
        let records = self.records.read().expect("store map poisoned");
        records
            .get(id)
            .map(|r| r.item.clone())
            .ok_or_else(|| StoreError::not_found(id.as_str()))
    }

    async fn exists(&self, id: &MediaId) -> StoreResult<bool> {
        let records = self.records.read().expect("store map poisoned");
        Ok(records.contains_key(id))
    }

    async fn mark_queued(&self, id: &MediaId, job_id: &JobId) -> StoreResult<()> {
        self.transition(id, job_id, MediaStatus::Queued, None, None)
    }

    async fn mark_processing(&self, id: &MediaId, job_id: &JobId) -> StoreResult<()> {
        self.transition(id, job_id, MediaStatus::Processing, None, None)
    }

    async fn mark_completed(
        &self,
        id: &MediaId,
        job_id: &JobId,
        outcome: AnalysisOutcome,
    ) -> StoreResult<()> {
        self.transition(id, job_id, MediaStatus::Completed, None, Some(outcome))
    }

    async fn mark_failed(&self, id: &MediaId, job_id: &JobId, error: &str) -> StoreResult<()> {
        self.transition(id, job_id, MediaStatus::Failed, Some(error.to_string()), None)
    }

    fn watch_changes(&self) -> broadcast::Receiver<MediaChange> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsight_models::{ProjectId, UserId};

    fn item(id: &str) -> MediaItem {
        MediaItem::new(
            MediaId::from_string(id),
            ProjectId::from_string("p1"),
            UserId::from_string("u1"),
            "image/png",
            vec![1, 2, 3],
        )
    }

    #[tokio::test]
    async fn test_load_and_exists() {
        let store = MemoryMediaStore::new();
        let media_id = MediaId::from_string("m1");
        store.insert(item("m1"));

        assert!(store.exists(&media_id).await.unwrap());
        let loaded = store.load(&media_id).await.unwrap();
        assert_eq!(loaded.content, vec![1, 2, 3]);

        let missing = MediaId::from_string("nope");
        assert!(!store.exists(&missing).await.unwrap());
        assert!(matches!(
            store.load(&missing).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_transitions_reach_the_change_feed() {
        let store = MemoryMediaStore::new();
        let media_id = MediaId::from_string("m1");
        let job_id = JobId::from_string("j1");
        store.insert(item("m1"));

        let mut feed = store.watch_changes();

        store.mark_queued(&media_id, &job_id).await.unwrap();
        store
            .mark_completed(&media_id, &job_id, AnalysisOutcome::new(None, None))
            .await
            .unwrap();

        let first = feed.recv().await.unwrap();
        assert_eq!(first.status, MediaStatus::Queued);

        let second = feed.recv().await.unwrap();
        assert_eq!(second.status, MediaStatus::Completed);
        assert_eq!(second.job_id, Some(job_id));
        assert_eq!(store.status_of(&media_id), Some(MediaStatus::Completed));
    }

    #[tokio::test]
    async fn test_mark_on_removed_media_fails() {
        let store = MemoryMediaStore::new();
        let media_id = MediaId::from_string("m1");
        let job_id = JobId::from_string("j1");
        store.insert(item("m1"));
        assert!(store.remove(&media_id));

        let result = store.mark_failed(&media_id, &job_id, "too late").await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }
}
