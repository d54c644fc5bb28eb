//! Media record types and change events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fsight_models::{AnalysisOutcome, JobId, MediaId, ProjectId, UserId};

/// A stored media item: blob plus the metadata the pipeline needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaItem {
    /// Media identifier
    pub id: MediaId,
    /// Owning project
    pub project_id: ProjectId,
    /// Owning user
    pub user_id: UserId,
    /// MIME type of the blob
    pub content_type: String,
    /// Raw media bytes
    #[serde(skip)]
    pub content: Vec<u8>,
    /// Timestamp within the source video, for extracted frames
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_timestamp: Option<f64>,
    /// Free-form tag describing where the frame came from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_tag: Option<String>,
    /// When the item was stored
    pub created_at: DateTime<Utc>,
}

impl MediaItem {
    /// Create a new media item stored now.
    pub fn new(
        id: MediaId,
        project_id: ProjectId,
        user_id: UserId,
        content_type: impl Into<String>,
        content: Vec<u8>,
    ) -> Self {
        Self {
            id,
            project_id,
            user_id,
            content_type: content_type.into(),
            content,
            frame_timestamp: None,
            source_tag: None,
            created_at: Utc::now(),
        }
    }

    /// Set the frame timestamp.
    pub fn with_frame_timestamp(mut self, seconds: f64) -> Self {
        self.frame_timestamp = Some(seconds);
        self
    }

    /// Set the source tag.
    pub fn with_source_tag(mut self, tag: impl Into<String>) -> Self {
        self.source_tag = Some(tag.into());
        self
    }

    /// Size of the blob in bytes.
    pub fn byte_len(&self) -> u64 {
        self.content.len() as u64
    }
}

/// Analysis lifecycle state of a media record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MediaStatus {
    /// Stored, not yet enqueued
    #[default]
    Pending,
    /// Enqueued for analysis
    Queued,
    /// A worker is submitting it downstream
    Processing,
    /// Analysis completed
    Completed,
    /// Analysis failed permanently
    Failed,
}

impl MediaStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaStatus::Pending => "pending",
            MediaStatus::Queued => "queued",
            MediaStatus::Processing => "processing",
            MediaStatus::Completed => "completed",
            MediaStatus::Failed => "failed",
        }
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, MediaStatus::Completed | MediaStatus::Failed)
    }
}

impl std::fmt::Display for MediaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A status transition observed on a media record.
///
/// The notifier tails these to learn about completions, including ones
/// written by other processes sharing the same store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaChange {
    /// Media record that changed
    pub media_id: MediaId,
    /// Project the record belongs to
    pub project_id: ProjectId,
    /// Job responsible for the transition, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
    /// New status
    pub status: MediaStatus,
    /// Error message for failed transitions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Analysis outcome for completed transitions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<AnalysisOutcome>,
    /// When the transition happened
    pub occurred_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_status_terminality() {
        assert!(!MediaStatus::Queued.is_terminal());
        assert!(!MediaStatus::Processing.is_terminal());
        assert!(MediaStatus::Completed.is_terminal());
        assert!(MediaStatus::Failed.is_terminal());
    }

    #[test]
    fn test_media_item_builder() {
        let item = MediaItem::new(
            MediaId::from_string("m1"),
            ProjectId::from_string("p1"),
            UserId::from_string("u1"),
            "image/jpeg",
            vec![0u8; 128],
        )
        .with_frame_timestamp(3.0)
        .with_source_tag("scene-cut");

        assert_eq!(item.byte_len(), 128);
        assert_eq!(item.frame_timestamp, Some(3.0));
    }
}
