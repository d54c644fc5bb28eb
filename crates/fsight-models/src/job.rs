//! Job identifiers, kinds and payloads.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::{MediaId, ProjectId, UserId};

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of analysis requested for a media item.
///
/// The kind determines the default priority band: still images are cheap
/// for the downstream service and are served ahead of extracted frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Analyze a still image
    ImageAnalysis,
    /// Analyze a frame extracted from a video
    VideoFrameAnalysis,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::ImageAnalysis => "image_analysis",
            JobKind::VideoFrameAnalysis => "video_frame_analysis",
        }
    }

    /// Base priority for jobs of this kind (higher is served first).
    pub fn base_priority(&self) -> i32 {
        match self {
            JobKind::ImageAnalysis => 60,
            JobKind::VideoFrameAnalysis => 40,
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when parsing an unknown job kind.
#[derive(Debug, Error)]
#[error("unknown job kind: {0}")]
pub struct ParseJobKindError(pub String);

impl FromStr for JobKind {
    type Err = ParseJobKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image_analysis" | "image" => Ok(JobKind::ImageAnalysis),
            "video_frame_analysis" | "video_frame" => Ok(JobKind::VideoFrameAnalysis),
            other => Err(ParseJobKindError(other.to_string())),
        }
    }
}

/// Reference data needed to perform one unit of analysis work.
///
/// The payload is immutable once enqueued; retries carry the same payload.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct JobPayload {
    /// Media item to analyze
    pub media_id: MediaId,
    /// Owning project
    pub project_id: ProjectId,
    /// Owning user
    pub user_id: UserId,
    /// Timestamp within the source video, for extracted frames
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_timestamp: Option<f64>,
    /// Free-form tag describing where the frame came from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_tag: Option<String>,
    /// Caller-provided size hint in bytes, used for priority and timeouts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_size: Option<u64>,
}

impl JobPayload {
    /// Create a new payload for a media item.
    pub fn new(media_id: MediaId, project_id: ProjectId, user_id: UserId) -> Self {
        Self {
            media_id,
            project_id,
            user_id,
            frame_timestamp: None,
            source_tag: None,
            estimated_size: None,
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

    /// Set the estimated payload size in bytes.
    pub fn with_estimated_size(mut self, bytes: u64) -> Self {
        self.estimated_size = Some(bytes);
        self
    }
}

/// Result of a successful downstream analysis submission.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AnalysisOutcome {
    /// Identifier assigned by the downstream service, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<String>,
    /// Short human-readable summary from the downstream service
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// When the submission was acknowledged
    pub completed_at: DateTime<Utc>,
}

impl AnalysisOutcome {
    /// Create an outcome acknowledged now.
    pub fn new(remote_id: Option<String>, summary: Option<String>) -> Self {
        Self {
            remote_id,
            summary,
            completed_at: Utc::now(),
        }
    }
}
