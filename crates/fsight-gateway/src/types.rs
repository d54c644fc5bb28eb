//! Wire types for the analysis service.

use serde::{Deserialize, Serialize};

/// One submission to the analysis service.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    /// Media identifier, echoed back by the service
    pub media_id: String,
    /// Analysis kind requested
    pub kind: String,
    /// Timestamp within the source video, for extracted frames
    pub frame_timestamp: Option<f64>,
    /// Free-form tag describing where the frame came from
    pub source_tag: Option<String>,
    /// Raw media bytes
    pub content: Vec<u8>,
    /// MIME type of the blob
    pub content_type: String,
}

impl AnalysisRequest {
    /// Size of the payload in bytes.
    pub fn byte_len(&self) -> u64 {
        self.content.len() as u64
    }
}

/// JSON body actually posted to the service.
#[derive(Debug, Serialize)]
pub(crate) struct SubmitBody<'a> {
    pub media_id: &'a str,
    pub kind: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_timestamp: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_tag: Option<&'a str>,
    pub content_type: &'a str,
    /// Base64-encoded media bytes
    pub content: String,
}

/// Acknowledgement returned by the service on success.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisAck {
    /// Identifier the service assigned to the analysis
    #[serde(default)]
    pub analysis_id: Option<String>,
    /// Short status string ("accepted", "completed", ...)
    #[serde(default)]
    pub status: Option<String>,
    /// Optional human-readable summary
    #[serde(default)]
    pub summary: Option<String>,
}

/// Health check response.
#[derive(Debug, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}
