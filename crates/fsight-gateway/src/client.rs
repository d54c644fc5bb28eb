//! Analysis service HTTP client.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use tracing::{debug, warn};

use crate::error::{GatewayError, GatewayResult};
use crate::types::{AnalysisAck, AnalysisRequest, HealthResponse, SubmitBody};

/// Configuration for the analysis gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base URL of the analysis service
    pub base_url: String,
    /// Connection timeout (per-call total timeouts are passed to `submit`)
    pub connect_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8002".to_string(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl GatewayConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("ANALYSIS_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:8002".to_string()),
            connect_timeout: Duration::from_secs(
                std::env::var("ANALYSIS_CONNECT_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            ),
        }
    }
}

/// Interface to the downstream analysis service.
///
/// The service is treated as unreliable and rate limited: every call
/// carries its own timeout and any failure is reported through the error
/// taxonomy so the caller can decide about retries and circuit breaking.
#[async_trait]
pub trait AnalysisGateway: Send + Sync {
    /// Submit a media payload for analysis.
    async fn submit(
        &self,
        request: &AnalysisRequest,
        timeout: Duration,
    ) -> GatewayResult<AnalysisAck>;
}

/// HTTP client for the analysis service.
pub struct HttpAnalysisGateway {
    http: Client,
    config: GatewayConfig,
}

impl HttpAnalysisGateway {
    /// Create a new gateway client.
    pub fn new(config: GatewayConfig) -> GatewayResult<Self> {
        let http = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(GatewayError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> GatewayResult<Self> {
        Self::new(GatewayConfig::from_env())
    }

    /// Check if the analysis service is healthy.
    pub async fn health_check(&self) -> GatewayResult<bool> {
        let url = format!("{}/health", self.config.base_url);

        match self.http.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                let health: HealthResponse = response.json().await?;
                Ok(health.status == "healthy" || health.status == "ok")
            }
            Ok(response) => {
                warn!("Analysis service health check failed: {}", response.status());
                Ok(false)
            }
            Err(e) => {
                warn!("Analysis service health check error: {}", e);
                Ok(false)
            }
        }
    }
}

#[async_trait]
impl AnalysisGateway for HttpAnalysisGateway {
    async fn submit(
        &self,
        request: &AnalysisRequest,
        timeout: Duration,
    ) -> GatewayResult<AnalysisAck> {
        let url = format!("{}/analyze", self.config.base_url);

        let body = SubmitBody {
            media_id: &request.media_id,
            kind: &request.kind,
            frame_timestamp: request.frame_timestamp,
            source_tag: request.source_tag.as_deref(),
            content_type: &request.content_type,
            content: base64::engine::general_purpose::STANDARD.encode(&request.content),
        };

        debug!(
            media_id = %request.media_id,
            bytes = request.byte_len(),
            timeout_secs = timeout.as_secs(),
            "Submitting media for analysis"
        );

        let response = self
            .http
            .post(&url)
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Timeout(timeout)
                } else {
                    GatewayError::Network(e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected { status, body });
        }

        let ack: AnalysisAck = response.json().await?;
        Ok(ack)
    }
}
