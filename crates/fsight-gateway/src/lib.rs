//! Client for the remote media analysis service.
//!
//! This crate provides:
//! - The `AnalysisGateway` trait the worker pool calls through
//! - An HTTP implementation with per-call timeouts
//! - The gateway error taxonomy used for retry and circuit breaking

pub mod client;
pub mod error;
pub mod types;

pub use client::{AnalysisGateway, GatewayConfig, HttpAnalysisGateway};
pub use error::{GatewayError, GatewayResult};
pub use types::{AnalysisAck, AnalysisRequest, HealthResponse};
