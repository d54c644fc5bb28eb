//! Pipeline worker binary.

use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use fsight_gateway::HttpAnalysisGateway;
use fsight_pipeline::{JobPipeline, PipelineConfig};
use fsight_store::{MediaStore, MemoryMediaStore};

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("fsight=info".parse().unwrap());

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting fsight-pipeline");

    // Expose Prometheus metrics for the worker gauges and counters.
    if let Err(e) = metrics_exporter_prometheus::PrometheusBuilder::new().install() {
        warn!("Failed to install Prometheus exporter: {}", e);
    }

    // Load configuration
    let config = PipelineConfig::from_env();
    info!("Pipeline config: {:?}", config);

    // Wire collaborators
    let store: Arc<dyn MediaStore> = Arc::new(MemoryMediaStore::new());
    let gateway = match HttpAnalysisGateway::from_env() {
        Ok(g) => g,
        Err(e) => {
            error!("Failed to create analysis gateway: {}", e);
            std::process::exit(1);
        }
    };

    match gateway.health_check().await {
        Ok(true) => info!("Analysis service is healthy"),
        Ok(false) => warn!("Analysis service reports unhealthy, continuing anyway"),
        Err(e) => warn!("Analysis service health check failed: {}", e),
    }

    let pipeline = JobPipeline::new(store, Arc::new(gateway), config);
    pipeline.start();

    // Run until interrupted
    tokio::signal::ctrl_c().await.ok();
    info!("Received shutdown signal");

    pipeline.shutdown().await;
    info!("Pipeline shutdown complete");
}
