//! End-to-end pipeline tests over in-memory collaborators.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use fsight_gateway::{AnalysisAck, AnalysisGateway, AnalysisRequest, GatewayError, GatewayResult};
use fsight_models::{
    JobId, JobKind, JobPayload, MediaId, NotifyMessage, ProjectId, TransferStatus, UserId,
};
use fsight_pipeline::{JobPipeline, PipelineConfig};
use fsight_store::{MediaItem, MediaStatus, MediaStore, MemoryMediaStore};

/// Gateway fake that fails a configured number of leading calls.
struct FlakyGateway {
    calls: AtomicUsize,
    fail_first: usize,
}

impl FlakyGateway {
    fn new(fail_first: usize) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_first,
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnalysisGateway for FlakyGateway {
    async fn submit(
        &self,
        request: &AnalysisRequest,
        _timeout: Duration,
    ) -> GatewayResult<AnalysisAck> {
        // Yield once so concurrent bookkeeping tasks interleave the way
        // they would against a real network service.
        tokio::time::sleep(Duration::from_millis(1)).await;

        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.fail_first {
            Err(GatewayError::request_failed("injected failure"))
        } else {
            Ok(AnalysisAck {
                analysis_id: Some(format!("a-{}", request.media_id)),
                status: Some("accepted".to_string()),
                summary: None,
            })
        }
    }
}

fn fast_config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.worker.local_ceiling = 2;
    config.worker.idle_poll_interval = Duration::from_millis(5);
    config.worker.retry_base_delay = Duration::from_millis(1);
    config.worker.retry_max_delay = Duration::from_millis(20);
    config.worker.breaker_failure_threshold = 100;
    config.worker.shutdown_timeout = Duration::from_secs(2);
    config
}

fn seed_media(store: &MemoryMediaStore, media: &str, project: &str) -> JobPayload {
    let media_id = MediaId::from_string(media);
    let project_id = ProjectId::from_string(project);
    let user_id = UserId::from_string("u1");

    store.insert(MediaItem::new(
        media_id.clone(),
        project_id.clone(),
        user_id.clone(),
        "image/png",
        vec![0u8; 64],
    ));

    JobPayload::new(media_id, project_id, user_id)
}

async fn wait_until<F>(cond: F, timeout: Duration)
where
    F: Fn() -> bool,
{
    let deadline = Instant::now() + timeout;
    while !cond() {
        if Instant::now() > deadline {
            panic!("condition not met within {timeout:?}");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test]
async fn test_enqueue_to_sent_flow_with_notification() {
    let store = Arc::new(MemoryMediaStore::new());
    let gateway = Arc::new(FlakyGateway::new(0));
    let pipeline = JobPipeline::new(
        store.clone() as Arc<dyn MediaStore>,
        gateway.clone() as Arc<dyn AnalysisGateway>,
        fast_config(),
    );

    let payload = seed_media(&store, "m1", "p1");
    let project = ProjectId::from_string("p1");
    let mut subscription = pipeline.notifier().subscribe(&project).await;

    pipeline.start();
    let job_id = pipeline.enqueue(JobKind::ImageAnalysis, payload).unwrap();

    // The subscriber learns about the completion.
    let message = tokio::time::timeout(Duration::from_secs(2), subscription.recv())
        .await
        .expect("timed out waiting for notification")
        .expect("notifier dropped");
    match message {
        NotifyMessage::JobCompleted { notification } => {
            assert_eq!(notification.job_id, job_id);
            assert!(notification.succeeded);
        }
        other => panic!("unexpected message: {other:?}"),
    }

    // Status query and store agree.
    let report = pipeline.transfer_status(&[job_id]);
    assert_eq!(report.total, 1);
    assert_eq!(report.sent, 1);
    assert_eq!(
        store.status_of(&MediaId::from_string("m1")),
        Some(MediaStatus::Completed)
    );

    pipeline.shutdown().await;
}

#[tokio::test]
async fn test_enqueue_fails_with_queue_full_at_capacity() {
    let store = Arc::new(MemoryMediaStore::new());
    let gateway = Arc::new(FlakyGateway::new(0));

    let mut config = fast_config();
    config.queue.max_depth = 2;

    // Not started: nothing drains the queue.
    let pipeline = JobPipeline::new(
        store.clone() as Arc<dyn MediaStore>,
        gateway as Arc<dyn AnalysisGateway>,
        config,
    );

    let first = pipeline.enqueue(JobKind::ImageAnalysis, seed_media(&store, "m1", "p1"));
    let second = pipeline.enqueue(JobKind::ImageAnalysis, seed_media(&store, "m2", "p1"));
    assert!(first.is_ok());
    assert!(second.is_ok());

    for i in 3..6 {
        let overflow = pipeline.enqueue(
            JobKind::ImageAnalysis,
            seed_media(&store, &format!("m{i}"), "p1"),
        );
        let err = overflow.unwrap_err();
        assert!(err.is_backpressure(), "expected QueueFull, got {err}");
    }

    assert_eq!(pipeline.queue_snapshot().queue_len, 2);
}

#[tokio::test]
async fn test_exhausted_job_reports_failed() {
    let store = Arc::new(MemoryMediaStore::new());
    let gateway = Arc::new(FlakyGateway::new(usize::MAX));

    let mut config = fast_config();
    config.worker.max_attempts = 3;

    let pipeline = JobPipeline::new(
        store.clone() as Arc<dyn MediaStore>,
        gateway.clone() as Arc<dyn AnalysisGateway>,
        config,
    );
    pipeline.start();

    let job_id = pipeline
        .enqueue(JobKind::ImageAnalysis, seed_media(&store, "m1", "p1"))
        .unwrap();

    let pipeline_ref = &pipeline;
    let id = job_id.clone();
    wait_until(
        || pipeline_ref.transfer_status(&[id.clone()]).failed == 1,
        Duration::from_secs(2),
    )
    .await;

    assert_eq!(gateway.calls(), 3);
    assert_eq!(
        store.status_of(&MediaId::from_string("m1")),
        Some(MediaStatus::Failed)
    );

    // No further attempts, even past every backoff delay.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(gateway.calls(), 3);

    let report = pipeline.transfer_status(&[job_id]);
    assert_eq!(report.total, 1);
    assert_eq!(report.failed, 1);
    assert!(report.per_id[0].error.is_some());

    pipeline.shutdown().await;
}

#[tokio::test]
async fn test_transient_failures_recover_and_reset_breaker() {
    let store = Arc::new(MemoryMediaStore::new());
    let gateway = Arc::new(FlakyGateway::new(2));

    let mut config = fast_config();
    config.worker.max_attempts = 5;
    config.worker.breaker_failure_threshold = 3;

    let pipeline = JobPipeline::new(
        store.clone() as Arc<dyn MediaStore>,
        gateway.clone() as Arc<dyn AnalysisGateway>,
        config,
    );
    pipeline.start();

    let job_id = pipeline
        .enqueue(JobKind::ImageAnalysis, seed_media(&store, "m1", "p1"))
        .unwrap();

    let pipeline_ref = &pipeline;
    let id = job_id.clone();
    wait_until(
        || pipeline_ref.transfer_status(&[id.clone()]).sent == 1,
        Duration::from_secs(2),
    )
    .await;

    assert_eq!(gateway.calls(), 3);

    // The success wiped the breaker's failure count.
    let snapshot = pipeline.queue_snapshot();
    assert!(!snapshot.breaker_open);
    assert_eq!(snapshot.consecutive_failures, 0);

    pipeline.shutdown().await;
}

#[tokio::test]
async fn test_unknown_job_id_is_assumed_sent() {
    let store = Arc::new(MemoryMediaStore::new());
    let gateway = Arc::new(FlakyGateway::new(0));
    let pipeline = JobPipeline::new(
        store as Arc<dyn MediaStore>,
        gateway as Arc<dyn AnalysisGateway>,
        fast_config(),
    );

    let report = pipeline.transfer_status(&[JobId::from_string("long-gone")]);
    assert_eq!(report.total, 1);
    assert_eq!(report.sent, 1);
    assert_eq!(report.per_id[0].status, TransferStatus::Sent);
}

#[tokio::test]
async fn test_unstarted_pipeline_reports_queued() {
    let store = Arc::new(MemoryMediaStore::new());
    let gateway = Arc::new(FlakyGateway::new(0));
    let pipeline = JobPipeline::new(
        store.clone() as Arc<dyn MediaStore>,
        gateway as Arc<dyn AnalysisGateway>,
        fast_config(),
    );

    // Not started: the job stays queued.
    let job_id = pipeline
        .enqueue(JobKind::ImageAnalysis, seed_media(&store, "m1", "p1"))
        .unwrap();

    let report = pipeline.transfer_status(&[job_id]);
    assert_eq!(report.queued, 1);
}
