//! The job pipeline facade.
//!
//! The only entry point external callers use. The pipeline is an
//! explicit, constructor-injected object owned by the process's
//! composition root; collaborators (store, gateway) are passed in so
//! tests can substitute fakes.

use std::sync::Arc;

use tracing::{info, warn};

use fsight_gateway::AnalysisGateway;
use fsight_models::{JobId, JobKind, JobPayload, QueueSnapshot, TransferStatusReport};
use fsight_notify::{
    ChangeNotifier, NotifierConfig, PollerConfig, StatusPoller, ThrottlePolicy,
};
use fsight_queue::{Job, PriorityQueue, QueueConfig, QueueResult, TransferStatusTracker};
use fsight_store::MediaStore;
use fsight_worker::{metrics, WorkerConfig, WorkerPoolScheduler};

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub queue: QueueConfig,
    pub worker: WorkerConfig,
    pub notifier: NotifierConfig,
    pub poller: PollerConfig,
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            queue: QueueConfig::from_env(),
            worker: WorkerConfig::from_env(),
            notifier: NotifierConfig::from_env(),
            poller: PollerConfig::from_env(),
        }
    }
}

/// Asynchronous job pipeline for media analysis.
///
/// `enqueue` is fire and forget: once it returns a job id, every later
/// failure is recorded in the status tracker and the store, never thrown
/// back at the caller.
pub struct JobPipeline {
    queue: Arc<PriorityQueue>,
    tracker: Arc<TransferStatusTracker>,
    store: Arc<dyn MediaStore>,
    scheduler: WorkerPoolScheduler,
    notifier: Arc<ChangeNotifier>,
    throttle: Arc<ThrottlePolicy>,
    poller: Arc<StatusPoller>,
    max_attempts: u32,
}

impl JobPipeline {
    /// Wire up a pipeline over the given collaborators.
    pub fn new(
        store: Arc<dyn MediaStore>,
        gateway: Arc<dyn AnalysisGateway>,
        config: PipelineConfig,
    ) -> Self {
        let queue = Arc::new(PriorityQueue::new(config.queue.max_depth));
        let tracker = Arc::new(TransferStatusTracker::new());
        let notifier = Arc::new(ChangeNotifier::new(
            Arc::clone(&tracker),
            config.notifier.clone(),
        ));
        let throttle = Arc::new(ThrottlePolicy::new());
        let poller = Arc::new(StatusPoller::new(
            Arc::clone(&notifier),
            Arc::clone(&throttle),
            config.poller.clone(),
        ));

        let max_attempts = config.worker.max_attempts;
        let scheduler = WorkerPoolScheduler::new(
            config.worker,
            Arc::clone(&queue),
            Arc::clone(&tracker),
            Arc::clone(&store),
            gateway,
            Arc::clone(&notifier),
        );

        Self {
            queue,
            tracker,
            store,
            scheduler,
            notifier,
            throttle,
            poller,
            max_attempts,
        }
    }

    /// Launch the worker pool, change-feed tail and polling fallback.
    ///
    /// Call once; the background tasks run until [`JobPipeline::shutdown`].
    pub fn start(&self) {
        self.scheduler.start();

        let feed_shutdown = self.scheduler.subscribe_shutdown();
        tokio::spawn(
            Arc::clone(&self.notifier).run_feed_loop(Arc::clone(&self.store), feed_shutdown),
        );

        let poller = Arc::clone(&self.poller);
        let poller_shutdown = self.scheduler.subscribe_shutdown();
        tokio::spawn(async move { poller.run(poller_shutdown).await });

        info!("Job pipeline started");
    }

    /// Enqueue one unit of analysis work.
    ///
    /// Returns immediately; fails only with `QueueFull`, which callers
    /// must surface as backpressure.
    pub fn enqueue(&self, kind: JobKind, payload: JobPayload) -> QueueResult<JobId> {
        let job = Job::new(kind, payload, self.max_attempts);
        let job_id = job.id.clone();
        let project_id = job.payload.project_id.clone();
        let media_id = job.payload.media_id.clone();

        self.queue.push(job)?;
        self.tracker.register(&job_id, &project_id);
        metrics::record_job_enqueued(kind.as_str());

        // Durable mark is best effort and must not block the caller.
        let store = Arc::clone(&self.store);
        let mark_job_id = job_id.clone();
        tokio::spawn(async move {
            if let Err(e) = store.mark_queued(&media_id, &mark_job_id).await {
                warn!(job_id = %mark_job_id, "Failed to mark media queued: {}", e);
            }
        });

        info!(job_id = %job_id, kind = %kind, "Job enqueued");
        Ok(job_id)
    }

    /// Transfer status for a set of job ids.
    ///
    /// Never blocks on in-flight work. Ids absent from both the tracker
    /// and the live queue are assumed long completed and report as sent.
    pub fn transfer_status(&self, job_ids: &[JobId]) -> TransferStatusReport {
        self.tracker.query(job_ids, |id| self.queue.contains(id))
    }

    /// Advisory diagnostics for operators and dashboards.
    pub fn queue_snapshot(&self) -> QueueSnapshot {
        self.scheduler.snapshot()
    }

    /// The change notifier, for project-scoped subscriptions.
    pub fn notifier(&self) -> &Arc<ChangeNotifier> {
        &self.notifier
    }

    /// The polling throttle, for client activity signals.
    pub fn throttle(&self) -> &Arc<ThrottlePolicy> {
        &self.throttle
    }

    /// Stop the background tasks, draining in-flight jobs.
    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
        info!("Job pipeline stopped");
    }
}
