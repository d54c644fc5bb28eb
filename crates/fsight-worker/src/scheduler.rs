//! Worker pool scheduler.
//!
//! A fixed set of worker loops drains the priority queue under two
//! independent ceilings: the number of loops bounds local concurrency,
//! and a semaphore bounds how many submissions are in flight to the
//! analysis service at once. A worker holding a job but no downstream
//! slot waits for one instead of failing the job, which turns downstream
//! congestion into queue backpressure without losing work.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::{watch, Semaphore};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use fsight_gateway::{AnalysisGateway, AnalysisRequest};
use fsight_models::{AnalysisOutcome, JobNotification, QueueSnapshot, TransferStatus};
use fsight_notify::ChangeNotifier;
use fsight_queue::{Job, PriorityQueue, TransferStatusTracker};
use fsight_store::{with_retry, MediaStore, RetryConfig};

use crate::breaker::CircuitBreaker;
use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::metrics;
use crate::retry::{RetryDecision, RetryPolicy};

struct SchedulerInner {
    config: WorkerConfig,
    queue: Arc<PriorityQueue>,
    tracker: Arc<TransferStatusTracker>,
    store: Arc<dyn MediaStore>,
    gateway: Arc<dyn AnalysisGateway>,
    notifier: Arc<ChangeNotifier>,
    breaker: CircuitBreaker,
    retry_policy: RetryPolicy,
    store_retry: RetryConfig,
    downstream_slots: Arc<Semaphore>,
    local_in_flight: AtomicUsize,
}

/// Continuously drains the queue through the analysis gateway.
pub struct WorkerPoolScheduler {
    inner: Arc<SchedulerInner>,
    shutdown: watch::Sender<bool>,
}

impl WorkerPoolScheduler {
    /// Create a new scheduler over the given collaborators.
    pub fn new(
        config: WorkerConfig,
        queue: Arc<PriorityQueue>,
        tracker: Arc<TransferStatusTracker>,
        store: Arc<dyn MediaStore>,
        gateway: Arc<dyn AnalysisGateway>,
        notifier: Arc<ChangeNotifier>,
    ) -> Self {
        let breaker = CircuitBreaker::new(config.breaker_failure_threshold, config.breaker_cooldown);
        let retry_policy = RetryPolicy::new(config.retry_base_delay, config.retry_max_delay);
        let downstream_slots = Arc::new(Semaphore::new(config.downstream_ceiling));
        let (shutdown, _) = watch::channel(false);

        Self {
            inner: Arc::new(SchedulerInner {
                config,
                queue,
                tracker,
                store,
                gateway,
                notifier,
                breaker,
                retry_policy,
                store_retry: RetryConfig::from_env(),
                downstream_slots,
                local_in_flight: AtomicUsize::new(0),
            }),
            shutdown,
        }
    }

    /// Spawn the worker loops and the maintenance tick.
    pub fn start(&self) {
        info!(
            workers = self.inner.config.local_ceiling,
            downstream = self.inner.config.downstream_ceiling,
            "Starting worker pool"
        );

        for worker in 0..self.inner.config.local_ceiling {
            let inner = Arc::clone(&self.inner);
            let shutdown_rx = self.shutdown.subscribe();
            tokio::spawn(Self::worker_loop(inner, shutdown_rx, worker));
        }

        let inner = Arc::clone(&self.inner);
        let shutdown_rx = self.shutdown.subscribe();
        tokio::spawn(Self::maintenance_loop(inner, shutdown_rx));
    }

    /// A shutdown receiver for sibling background loops.
    pub fn subscribe_shutdown(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    /// Signal shutdown and wait for in-flight jobs, bounded by the
    /// configured shutdown timeout.
    pub async fn shutdown(&self) {
        let _ = self.shutdown.send(true);

        info!("Waiting for in-flight jobs to complete...");
        let _ = tokio::time::timeout(self.inner.config.shutdown_timeout, async {
            while self.inner.local_in_flight.load(Ordering::SeqCst) > 0 {
                sleep(std::time::Duration::from_millis(100)).await;
            }
        })
        .await;

        info!("Worker pool stopped");
    }

    /// Advisory diagnostics snapshot.
    pub fn snapshot(&self) -> QueueSnapshot {
        let inner = &self.inner;
        QueueSnapshot {
            queue_len: inner.queue.len(),
            local_in_flight: inner.local_in_flight.load(Ordering::SeqCst),
            local_capacity: inner.config.local_ceiling,
            downstream_in_flight: inner
                .config
                .downstream_ceiling
                .saturating_sub(inner.downstream_slots.available_permits()),
            downstream_capacity: inner.config.downstream_ceiling,
            breaker_open: inner.breaker.is_open(),
            consecutive_failures: inner.breaker.consecutive_failures(),
        }
    }

    /// One worker: claim ready jobs in a loop, idling on a short timer
    /// when the queue has nothing eligible.
    async fn worker_loop(
        inner: Arc<SchedulerInner>,
        mut shutdown: watch::Receiver<bool>,
        worker: usize,
    ) {
        debug!(worker, "Worker loop started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            match inner.queue.pop_ready(Utc::now()) {
                Some(job) => {
                    let count = inner.local_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    metrics::set_local_in_flight(count);

                    Self::process_job(&inner, job).await;

                    let count = inner.local_in_flight.fetch_sub(1, Ordering::SeqCst) - 1;
                    metrics::set_local_in_flight(count);
                    // Immediately try to claim the next ready job.
                }
                None => {
                    tokio::select! {
                        _ = shutdown.changed() => {}
                        _ = sleep(inner.config.idle_poll_interval) => {}
                    }
                }
            }
        }

        debug!(worker, "Worker loop stopped");
    }

    /// Periodic upkeep: evict stale status entries and refresh gauges.
    async fn maintenance_loop(inner: Arc<SchedulerInner>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(inner.config.maintenance_interval);

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    inner.tracker.evict_older_than(inner.config.status_ttl);
                    metrics::set_queue_depth(inner.queue.len());
                    metrics::set_breaker_open(inner.breaker.is_open());
                }
            }
        }
    }

    /// Run a single claimed job to a success, retry or abandonment.
    async fn process_job(inner: &Arc<SchedulerInner>, job: Job) {
        inner.tracker.set(&job.id, TransferStatus::Sending, None);

        // Best effort: the job outcome does not depend on this mark.
        if let Err(e) = inner
            .store
            .mark_processing(&job.payload.media_id, &job.id)
            .await
        {
            warn!(job_id = %job.id, "Failed to mark media processing: {}", e);
        }

        match Self::attempt_submit(inner, &job).await {
            Ok(outcome) => Self::handle_success(inner, &job, outcome).await,
            Err(e) => Self::handle_failure(inner, job, e).await,
        }
    }

    /// One downstream attempt: breaker gate, blob load, slot, submit.
    async fn attempt_submit(
        inner: &Arc<SchedulerInner>,
        job: &Job,
    ) -> WorkerResult<AnalysisOutcome> {
        if !inner.breaker.allow() {
            debug!(job_id = %job.id, "Circuit open, failing fast");
            return Err(WorkerError::DownstreamUnavailable);
        }

        let item = with_retry(&inner.store_retry, "load_media", || {
            inner.store.load(&job.payload.media_id)
        })
        .await?;

        let payload_bytes = item.byte_len().max(job.payload.estimated_size.unwrap_or(0));
        let timeout = inner.config.submit_timeout_for(payload_bytes);
        let request = AnalysisRequest {
            media_id: item.id.to_string(),
            kind: job.kind.as_str().to_string(),
            frame_timestamp: job.payload.frame_timestamp.or(item.frame_timestamp),
            source_tag: job
                .payload
                .source_tag
                .clone()
                .or_else(|| item.source_tag.clone()),
            content_type: item.content_type.clone(),
            content: item.content,
        };

        let permit = inner
            .downstream_slots
            .acquire()
            .await
            .map_err(|_| WorkerError::job_failed("Downstream semaphore closed"))?;
        metrics::set_downstream_in_flight(
            inner
                .config
                .downstream_ceiling
                .saturating_sub(inner.downstream_slots.available_permits()),
        );

        let started = Instant::now();
        let result = inner.gateway.submit(&request, timeout).await;
        drop(permit);
        metrics::set_downstream_in_flight(
            inner
                .config
                .downstream_ceiling
                .saturating_sub(inner.downstream_slots.available_permits()),
        );

        match result {
            Ok(ack) => {
                inner.breaker.record_success();
                metrics::record_submit_duration("ok", started.elapsed().as_secs_f64());
                Ok(AnalysisOutcome::new(ack.analysis_id, ack.summary))
            }
            Err(e) => {
                inner.breaker.record_failure();
                metrics::record_submit_duration("error", started.elapsed().as_secs_f64());
                Err(WorkerError::Gateway(e))
            }
        }
    }

    async fn handle_success(inner: &Arc<SchedulerInner>, job: &Job, outcome: AnalysisOutcome) {
        inner.tracker.set(&job.id, TransferStatus::Sent, None);

        // Media withdrawn while the job was in flight: drop the result
        // instead of resurrecting the record.
        match inner.store.exists(&job.payload.media_id).await {
            Ok(false) => {
                info!(
                    job_id = %job.id,
                    media_id = %job.payload.media_id,
                    "Media withdrawn mid-flight, result dropped"
                );
            }
            _ => {
                let persisted = with_retry(&inner.store_retry, "mark_completed", || {
                    inner
                        .store
                        .mark_completed(&job.payload.media_id, &job.id, outcome.clone())
                })
                .await;
                if let Err(e) = persisted {
                    error!(job_id = %job.id, "Failed to persist completion: {}", e);
                }
            }
        }

        inner
            .notifier
            .notify_completion(JobNotification::success(
                job.id.clone(),
                job.payload.project_id.clone(),
                job.payload.media_id.clone(),
            ))
            .await;

        metrics::record_job_completed(job.kind.as_str());
        info!(job_id = %job.id, attempt = job.attempt, "Job completed");
    }

    async fn handle_failure(inner: &Arc<SchedulerInner>, job: Job, err: WorkerError) {
        let error_text = err.to_string();
        let attempt = job.attempt + 1;
        warn!(job_id = %job.id, attempt, "Job attempt failed: {}", error_text);

        match inner.retry_policy.decide(attempt, job.max_attempts) {
            RetryDecision::Retry { delay } => {
                inner
                    .tracker
                    .set(&job.id, TransferStatus::Queued, Some(error_text.clone()));
                metrics::record_job_retried(job.kind.as_str());
                debug!(
                    job_id = %job.id,
                    delay_ms = delay.as_millis() as u64,
                    "Re-queueing job for retry"
                );

                let retried = job.next_attempt(delay, error_text.clone());
                if let Err(push_err) = inner.queue.push(retried.clone()) {
                    // Queue filled while the job was in flight; the retry
                    // cannot be parked, so the job ends here.
                    error!(job_id = %retried.id, "Failed to re-queue job: {}", push_err);
                    Self::abandon(
                        inner,
                        &retried,
                        format!("{error_text}; re-queue failed: {push_err}"),
                    )
                    .await;
                }
            }
            RetryDecision::Abandon => {
                Self::abandon(inner, &job, error_text).await;
            }
        }
    }

    /// Terminal failure: record it everywhere, never re-queue.
    async fn abandon(inner: &Arc<SchedulerInner>, job: &Job, error_text: String) {
        inner
            .tracker
            .set(&job.id, TransferStatus::Failed, Some(error_text.clone()));

        match inner.store.exists(&job.payload.media_id).await {
            Ok(false) => {
                info!(
                    job_id = %job.id,
                    media_id = %job.payload.media_id,
                    "Media withdrawn mid-flight, failure not persisted"
                );
            }
            _ => {
                let persisted = with_retry(&inner.store_retry, "mark_failed", || {
                    inner
                        .store
                        .mark_failed(&job.payload.media_id, &job.id, &error_text)
                })
                .await;
                if let Err(e) = persisted {
                    error!(job_id = %job.id, "Failed to persist failure: {}", e);
                }
            }
        }

        inner
            .notifier
            .notify_completion(JobNotification::failure(
                job.id.clone(),
                job.payload.project_id.clone(),
                job.payload.media_id.clone(),
                error_text.clone(),
            ))
            .await;

        metrics::record_job_abandoned(job.kind.as_str());
        error!(job_id = %job.id, "Job abandoned permanently: {}", error_text);
    }
}
