//! Project-scoped completion fan-out.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch, RwLock};
use tracing::{debug, info, warn};

use fsight_models::{JobNotification, NotifyMessage, OutstandingJob, ProjectId};
use fsight_queue::TransferStatusTracker;
use fsight_store::{MediaChange, MediaStore};

/// Notifier configuration.
#[derive(Debug, Clone)]
pub struct NotifierConfig {
    /// Per-subscriber send buffer size
    pub subscriber_buffer: usize,
    /// Delay before re-subscribing to a broken change feed
    pub reconnect_delay: Duration,
    /// Bound on the remembered set of delivered job outcomes
    pub dedup_capacity: usize,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            subscriber_buffer: 32,
            reconnect_delay: Duration::from_secs(3),
            dedup_capacity: 8192,
        }
    }
}

impl NotifierConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            subscriber_buffer: std::env::var("NOTIFY_SUBSCRIBER_BUFFER")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(32),
            reconnect_delay: Duration::from_secs(
                std::env::var("NOTIFY_RECONNECT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(3),
            ),
            dedup_capacity: std::env::var("NOTIFY_DEDUP_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(8192),
        }
    }
}

/// Receiving side of a subscription.
pub struct NotificationStream {
    rx: mpsc::Receiver<NotifyMessage>,
}

impl NotificationStream {
    /// Receive the next message; `None` once the notifier is gone.
    pub async fn recv(&mut self) -> Option<NotifyMessage> {
        self.rx.recv().await
    }

    /// Non-blocking receive.
    pub fn try_recv(&mut self) -> Option<NotifyMessage> {
        self.rx.try_recv().ok()
    }
}

struct SubscriberHandle {
    id: u64,
    tx: mpsc::Sender<NotifyMessage>,
}

/// Bounded remember-set of already delivered outcomes.
struct DeliveredSet {
    seen: HashSet<String>,
    order: VecDeque<String>,
    capacity: usize,
}

impl DeliveredSet {
    fn new(capacity: usize) -> Self {
        Self {
            seen: HashSet::new(),
            order: VecDeque::new(),
            capacity,
        }
    }

    /// Returns true if the key was newly inserted.
    fn insert(&mut self, key: String) -> bool {
        if self.seen.contains(&key) {
            return false;
        }
        if self.order.len() >= self.capacity {
            if let Some(old) = self.order.pop_front() {
                self.seen.remove(&old);
            }
        }
        self.order.push_back(key.clone());
        self.seen.insert(key);
        true
    }
}

/// Fans job completions out to project-scoped subscribers.
///
/// Outcomes arrive on two paths: the scheduler reports its own results
/// directly, and the store change feed surfaces transitions written by
/// any process. The delivered-set makes the two paths converge on a
/// single notification per job.
pub struct ChangeNotifier {
    subscribers: RwLock<HashMap<ProjectId, Vec<SubscriberHandle>>>,
    delivered: Mutex<DeliveredSet>,
    tracker: Arc<TransferStatusTracker>,
    config: NotifierConfig,
    next_subscriber_id: AtomicU64,
}

impl ChangeNotifier {
    /// Create a notifier over the given status tracker.
    pub fn new(tracker: Arc<TransferStatusTracker>, config: NotifierConfig) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            delivered: Mutex::new(DeliveredSet::new(config.dedup_capacity)),
            tracker,
            config,
            next_subscriber_id: AtomicU64::new(0),
        }
    }

    /// Subscribe to completions for a project.
    ///
    /// Dropping the returned stream unsubscribes; the registry entry is
    /// reaped on the next send to that project.
    pub async fn subscribe(&self, project_id: &ProjectId) -> NotificationStream {
        let (tx, rx) = mpsc::channel(self.config.subscriber_buffer);
        let id = self.next_subscriber_id.fetch_add(1, Ordering::Relaxed);

        let mut subscribers = self.subscribers.write().await;
        subscribers
            .entry(project_id.clone())
            .or_default()
            .push(SubscriberHandle { id, tx });
        debug!(project_id = %project_id, subscriber = id, "Subscriber registered");

        NotificationStream { rx }
    }

    /// Projects with at least one live subscriber.
    pub async fn active_projects(&self) -> Vec<ProjectId> {
        let subscribers = self.subscribers.read().await;
        subscribers
            .iter()
            .filter(|(_, subs)| !subs.is_empty())
            .map(|(p, _)| p.clone())
            .collect()
    }

    /// Number of live subscribers for a project.
    pub async fn subscriber_count(&self, project_id: &ProjectId) -> usize {
        let subscribers = self.subscribers.read().await;
        subscribers.get(project_id).map(|s| s.len()).unwrap_or(0)
    }

    /// Consistent "what is outstanding right now" snapshot for a project.
    ///
    /// Reconnecting subscribers read this instead of replaying missed
    /// deltas.
    pub fn outstanding(&self, project_id: &ProjectId) -> Vec<OutstandingJob> {
        self.tracker.outstanding_for_project(project_id)
    }

    /// Report a terminal job outcome (scheduler path).
    pub async fn notify_completion(&self, notification: JobNotification) {
        let key = notification.job_id.to_string();
        if !self.delivered.lock().expect("dedup set poisoned").insert(key) {
            debug!(job_id = %notification.job_id, "Duplicate outcome suppressed");
            return;
        }

        let project_id = notification.project_id.clone();
        self.broadcast_to_project(&project_id, NotifyMessage::completed(notification))
            .await;
    }

    /// Deliver a message to every subscriber of a project.
    ///
    /// Sends apply backpressure: a full subscriber buffer is waited on
    /// rather than dropped, while closed subscribers are reaped.
    pub async fn broadcast_to_project(&self, project_id: &ProjectId, message: NotifyMessage) {
        let targets: Vec<(u64, mpsc::Sender<NotifyMessage>)> = {
            let subscribers = self.subscribers.read().await;
            match subscribers.get(project_id) {
                Some(subs) => subs.iter().map(|s| (s.id, s.tx.clone())).collect(),
                None => return,
            }
        };

        let mut dead = Vec::new();
        for (id, tx) in targets {
            match tx.try_send(message.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(msg)) => {
                    debug!(subscriber = id, "Subscriber buffer full, applying backpressure");
                    if tx.send(msg).await.is_err() {
                        dead.push(id);
                    }
                }
                Err(mpsc::error::TrySendError::Closed(_)) => dead.push(id),
            }
        }

        if !dead.is_empty() {
            let mut subscribers = self.subscribers.write().await;
            if let Some(subs) = subscribers.get_mut(project_id) {
                subs.retain(|s| !dead.contains(&s.id));
                if subs.is_empty() {
                    subscribers.remove(project_id);
                }
            }
            debug!(project_id = %project_id, reaped = dead.len(), "Reaped closed subscribers");
        }
    }

    /// Translate a store change event into a notification (feed path).
    async fn dispatch_change(&self, change: MediaChange) {
        if !change.status.is_terminal() {
            return;
        }
        let Some(job_id) = change.job_id else {
            // A terminal transition with no job attached has nothing to
            // key the notification on.
            debug!(media_id = %change.media_id, "Terminal change without job id skipped");
            return;
        };

        let succeeded = change.status == fsight_store::MediaStatus::Completed;
        let notification = if succeeded {
            JobNotification::success(job_id, change.project_id, change.media_id)
        } else {
            JobNotification::failure(
                job_id,
                change.project_id,
                change.media_id,
                change.error.unwrap_or_else(|| "analysis failed".to_string()),
            )
        };
        self.notify_completion(notification).await;
    }

    /// Tail the store change feed until shutdown.
    ///
    /// A broken feed is re-subscribed after a fixed delay; a lagging one
    /// is logged and resumed (subscribers can recover via
    /// [`ChangeNotifier::outstanding`]).
    pub async fn run_feed_loop(
        self: Arc<Self>,
        store: Arc<dyn MediaStore>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!("Starting change feed tail");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let mut feed = store.watch_changes();
            loop {
                tokio::select! {
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            info!("Change feed tail stopped");
                            return;
                        }
                    }
                    event = feed.recv() => match event {
                        Ok(change) => self.dispatch_change(change).await,
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            warn!(missed, "Change feed lagged, continuing");
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            warn!(
                                "Change feed closed, re-subscribing in {:?}",
                                self.config.reconnect_delay
                            );
                            break;
                        }
                    }
                }
            }

            tokio::select! {
                _ = shutdown.changed() => {}
                _ = tokio::time::sleep(self.config.reconnect_delay) => {}
            }
        }

        info!("Change feed tail stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsight_models::{JobId, MediaId, TransferStatus};

    fn notifier() -> ChangeNotifier {
        ChangeNotifier::new(
            Arc::new(TransferStatusTracker::new()),
            NotifierConfig::default(),
        )
    }

    fn success(job: &str, project: &str) -> JobNotification {
        JobNotification::success(
            JobId::from_string(job),
            ProjectId::from_string(project),
            MediaId::from_string("m1"),
        )
    }

    #[tokio::test]
    async fn test_fan_out_reaches_project_subscribers_only() {
        let notifier = notifier();
        let p1 = ProjectId::from_string("p1");
        let p2 = ProjectId::from_string("p2");

        let mut sub1 = notifier.subscribe(&p1).await;
        let mut sub2 = notifier.subscribe(&p2).await;

        notifier.notify_completion(success("j1", "p1")).await;

        match sub1.recv().await.unwrap() {
            NotifyMessage::JobCompleted { notification } => {
                assert_eq!(notification.job_id.as_str(), "j1");
                assert!(notification.succeeded);
            }
            other => panic!("unexpected message: {other:?}"),
        }
        assert!(sub2.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_outcomes_notify_once() {
        let notifier = notifier();
        let p1 = ProjectId::from_string("p1");
        let mut sub = notifier.subscribe(&p1).await;

        notifier.notify_completion(success("j1", "p1")).await;
        notifier.notify_completion(success("j1", "p1")).await;

        assert!(sub.recv().await.is_some());
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_dropped_subscribers_are_reaped() {
        let notifier = notifier();
        let p1 = ProjectId::from_string("p1");

        let sub = notifier.subscribe(&p1).await;
        assert_eq!(notifier.subscriber_count(&p1).await, 1);
        drop(sub);

        notifier.notify_completion(success("j1", "p1")).await;
        assert_eq!(notifier.subscriber_count(&p1).await, 0);
    }

    #[tokio::test]
    async fn test_feed_loop_translates_terminal_changes() {
        use fsight_store::{MediaItem, MemoryMediaStore};
        use fsight_models::UserId;

        let store = Arc::new(MemoryMediaStore::new());
        store.insert(MediaItem::new(
            MediaId::from_string("m1"),
            ProjectId::from_string("p1"),
            UserId::from_string("u1"),
            "image/png",
            vec![0],
        ));

        let notifier = Arc::new(notifier());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let feed_task = tokio::spawn(Arc::clone(&notifier).run_feed_loop(
            store.clone() as Arc<dyn MediaStore>,
            shutdown_rx,
        ));

        let p1 = ProjectId::from_string("p1");
        let mut sub = notifier.subscribe(&p1).await;

        // Let the feed task attach to the change stream before emitting.
        tokio::time::sleep(Duration::from_millis(10)).await;

        let media_id = MediaId::from_string("m1");
        let job_id = JobId::from_string("j1");
        store.mark_processing(&media_id, &job_id).await.unwrap();
        store.mark_failed(&media_id, &job_id, "timed out").await.unwrap();

        match sub.recv().await.unwrap() {
            NotifyMessage::JobCompleted { notification } => {
                assert!(!notification.succeeded);
                assert_eq!(notification.error.as_deref(), Some("timed out"));
            }
            other => panic!("unexpected message: {other:?}"),
        }

        shutdown_tx.send(true).unwrap();
        feed_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_outstanding_snapshot_reads_the_tracker() {
        let tracker = Arc::new(TransferStatusTracker::new());
        let notifier = ChangeNotifier::new(Arc::clone(&tracker), NotifierConfig::default());
        let p1 = ProjectId::from_string("p1");

        let job = JobId::from_string("j1");
        tracker.register(&job, &p1);
        tracker.set(&job, TransferStatus::Sending, None);

        let outstanding = notifier.outstanding(&p1);
        assert_eq!(outstanding.len(), 1);
        assert_eq!(outstanding[0].status, TransferStatus::Sending);
    }
}
