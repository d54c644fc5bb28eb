//! Polling fallback for keepalive-style subscribers.
//!
//! Push notifications cover the common case; this poller complements them
//! with periodic outstanding-set snapshots so subscribers on lossy
//! channels converge even when a delta was missed.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::interval;
use tracing::{debug, info};

use fsight_models::NotifyMessage;

use crate::notifier::ChangeNotifier;
use crate::throttle::ThrottlePolicy;

/// Poller configuration.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Interval between polling rounds
    pub interval: Duration,
    /// Master switch for the polling fallback
    pub enabled: bool,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            enabled: true,
        }
    }
}

impl PollerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            interval: Duration::from_secs(
                std::env::var("NOTIFY_POLL_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
            ),
            enabled: std::env::var("NOTIFY_POLL_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(true),
        }
    }
}

/// Periodically pushes outstanding-set snapshots to active projects.
pub struct StatusPoller {
    notifier: Arc<ChangeNotifier>,
    throttle: Arc<ThrottlePolicy>,
    config: PollerConfig,
}

impl StatusPoller {
    /// Create a new poller.
    pub fn new(
        notifier: Arc<ChangeNotifier>,
        throttle: Arc<ThrottlePolicy>,
        config: PollerConfig,
    ) -> Self {
        Self {
            notifier,
            throttle,
            config,
        }
    }

    /// Run one polling round over the currently active projects.
    pub async fn poll_once(&self) -> usize {
        let mut polled = 0;
        for project_id in self.notifier.active_projects().await {
            if !self.throttle.should_poll(&project_id) {
                debug!(project_id = %project_id, "Polling throttled");
                continue;
            }

            let jobs = self.notifier.outstanding(&project_id);
            self.notifier
                .broadcast_to_project(
                    &project_id,
                    NotifyMessage::outstanding(project_id.clone(), jobs),
                )
                .await;
            polled += 1;
        }
        polled
    }

    /// Run the polling loop until shutdown.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        if !self.config.enabled {
            info!("Status polling fallback is disabled");
            return;
        }

        info!("Starting status poller (interval: {:?})", self.config.interval);
        let mut ticker = interval(self.config.interval);

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    self.poll_once().await;
                }
            }
        }

        info!("Status poller stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::NotifierConfig;
    use fsight_models::{JobId, ProjectId};
    use fsight_queue::TransferStatusTracker;
    use std::sync::Arc;

    fn setup() -> (Arc<ChangeNotifier>, Arc<ThrottlePolicy>, Arc<TransferStatusTracker>) {
        let tracker = Arc::new(TransferStatusTracker::new());
        let notifier = Arc::new(ChangeNotifier::new(
            Arc::clone(&tracker),
            NotifierConfig::default(),
        ));
        (notifier, Arc::new(ThrottlePolicy::new()), tracker)
    }

    #[tokio::test]
    async fn test_poll_pushes_outstanding_snapshot() {
        let (notifier, throttle, tracker) = setup();
        let project = ProjectId::from_string("p1");
        let mut sub = notifier.subscribe(&project).await;

        tracker.register(&JobId::from_string("j1"), &project);

        let poller = StatusPoller::new(
            Arc::clone(&notifier),
            Arc::clone(&throttle),
            PollerConfig::default(),
        );
        assert_eq!(poller.poll_once().await, 1);

        match sub.recv().await.unwrap() {
            NotifyMessage::OutstandingSnapshot { project_id, jobs, .. } => {
                assert_eq!(project_id, project);
                assert_eq!(jobs.len(), 1);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_poll_respects_throttle() {
        let (notifier, throttle, _tracker) = setup();
        let project = ProjectId::from_string("p1");
        let mut sub = notifier.subscribe(&project).await;

        throttle.set_heavy_playback(&project, true);

        let poller = StatusPoller::new(
            Arc::clone(&notifier),
            Arc::clone(&throttle),
            PollerConfig::default(),
        );
        assert_eq!(poller.poll_once().await, 0);
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_poll_skips_projects_without_subscribers() {
        let (notifier, throttle, _tracker) = setup();
        let poller = StatusPoller::new(notifier, throttle, PollerConfig::default());
        assert_eq!(poller.poll_once().await, 0);
    }
}
