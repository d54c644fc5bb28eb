//! Per-job transfer status tracking.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tracing::debug;

use fsight_models::{
    JobId, OutstandingJob, ProjectId, TransferStatus, TransferStatusDetail, TransferStatusReport,
};

/// One tracked entry.
#[derive(Debug, Clone)]
struct StatusEntry {
    project_id: Option<ProjectId>,
    status: TransferStatus,
    error: Option<String>,
    updated_at: DateTime<Utc>,
}

/// Last-write-wins map of job id to transfer status.
///
/// Transition legality is not enforced; after enqueue the scheduler is
/// the only writer, and monotonicity follows from its call order.
pub struct TransferStatusTracker {
    entries: RwLock<HashMap<JobId, StatusEntry>>,
}

impl TransferStatusTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Register a freshly enqueued job as `Queued`.
    pub fn register(&self, job_id: &JobId, project_id: &ProjectId) {
        let mut entries = self.entries.write().expect("status map poisoned");
        entries.insert(
            job_id.clone(),
            StatusEntry {
                project_id: Some(project_id.clone()),
                status: TransferStatus::Queued,
                error: None,
                updated_at: Utc::now(),
            },
        );
    }

    /// Record a status transition, keeping the last write.
    pub fn set(&self, job_id: &JobId, status: TransferStatus, error: Option<String>) {
        let mut entries = self.entries.write().expect("status map poisoned");
        let entry = entries.entry(job_id.clone()).or_insert_with(|| StatusEntry {
            project_id: None,
            status,
            error: None,
            updated_at: Utc::now(),
        });
        entry.status = status;
        entry.error = error;
        entry.updated_at = Utc::now();
    }

    /// Look up the current status of a single job.
    pub fn get(&self, job_id: &JobId) -> Option<TransferStatus> {
        self.entries
            .read()
            .expect("status map poisoned")
            .get(job_id)
            .map(|e| e.status)
    }

    /// Build a status report for the given job ids.
    ///
    /// Ids unknown to the tracker are resolved through `still_queued`:
    /// a job the live queue is holding reports as `Queued`; anything else
    /// is assumed long completed and reports as `Sent`. Old entries are
    /// evicted after a TTL, so "unknown" cannot be distinguished from
    /// "finished a long time ago" and the optimistic answer is the one
    /// reconnecting clients expect.
    pub fn query<F>(&self, job_ids: &[JobId], still_queued: F) -> TransferStatusReport
    where
        F: Fn(&JobId) -> bool,
    {
        let entries = self.entries.read().expect("status map poisoned");
        let mut report = TransferStatusReport::default();

        for job_id in job_ids {
            let detail = match entries.get(job_id) {
                Some(entry) => TransferStatusDetail {
                    job_id: job_id.clone(),
                    status: entry.status,
                    error: entry.error.clone(),
                    updated_at: entry.updated_at,
                },
                None => TransferStatusDetail {
                    job_id: job_id.clone(),
                    status: if still_queued(job_id) {
                        TransferStatus::Queued
                    } else {
                        TransferStatus::Sent
                    },
                    error: None,
                    updated_at: Utc::now(),
                },
            };
            report.push(detail);
        }

        report
    }

    /// Everything still in flight for a project, most recent first.
    pub fn outstanding_for_project(&self, project_id: &ProjectId) -> Vec<OutstandingJob> {
        let entries = self.entries.read().expect("status map poisoned");
        let mut jobs: Vec<OutstandingJob> = entries
            .iter()
            .filter(|(_, e)| {
                !e.status.is_terminal() && e.project_id.as_ref() == Some(project_id)
            })
            .map(|(id, e)| OutstandingJob {
                job_id: id.clone(),
                status: e.status,
                updated_at: e.updated_at,
            })
            .collect();
        jobs.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        jobs
    }

    /// Evict terminal entries older than `ttl`. Returns the eviction count.
    pub fn evict_older_than(&self, ttl: Duration) -> usize {
        let cutoff = Utc::now()
            - ChronoDuration::from_std(ttl).unwrap_or_else(|_| ChronoDuration::zero());
        let mut entries = self.entries.write().expect("status map poisoned");
        let before = entries.len();
        entries.retain(|_, e| !e.status.is_terminal() || e.updated_at > cutoff);
        let evicted = before - entries.len();
        if evicted > 0 {
            debug!(evicted, "Evicted terminal status entries");
        }
        evicted
    }

    /// Number of tracked entries.
    pub fn len(&self) -> usize {
        self.entries.read().expect("status map poisoned").len()
    }

    /// Check whether the tracker is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TransferStatusTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<JobId> {
        (0..n).map(|i| JobId::from_string(format!("job-{i}"))).collect()
    }

    #[test]
    fn test_register_and_set() {
        let tracker = TransferStatusTracker::new();
        let job = JobId::from_string("j1");
        let project = ProjectId::from_string("p1");

        tracker.register(&job, &project);
        assert_eq!(tracker.get(&job), Some(TransferStatus::Queued));

        tracker.set(&job, TransferStatus::Sending, None);
        tracker.set(&job, TransferStatus::Failed, Some("gateway timeout".into()));
        assert_eq!(tracker.get(&job), Some(TransferStatus::Failed));
    }

    #[test]
    fn test_query_counts() {
        let tracker = TransferStatusTracker::new();
        let project = ProjectId::from_string("p1");
        let job_ids = ids(3);

        for id in &job_ids {
            tracker.register(id, &project);
        }
        tracker.set(&job_ids[0], TransferStatus::Sent, None);
        tracker.set(&job_ids[1], TransferStatus::Failed, Some("boom".into()));

        let report = tracker.query(&job_ids, |_| false);
        assert_eq!(report.total, 3);
        assert_eq!(report.sent, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.queued, 1);
        assert_eq!(report.per_id[1].error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_unknown_id_assumed_sent_unless_queued() {
        let tracker = TransferStatusTracker::new();
        let unknown = JobId::from_string("gone");
        let queued = JobId::from_string("waiting");

        let report = tracker.query(&[unknown.clone(), queued.clone()], |id| id == &queued);
        assert_eq!(report.per_id[0].status, TransferStatus::Sent);
        assert_eq!(report.per_id[1].status, TransferStatus::Queued);
    }

    #[test]
    fn test_outstanding_excludes_terminal() {
        let tracker = TransferStatusTracker::new();
        let project = ProjectId::from_string("p1");
        let other = ProjectId::from_string("p2");
        let job_ids = ids(3);

        tracker.register(&job_ids[0], &project);
        tracker.register(&job_ids[1], &project);
        tracker.register(&job_ids[2], &other);
        tracker.set(&job_ids[1], TransferStatus::Sent, None);

        let outstanding = tracker.outstanding_for_project(&project);
        assert_eq!(outstanding.len(), 1);
        assert_eq!(outstanding[0].job_id, job_ids[0]);
    }

    #[test]
    fn test_eviction_only_touches_terminal_entries() {
        let tracker = TransferStatusTracker::new();
        let project = ProjectId::from_string("p1");
        let job_ids = ids(2);

        tracker.register(&job_ids[0], &project);
        tracker.register(&job_ids[1], &project);
        tracker.set(&job_ids[1], TransferStatus::Sent, None);

        // Nothing is older than an hour yet.
        assert_eq!(tracker.evict_older_than(Duration::from_secs(3600)), 0);

        // A zero TTL evicts the terminal entry but keeps the queued one.
        assert_eq!(tracker.evict_older_than(Duration::from_secs(0)), 1);
        assert_eq!(tracker.get(&job_ids[0]), Some(TransferStatus::Queued));
        assert_eq!(tracker.get(&job_ids[1]), None);
    }
}
