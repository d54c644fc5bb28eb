//! In-process priority queue with delayed eligibility.

use std::collections::{BinaryHeap, HashSet};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tracing::debug;

use fsight_models::JobId;

use crate::error::{QueueError, QueueResult};
use crate::job::Job;

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Maximum number of jobs held at once; pushes beyond this fail
    pub max_depth: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { max_depth: 1000 }
    }
}

impl QueueConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            max_depth: std::env::var("QUEUE_MAX_DEPTH")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1000),
        }
    }
}

/// A job waiting for its `scheduled_for` instant.
struct Delayed {
    job: Job,
    seq: u64,
}

impl PartialEq for Delayed {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}

impl Eq for Delayed {}

impl PartialOrd for Delayed {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Delayed {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Max-heap: the entry with the earliest scheduled_for wins.
        other
            .job
            .scheduled_for
            .cmp(&self.job.scheduled_for)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// An eligible job ordered for dispatch.
struct Ready {
    job: Job,
    seq: u64,
}

impl PartialEq for Ready {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}

impl Eq for Ready {}

impl PartialOrd for Ready {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ready {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Max-heap: highest priority first, then FIFO within a band
        // (earlier created_at, then earlier push order).
        self.job
            .priority
            .cmp(&other.job.priority)
            .then_with(|| other.job.created_at.cmp(&self.job.created_at))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct QueueInner {
    ready: BinaryHeap<Ready>,
    delayed: BinaryHeap<Delayed>,
    ids: HashSet<JobId>,
    seq: u64,
}

/// Internally synchronized priority queue of pending jobs.
///
/// Eligibility is evaluated before priority: a job whose `scheduled_for`
/// lies in the future is never returned by [`PriorityQueue::pop_ready`],
/// even if it outranks every eligible job.
pub struct PriorityQueue {
    inner: Mutex<QueueInner>,
    max_depth: usize,
}

impl PriorityQueue {
    /// Create an empty queue with the given capacity.
    pub fn new(max_depth: usize) -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                ready: BinaryHeap::new(),
                delayed: BinaryHeap::new(),
                ids: HashSet::new(),
                seq: 0,
            }),
            max_depth,
        }
    }

    /// Push a job, failing with `QueueFull` at capacity.
    pub fn push(&self, job: Job) -> QueueResult<()> {
        let mut inner = self.inner.lock().expect("queue mutex poisoned");

        if inner.ids.len() >= self.max_depth {
            return Err(QueueError::queue_full(self.max_depth));
        }

        inner.seq += 1;
        let seq = inner.seq;
        debug!(job_id = %job.id, priority = job.priority, attempt = job.attempt, "Queued job");

        inner.ids.insert(job.id.clone());
        inner.delayed.push(Delayed { job, seq });
        Ok(())
    }

    /// Pop the highest-priority job whose `scheduled_for` has passed.
    pub fn pop_ready(&self, now: DateTime<Utc>) -> Option<Job> {
        let mut inner = self.inner.lock().expect("queue mutex poisoned");

        // Promote everything that became eligible since the last call.
        while let Some(top) = inner.delayed.peek() {
            if top.job.scheduled_for > now {
                break;
            }
            let Delayed { job, seq } = inner.delayed.pop().expect("peeked entry");
            inner.ready.push(Ready { job, seq });
        }

        let popped = inner.ready.pop()?;
        inner.ids.remove(&popped.job.id);
        Some(popped.job)
    }

    /// Number of jobs currently held (eligible or backing off).
    pub fn len(&self) -> usize {
        self.inner.lock().expect("queue mutex poisoned").ids.len()
    }

    /// Check whether the queue holds no jobs.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check whether a job id is currently held by the queue.
    pub fn contains(&self, job_id: &JobId) -> bool {
        self.inner
            .lock()
            .expect("queue mutex poisoned")
            .ids
            .contains(job_id)
    }
}
