//! Bookkeeping for active polling loops.
//!
//! [`PollRegistry`] maps each job id to at most one active loop, remembers
//! which jobs were already observed terminal, and keeps the latest
//! [`JobSnapshot`] per job. It is plain data: the tracker wraps it in a
//! `RwLock` so every mutation is serialized.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use retro_core::job::{JobId, JobSnapshot, JobStatus};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Handle to a running polling loop.
pub(crate) struct ActivePoll {
    /// Distinguishes this loop from an earlier one for the same id.
    pub generation: u64,
    pub cancel: CancellationToken,
    pub task_handle: JoinHandle<()>,
}

#[derive(Default)]
pub(crate) struct PollRegistry {
    active: HashMap<JobId, ActivePoll>,
    finished: HashSet<JobId>,
    snapshots: HashMap<JobId, JobSnapshot>,
    next_generation: u64,
}

impl PollRegistry {
    pub fn is_active(&self, job_id: &JobId) -> bool {
        self.active.contains_key(job_id)
    }

    pub fn is_finished(&self, job_id: &JobId) -> bool {
        self.finished.contains(job_id)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Reserve a generation number for a new loop.
    pub fn next_generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    pub fn insert(&mut self, job_id: JobId, poll: ActivePoll) {
        self.active.insert(job_id, poll);
    }

    /// `true` if the loop identified by `generation` still owns `job_id`.
    pub fn owns(&self, job_id: &JobId, generation: u64) -> bool {
        self.active
            .get(job_id)
            .is_some_and(|poll| poll.generation == generation)
    }

    /// Remove the active entry for `job_id` and cancel its token.
    pub fn remove(&mut self, job_id: &JobId) -> Option<ActivePoll> {
        let poll = self.active.remove(job_id)?;
        poll.cancel.cancel();
        Some(poll)
    }

    /// Tear down the loop and remember the job as finished so it is never
    /// polled again.
    pub fn release(&mut self, job_id: &JobId) {
        self.remove(job_id);
        self.finished.insert(job_id.clone());
    }

    pub fn mark_finished(&mut self, job_id: JobId) {
        self.finished.insert(job_id);
    }

    /// Remove every active entry, cancelling each.
    pub fn drain(&mut self) -> Vec<(JobId, ActivePoll)> {
        let drained: Vec<_> = self.active.drain().collect();
        for (_, poll) in &drained {
            poll.cancel.cancel();
        }
        drained
    }

    /// Record the latest observed status for `job_id`.
    pub fn record(&mut self, job_id: &JobId, status: JobStatus, result_url: Option<String>) {
        let snapshot = self
            .snapshots
            .entry(job_id.clone())
            .or_insert_with(|| JobSnapshot::new(job_id.clone(), status.clone()));
        snapshot.status = status;
        if result_url.is_some() {
            snapshot.result_url = result_url;
        }
        snapshot.observed_at = Utc::now();
    }

    pub fn insert_snapshot(&mut self, snapshot: JobSnapshot) {
        self.snapshots.insert(snapshot.id.clone(), snapshot);
    }

    pub fn snapshot(&self, job_id: &JobId) -> Option<&JobSnapshot> {
        self.snapshots.get(job_id)
    }

    pub fn snapshots(&self) -> impl Iterator<Item = &JobSnapshot> {
        self.snapshots.values()
    }
}
