//! Job lifecycle tracker.
//!
//! [`JobTracker`] owns the poll registry. It is constructed once by the
//! caller and shared as an `Arc`; [`register`](JobTracker::register) and
//! [`stop_polling`](JobTracker::stop_polling) are the only ways to add or
//! remove tracked jobs from outside. Each job is polled by its own task
//! (see [`crate::poller`]) until it reaches a terminal status.
//!
//! State changes are published on the shared [`EventBus`].

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use retro_core::job::{JobDescriptor, JobId, JobSnapshot};
use tokio::sync::{broadcast, RwLock};
use tokio_util::sync::CancellationToken;

use crate::events::{EventBus, TrackerEvent};
use crate::poller::{PollLoop, DEFAULT_POLL_INTERVAL};
use crate::registry::{ActivePoll, PollRegistry};
use crate::service::JobService;

/// How long [`JobTracker::shutdown`] waits for polling tasks to exit.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of [`JobTracker::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// The job is new and a polling loop was started.
    Started,
    /// The job is new but already terminal; nothing to poll.
    AlreadyTerminal,
    /// The id is already being polled or already finished. Nothing changed.
    Duplicate,
    /// The tracker was shut down. Nothing changed.
    Closed,
}

pub struct JobTracker {
    service: Arc<dyn JobService>,
    registry: Arc<RwLock<PollRegistry>>,
    events: Arc<EventBus>,
    poll_interval: Duration,
    /// Parent of every per-job token; cancelled on shutdown.
    cancel: CancellationToken,
}

impl JobTracker {
    /// Create a tracker polling at [`DEFAULT_POLL_INTERVAL`].
    pub fn new(service: Arc<dyn JobService>, events: Arc<EventBus>) -> Arc<Self> {
        Self::with_interval(service, events, DEFAULT_POLL_INTERVAL)
    }

    pub fn with_interval(
        service: Arc<dyn JobService>,
        events: Arc<EventBus>,
        poll_interval: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            service,
            registry: Arc::new(RwLock::new(PollRegistry::default())),
            events,
            poll_interval,
            cancel: CancellationToken::new(),
        })
    }

    /// Subscribe to tracker events.
    pub fn subscribe(&self) -> broadcast::Receiver<TrackerEvent> {
        self.events.subscribe()
    }

    /// Add a job to the tracked set.
    ///
    /// Publishes [`TrackerEvent::JobRegistered`] and starts a polling loop
    /// unless the initial status is already terminal. Registering an id
    /// that is being polled, or that already finished, is a no-op, and so
    /// is any registration after [`shutdown`](Self::shutdown).
    pub async fn register(&self, job: JobDescriptor) -> Registration {
        let mut registry = self.registry.write().await;

        if self.cancel.is_cancelled() {
            tracing::warn!(job_id = %job.id, "Tracker is shut down, ignoring registration");
            return Registration::Closed;
        }

        if registry.is_active(&job.id) || registry.is_finished(&job.id) {
            tracing::debug!(job_id = %job.id, "Job already tracked, ignoring registration");
            return Registration::Duplicate;
        }

        let status = job.initial_status();
        let snapshot = JobSnapshot::new(job.id.clone(), status.clone());
        registry.insert_snapshot(snapshot.clone());
        self.events.publish(TrackerEvent::JobRegistered { job: snapshot });

        if status.is_terminal() {
            tracing::info!(job_id = %job.id, status = %status, "Registered job in terminal status");
            registry.mark_finished(job.id);
            return Registration::AlreadyTerminal;
        }

        tracing::info!(job_id = %job.id, status = %status, "Registered job");
        self.spawn_poll(&mut registry, job.id);
        Registration::Started
    }

    /// Start polling `job_id` if no loop is active for it.
    ///
    /// Returns `false` when a loop already exists, the job is known to be
    /// terminal, or the tracker was shut down.
    pub async fn start_polling(&self, job_id: JobId) -> bool {
        let mut registry = self.registry.write().await;
        if self.cancel.is_cancelled()
            || registry.is_active(&job_id)
            || registry.is_finished(&job_id)
        {
            return false;
        }
        self.spawn_poll(&mut registry, job_id);
        true
    }

    /// Stop polling `job_id`. Safe to call for jobs with no active loop.
    ///
    /// Once this returns, the stopped loop publishes no further events.
    pub async fn stop_polling(&self, job_id: &JobId) -> bool {
        let removed = self.registry.write().await.remove(job_id);
        match removed {
            Some(_) => {
                tracing::info!(job_id = %job_id, "Polling stopped");
                true
            }
            None => false,
        }
    }

    pub async fn is_polling(&self, job_id: &JobId) -> bool {
        self.registry.read().await.is_active(job_id)
    }

    /// Number of jobs with an active polling loop.
    pub async fn active_count(&self) -> usize {
        self.registry.read().await.active_count()
    }

    /// Latest observation of `job_id`, if it was ever registered or polled.
    pub async fn snapshot(&self, job_id: &JobId) -> Option<JobSnapshot> {
        self.registry.read().await.snapshot(job_id).cloned()
    }

    /// Latest observation of every known job, ordered by id.
    pub async fn snapshots(&self) -> Vec<JobSnapshot> {
        let mut snapshots: Vec<JobSnapshot> =
            self.registry.read().await.snapshots().cloned().collect();
        snapshots.sort_by(|a, b| a.id.cmp(&b.id));
        snapshots
    }

    /// Cancel every polling loop and wait for the tasks to exit.
    ///
    /// The tracker accepts no new jobs afterwards.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down job tracker");

        let drained = {
            let mut registry = self.registry.write().await;
            self.cancel.cancel();
            registry.drain()
        };
        let handles = drained.into_iter().map(|(_, poll)| poll.task_handle);

        if tokio::time::timeout(SHUTDOWN_TIMEOUT, join_all(handles))
            .await
            .is_err()
        {
            tracing::warn!("Timed out waiting for polling tasks to exit");
        }

        tracing::info!("Job tracker shut down complete");
    }

    // ---- private helpers ----

    /// Spawn a polling task for `job_id` and record it in `registry`.
    ///
    /// The caller holds the registry write lock, so the task cannot observe
    /// the registry before its own entry is inserted.
    fn spawn_poll(&self, registry: &mut PollRegistry, job_id: JobId) {
        let generation = registry.next_generation();
        let cancel = self.cancel.child_token();

        let poll = PollLoop {
            job_id: job_id.clone(),
            generation,
            interval: self.poll_interval,
            service: Arc::clone(&self.service),
            registry: Arc::clone(&self.registry),
            events: Arc::clone(&self.events),
            cancel: cancel.clone(),
        };
        let task_handle = tokio::spawn(poll.run());

        registry.insert(
            job_id,
            ActivePoll {
                generation,
                cancel,
                task_handle,
            },
        );
    }
}
