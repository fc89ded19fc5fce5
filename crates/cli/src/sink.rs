//! Logging sink for tracker events.
//!
//! [`LoggingSink`] renders every [`TrackerEvent`] as a log line and keeps
//! track of which of the jobs it was asked to follow have finished.
//! [`run_until_done`] drives it from a broadcast receiver.

use std::collections::{BTreeMap, BTreeSet};

use retro_client::events::TrackerEvent;
use retro_client::tracker::JobTracker;
use retro_core::job::{JobId, JobSnapshot, JobStatus};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

/// How a followed job ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed { result_url: Option<String> },
    Failed,
}

pub struct LoggingSink {
    waiting: BTreeSet<JobId>,
    outcomes: BTreeMap<JobId, JobOutcome>,
}

impl LoggingSink {
    /// Follow the given jobs until each reaches a terminal status.
    pub fn new(job_ids: impl IntoIterator<Item = JobId>) -> Self {
        Self {
            waiting: job_ids.into_iter().collect(),
            outcomes: BTreeMap::new(),
        }
    }

    /// `true` once every followed job has an outcome.
    pub fn is_done(&self) -> bool {
        self.waiting.is_empty()
    }

    pub fn outcomes(&self) -> &BTreeMap<JobId, JobOutcome> {
        &self.outcomes
    }

    pub fn into_outcomes(self) -> BTreeMap<JobId, JobOutcome> {
        self.outcomes
    }

    /// Log `event` and update the outcome of the job it refers to.
    pub fn handle(&mut self, event: &TrackerEvent) {
        match event {
            TrackerEvent::JobRegistered { job } => {
                tracing::info!(job_id = %job.id, status = %job.status, "Job registered");
                self.observe_status(&job.id, &job.status);
            }
            TrackerEvent::JobStatusChanged { job_id, status } => {
                tracing::info!(job_id = %job_id, status = %status, "Job status");
                self.observe_status(job_id, status);
            }
            TrackerEvent::JobResult { job_id, result_url } => {
                tracing::info!(job_id = %job_id, result_url = %result_url, "Job result ready");
                // Always follows the job's `completed` status.
                if let Some(outcome) = self.outcomes.get_mut(job_id) {
                    *outcome = JobOutcome::Completed {
                        result_url: Some(result_url.clone()),
                    };
                }
            }
            TrackerEvent::LivenessChanged { healthy: true } => {
                tracing::info!("Service is healthy");
            }
            TrackerEvent::LivenessChanged { healthy: false } => {
                tracing::warn!("Service is unreachable");
            }
        }
    }

    /// Jobs that have no outcome yet.
    pub fn waiting(&self) -> impl Iterator<Item = &JobId> {
        self.waiting.iter()
    }

    /// Settle a job from the tracker's latest observation instead of an
    /// event, e.g. after events were dropped.
    pub fn reconcile(&mut self, snapshot: &JobSnapshot) {
        self.observe_status(&snapshot.id, &snapshot.status);
        if snapshot.status != JobStatus::Completed {
            return;
        }
        if let (Some(url), Some(outcome)) = (
            snapshot.result_url.as_ref(),
            self.outcomes.get_mut(&snapshot.id),
        ) {
            *outcome = JobOutcome::Completed {
                result_url: Some(url.clone()),
            };
        }
    }

    fn observe_status(&mut self, job_id: &JobId, status: &JobStatus) {
        let outcome = match status {
            JobStatus::Completed => JobOutcome::Completed { result_url: None },
            JobStatus::Failed => JobOutcome::Failed,
            _ => return,
        };
        if self.waiting.remove(job_id) {
            self.outcomes.insert(job_id.clone(), outcome);
        }
    }
}

/// Feed events from `rx` into `sink` until every followed job finished.
///
/// A terminal status and its result are published back to back, so once
/// the last job finishes any event already queued is drained before
/// returning. If the receiver lags, jobs still waiting are settled from
/// the tracker's snapshots, since their terminal event may be lost.
pub async fn run_until_done(
    rx: &mut broadcast::Receiver<TrackerEvent>,
    sink: &mut LoggingSink,
    tracker: &JobTracker,
) {
    while !sink.is_done() {
        match rx.recv().await {
            Ok(event) => sink.handle(&event),
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Event sink lagged behind the tracker");
                let waiting: Vec<JobId> = sink.waiting().cloned().collect();
                for job_id in waiting {
                    if let Some(snapshot) = tracker.snapshot(&job_id).await {
                        sink.reconcile(&snapshot);
                    }
                }
            }
            Err(RecvError::Closed) => return,
        }
    }

    loop {
        match rx.try_recv() {
            Ok(event) => sink.handle(&event),
            Err(TryRecvError::Lagged(_)) => continue,
            Err(TryRecvError::Empty | TryRecvError::Closed) => return,
        }
    }
}

/// Resolve a result reference against the service base URL.
///
/// The service hands out paths such as `/r/42.png`; absolute URLs are
/// returned unchanged.
pub fn absolute_result_url(api_url: &str, result_url: &str) -> String {
    if result_url.starts_with("http://") || result_url.starts_with("https://") {
        return result_url.to_string();
    }
    format!(
        "{}/{}",
        api_url.trim_end_matches('/'),
        result_url.trim_start_matches('/')
    )
}
