//! Per-job status polling loop.
//!
//! Each registered job gets one [`PollLoop`] task. The loop sleeps for the
//! configured interval, probes `GET /jobs/{id}`, awaits the response, and
//! only then sleeps again, so at most one probe per job is ever in flight.
//!
//! A failed probe (network error, non-2xx, undecodable body) is a skipped
//! tick: it is logged and the loop carries on. A terminal status tears the
//! loop down before the terminal action is dispatched.

use std::sync::Arc;
use std::time::Duration;

use retro_core::job::{JobId, JobStatus, JobStatusResponse};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::events::{EventBus, TrackerEvent};
use crate::registry::PollRegistry;
use crate::service::JobService;

/// Default delay between the end of one status probe and the next.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// What the loop should do after handling a probe response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tick {
    Continue,
    Finished,
}

/// Everything a single polling task needs.
pub(crate) struct PollLoop {
    pub job_id: JobId,
    pub generation: u64,
    pub interval: Duration,
    pub service: Arc<dyn JobService>,
    pub registry: Arc<RwLock<PollRegistry>>,
    pub events: Arc<EventBus>,
    pub cancel: CancellationToken,
}

impl PollLoop {
    /// Run until the job reaches a terminal status or the loop is cancelled.
    pub async fn run(self) {
        tracing::debug!(job_id = %self.job_id, generation = self.generation, "Polling started");

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }

            let result = tokio::select! {
                _ = self.cancel.cancelled() => break,
                result = self.service.job_status(&self.job_id) => result,
            };

            match result {
                Ok(response) => {
                    if self.apply(response).await == Tick::Finished {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        job_id = %self.job_id,
                        error = %e,
                        "Status probe failed, skipping tick",
                    );
                }
            }
        }

        tracing::debug!(job_id = %self.job_id, generation = self.generation, "Polling stopped");
    }

    /// Apply a successful probe response.
    ///
    /// The status event and, for terminal statuses, the registry teardown
    /// happen under the registry write lock. A loop that no longer owns its
    /// registry entry (stopped while the probe was in flight) emits nothing.
    async fn apply(&self, response: JobStatusResponse) -> Tick {
        let result_url = response.result_url().map(str::to_string);
        let status = response.status;

        {
            let mut registry = self.registry.write().await;
            if !registry.owns(&self.job_id, self.generation) {
                return Tick::Finished;
            }

            registry.record(&self.job_id, status.clone(), result_url.clone());
            self.events.publish(TrackerEvent::JobStatusChanged {
                job_id: self.job_id.clone(),
                status: status.clone(),
            });

            if !status.is_terminal() {
                tracing::trace!(job_id = %self.job_id, status = %status, "Job still running");
                return Tick::Continue;
            }

            registry.release(&self.job_id);
        }

        tracing::info!(job_id = %self.job_id, status = %status, "Job reached terminal status");

        match (status, result_url) {
            (JobStatus::Completed, Some(result_url)) => {
                self.events.publish(TrackerEvent::JobResult {
                    job_id: self.job_id.clone(),
                    result_url,
                });
            }
            (JobStatus::Completed, None) => {
                tracing::debug!(job_id = %self.job_id, "Job completed without a result reference");
            }
            _ => {}
        }

        Tick::Finished
    }
}
