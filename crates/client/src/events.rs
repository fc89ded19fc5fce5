//! Notifications emitted to the rendering sink.
//!
//! Every subscriber of the shared [`EventBus`] receives these. Payloads
//! are copies; the tracker stays the source of truth for job state.

use retro_core::job::{JobId, JobSnapshot, JobStatus};
use serde::Serialize;
use tokio::sync::broadcast;

/// Broadcast channel capacity for tracker events.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// A state change the sink should render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TrackerEvent {
    /// A job was added to the tracked set; create its row.
    JobRegistered { job: JobSnapshot },

    /// A successful poll reported the job's current status.
    JobStatusChanged { job_id: JobId, status: JobStatus },

    /// A job completed with a result image. Emitted at most once per job,
    /// after its final `JobStatusChanged`.
    JobResult { job_id: JobId, result_url: String },

    /// The liveness signal flipped (or was evaluated for the first time).
    LivenessChanged { healthy: bool },
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// In-process fan-out of [`TrackerEvent`]s.
///
/// Shared via `Arc<EventBus>` between the tracker and the liveness
/// monitor. Subscribers that fall more than [`EVENT_CHANNEL_CAPACITY`]
/// events behind observe a `RecvError::Lagged`.
pub struct EventBus {
    sender: broadcast::Sender<TrackerEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    pub fn publish(&self, event: TrackerEvent) {
        // Ignore the SendError; it only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TrackerEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(EVENT_CHANNEL_CAPACITY)
    }
}
