//! Shared helpers for retro-client integration tests.
//!
//! [`ScriptedService`] is an in-memory [`JobService`] whose replies are
//! queued per job id. Tests run on tokio's paused clock, so sleeps inside
//! the tracker advance instantly once every task is idle.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use retro_client::api::ApiError;
use retro_client::events::{EventBus, TrackerEvent};
use retro_client::service::JobService;
use retro_core::filter::Filter;
use retro_core::job::{JobId, JobStatus, JobStatusResponse, SubmissionResponse};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;

// ---------------------------------------------------------------------------
// Replies
// ---------------------------------------------------------------------------

/// One scripted answer to `GET /jobs/{id}`.
#[derive(Debug, Clone)]
pub enum Reply {
    Status(JobStatusResponse),
    /// Non-2xx response.
    HttpError(u16),
    /// Transport-level failure.
    NetworkError,
    /// Answer with the inner reply after `delay`.
    Slow(Duration, Box<Reply>),
}

pub fn status(value: &str) -> Reply {
    Reply::Status(JobStatusResponse {
        status: JobStatus::from(value),
        result_url: None,
    })
}

pub fn completed_with(result_url: &str) -> Reply {
    Reply::Status(JobStatusResponse {
        status: JobStatus::Completed,
        result_url: Some(result_url.to_string()),
    })
}

/// A real `reqwest::Error`: building a request for an invalid URL fails
/// without touching the network.
pub fn network_error() -> ApiError {
    let err = reqwest::Client::new()
        .get("not a url")
        .build()
        .expect_err("invalid URL must fail to build");
    ApiError::Request(err)
}

// ---------------------------------------------------------------------------
// ScriptedService
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct ScriptedService {
    scripts: Mutex<HashMap<JobId, VecDeque<Reply>>>,
    status_calls: Mutex<HashMap<JobId, usize>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    health_script: Mutex<VecDeque<bool>>,
    health_delays: Mutex<VecDeque<Duration>>,
    health_calls: AtomicUsize,
    submit_reply: Mutex<Option<Result<serde_json::Value, u16>>>,
    submissions: Mutex<Vec<(usize, String, Filter)>>,
}

impl ScriptedService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue replies for `job_id`. Once exhausted the job reports `pending`.
    pub fn script(&self, job_id: &str, replies: impl IntoIterator<Item = Reply>) {
        self.scripts
            .lock()
            .unwrap()
            .entry(JobId::from(job_id))
            .or_default()
            .extend(replies);
    }

    /// Queue health results. Once exhausted the service is healthy.
    pub fn script_health(&self, results: impl IntoIterator<Item = bool>) {
        self.health_script.lock().unwrap().extend(results);
    }

    /// Delay the next health probes by `delays`, one per call.
    pub fn delay_health(&self, delays: impl IntoIterator<Item = Duration>) {
        self.health_delays.lock().unwrap().extend(delays);
    }

    /// Body (or error status) returned by the next `POST /jobs`.
    pub fn reply_to_submit(&self, reply: Result<serde_json::Value, u16>) {
        *self.submit_reply.lock().unwrap() = Some(reply);
    }

    pub fn status_calls(&self, job_id: &str) -> usize {
        self.status_calls
            .lock()
            .unwrap()
            .get(&JobId::from(job_id))
            .copied()
            .unwrap_or(0)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn health_calls(&self) -> usize {
        self.health_calls.load(Ordering::SeqCst)
    }

    pub fn submissions(&self) -> Vec<(usize, String, Filter)> {
        self.submissions.lock().unwrap().clone()
    }

    fn next_reply(&self, job_id: &JobId) -> Reply {
        *self
            .status_calls
            .lock()
            .unwrap()
            .entry(job_id.clone())
            .or_default() += 1;

        self.scripts
            .lock()
            .unwrap()
            .get_mut(job_id)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| status("pending"))
    }
}

async fn resolve(reply: Reply) -> Result<JobStatusResponse, ApiError> {
    let mut reply = reply;
    loop {
        match reply {
            Reply::Status(body) => return Ok(body),
            Reply::HttpError(code) => {
                return Err(ApiError::Status {
                    status: code,
                    body: "scripted failure".into(),
                })
            }
            Reply::NetworkError => return Err(network_error()),
            Reply::Slow(delay, inner) => {
                tokio::time::sleep(delay).await;
                reply = *inner;
            }
        }
    }
}

/// Decrements the in-flight counter even if the probe future is dropped.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl JobService for ScriptedService {
    async fn submit_job(
        &self,
        image: Vec<u8>,
        filename: &str,
        filter: Filter,
    ) -> Result<SubmissionResponse, ApiError> {
        self.submissions
            .lock()
            .unwrap()
            .push((image.len(), filename.to_string(), filter));

        let reply = self
            .submit_reply
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Ok(serde_json::json!({ "id": "job-1" })));

        match reply {
            Ok(body) => Ok(serde_json::from_value(body).expect("scripted body must decode")),
            Err(code) => Err(ApiError::Status {
                status: code,
                body: "scripted failure".into(),
            }),
        }
    }

    async fn job_status(&self, job_id: &JobId) -> Result<JobStatusResponse, ApiError> {
        let reply = self.next_reply(job_id);

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        resolve(reply).await
    }

    async fn health(&self) -> Result<(), ApiError> {
        self.health_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.health_delays.lock().unwrap().pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let healthy = self.health_script.lock().unwrap().pop_front().unwrap_or(true);
        if healthy {
            Ok(())
        } else {
            Err(network_error())
        }
    }
}

// ---------------------------------------------------------------------------
// Event helpers
// ---------------------------------------------------------------------------

pub fn bus() -> Arc<EventBus> {
    Arc::new(EventBus::default())
}

/// Wait (on the paused clock) for the next event.
pub async fn next_event(rx: &mut broadcast::Receiver<TrackerEvent>) -> TrackerEvent {
    tokio::time::timeout(Duration::from_secs(120), rx.recv())
        .await
        .expect("timed out waiting for tracker event")
        .expect("event channel closed")
}

/// Let `duration` of paused time pass, then assert nothing was published.
pub async fn assert_quiet(rx: &mut broadcast::Receiver<TrackerEvent>, duration: Duration) {
    tokio::time::sleep(duration).await;
    match rx.try_recv() {
        Err(TryRecvError::Empty) => {}
        other => panic!("expected no events, got {other:?}"),
    }
}
