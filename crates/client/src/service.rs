//! The seam between the tracker and the remote service.
//!
//! [`JobTracker`](crate::tracker::JobTracker) and
//! [`LivenessMonitor`](crate::liveness::LivenessMonitor) only talk to the
//! service through this trait, so they can be driven by
//! [`RetroApi`](crate::api::RetroApi) in production and by an in-memory
//! double in tests.

use async_trait::async_trait;
use retro_core::filter::Filter;
use retro_core::job::{JobId, JobStatusResponse, SubmissionResponse};

use crate::api::ApiError;

#[async_trait]
pub trait JobService: Send + Sync {
    /// `POST /jobs` with the image bytes and filter name.
    async fn submit_job(
        &self,
        image: Vec<u8>,
        filename: &str,
        filter: Filter,
    ) -> Result<SubmissionResponse, ApiError>;

    /// `GET /jobs/{id}`.
    async fn job_status(&self, job_id: &JobId) -> Result<JobStatusResponse, ApiError>;

    /// `GET /healthz`. `Ok` means healthy.
    async fn health(&self) -> Result<(), ApiError>;
}
