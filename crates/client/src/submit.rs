//! Submission flow: validate the image, `POST /jobs`, hand the job to the
//! tracker.
//!
//! Unlike polling failures, submission failures are returned to the caller
//! so the front end can report them and reset.

use retro_core::error::CoreError;
use retro_core::filter::Filter;
use retro_core::job::JobDescriptor;
use retro_core::png::validate_png;

use crate::api::ApiError;
use crate::service::JobService;
use crate::tracker::JobTracker;

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    /// The payload was rejected locally; nothing was sent.
    #[error("Invalid image: {0}")]
    InvalidImage(#[from] CoreError),

    /// The request failed or the service answered with a non-2xx status.
    #[error("Submission failed: {0}")]
    Api(#[from] ApiError),

    /// The service accepted the upload but returned no `id` / `job_id`.
    #[error("Submission response did not contain a job id")]
    MissingJobId,
}

/// Submit `image` with `filter` and register the resulting job.
///
/// Returns the descriptor the service assigned. Tracking continues in the
/// background; subscribe to the tracker to follow it.
pub async fn submit_job(
    service: &dyn JobService,
    tracker: &JobTracker,
    image: Vec<u8>,
    filename: &str,
    filter: Filter,
) -> Result<JobDescriptor, SubmitError> {
    validate_png(&image)?;

    let size_bytes = image.len();
    let response = service.submit_job(image, filename, filter).await?;
    let descriptor = JobDescriptor::from_submission(response).ok_or(SubmitError::MissingJobId)?;

    tracing::info!(
        job_id = %descriptor.id,
        filename,
        size_bytes,
        filter = %filter,
        "Job submitted",
    );

    tracker.register(descriptor.clone()).await;
    Ok(descriptor)
}
