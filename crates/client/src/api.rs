//! REST API client for the retro filter service.
//!
//! Wraps the three HTTP endpoints the client depends on (job submission,
//! job status, health) using [`reqwest`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use retro_core::filter::Filter;
use retro_core::job::{JobId, JobStatusResponse, SubmissionResponse};
use retro_core::png::PNG_MIME;

use crate::service::JobService;

/// Default per-request timeout for the health probe.
pub const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Default per-request timeout for a job status probe. A probe that times
/// out is a skipped tick like any other request failure.
pub const DEFAULT_STATUS_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for a single retro filter service.
pub struct RetroApi {
    client: reqwest::Client,
    api_url: String,
    health_timeout: Duration,
    status_timeout: Duration,
}

/// Errors from the REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout, body decode).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service returned a non-2xx status code.
    #[error("Retro API error ({status}): {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },
}

impl RetroApi {
    /// Create a new API client.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `http://localhost:8081`.
    pub fn new(api_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), api_url)
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, api_url: impl Into<String>) -> Self {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            api_url,
            health_timeout: DEFAULT_HEALTH_TIMEOUT,
            status_timeout: DEFAULT_STATUS_TIMEOUT,
        }
    }

    /// Override the health probe timeout.
    pub fn with_health_timeout(mut self, timeout: Duration) -> Self {
        self.health_timeout = timeout;
        self
    }

    /// Override the job status probe timeout.
    pub fn with_status_timeout(mut self, timeout: Duration) -> Self {
        self.status_timeout = timeout;
        self
    }

    /// Base URL with any trailing slash removed.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Submit an image for filtering.
    ///
    /// Sends a `POST /jobs` multipart request with an `image` part and a
    /// `filter` field.
    pub async fn post_job(
        &self,
        image: Vec<u8>,
        filename: &str,
        filter: Filter,
    ) -> Result<SubmissionResponse, ApiError> {
        let image_part = Part::bytes(image)
            .file_name(filename.to_string())
            .mime_str(PNG_MIME)?;
        let form = Form::new()
            .part("image", image_part)
            .text("filter", filter.as_str());

        let response = self
            .client
            .post(format!("{}/jobs", self.api_url))
            .multipart(form)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Fetch the current status of a job via `GET /jobs/{id}`.
    pub async fn get_job(&self, job_id: &JobId) -> Result<JobStatusResponse, ApiError> {
        let response = self
            .client
            .get(format!("{}/jobs/{}", self.api_url, job_id))
            .timeout(self.status_timeout)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Probe `GET /healthz`. Any 2xx response is healthy.
    pub async fn get_health(&self) -> Result<(), ApiError> {
        let response = self
            .client
            .get(format!("{}/healthz", self.api_url))
            .timeout(self.health_timeout)
            .send()
            .await?;

        Self::check_status(response).await
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or an [`ApiError::Status`]
    /// containing the status and body text on failure.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }

    /// Assert the response has a success status code, discarding the body.
    async fn check_status(response: reqwest::Response) -> Result<(), ApiError> {
        Self::ensure_success(response).await?;
        Ok(())
    }
}

#[async_trait]
impl JobService for RetroApi {
    async fn submit_job(
        &self,
        image: Vec<u8>,
        filename: &str,
        filter: Filter,
    ) -> Result<SubmissionResponse, ApiError> {
        self.post_job(image, filename, filter).await
    }

    async fn job_status(&self, job_id: &JobId) -> Result<JobStatusResponse, ApiError> {
        self.get_job(job_id).await
    }

    async fn health(&self) -> Result<(), ApiError> {
        self.get_health().await
    }
}
