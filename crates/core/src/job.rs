//! Job identifiers, statuses, and the wire shapes of the job endpoints.
//!
//! The service owns the status vocabulary. Only [`STATUS_COMPLETED`] and
//! [`STATUS_FAILED`] are terminal; any other string (including a missing
//! field) keeps a job in the non-terminal state and is preserved verbatim
//! so the sink can display it.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

// ---------------------------------------------------------------------------
// Status constants
// ---------------------------------------------------------------------------

/// Initial status, also used when the service omits the field.
pub const STATUS_PENDING: &str = "pending";

/// The job finished and (usually) produced a result image.
pub const STATUS_COMPLETED: &str = "completed";

/// The job finished without a result.
pub const STATUS_FAILED: &str = "failed";

// ---------------------------------------------------------------------------
// JobId
// ---------------------------------------------------------------------------

/// Opaque, service-assigned job identifier.
///
/// The service may encode ids as JSON strings or numbers; both are
/// normalised to their string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// An empty id is treated the same as a missing one.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl<'de> Deserialize<'de> for JobId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Number(serde_json::Number),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(s) => Self(s),
            RawId::Number(n) => Self(n.to_string()),
        })
    }
}

// ---------------------------------------------------------------------------
// JobStatus
// ---------------------------------------------------------------------------

/// Status reported by the service for a job.
///
/// `Other` carries any non-terminal string the service invents
/// (`"processing"`, `"queued"`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "String")]
pub enum JobStatus {
    #[default]
    Pending,
    Completed,
    Failed,
    Other(String),
}

impl JobStatus {
    /// `completed` and `failed` end the job's polling loop.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => STATUS_PENDING,
            Self::Completed => STATUS_COMPLETED,
            Self::Failed => STATUS_FAILED,
            Self::Other(s) => s,
        }
    }
}

impl From<&str> for JobStatus {
    fn from(s: &str) -> Self {
        match s {
            "" | STATUS_PENDING => Self::Pending,
            STATUS_COMPLETED => Self::Completed,
            STATUS_FAILED => Self::Failed,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<Option<String>> for JobStatus {
    fn from(raw: Option<String>) -> Self {
        raw.as_deref().map(Self::from).unwrap_or_default()
    }
}

impl From<JobStatus> for String {
    fn from(status: JobStatus) -> Self {
        match status {
            JobStatus::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Wire shapes
// ---------------------------------------------------------------------------

/// Body returned by `POST /jobs`.
///
/// Older service builds answer with `job_id`, newer ones with `id`.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmissionResponse {
    #[serde(default)]
    pub id: Option<JobId>,
    #[serde(default)]
    pub job_id: Option<JobId>,
    #[serde(default)]
    pub status: Option<JobStatus>,
}

/// Body returned by `GET /jobs/{id}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobStatusResponse {
    #[serde(default)]
    pub status: JobStatus,
    #[serde(default)]
    pub result_url: Option<String>,
}

impl JobStatusResponse {
    /// The result reference, ignoring an empty string.
    pub fn result_url(&self) -> Option<&str> {
        self.result_url.as_deref().filter(|url| !url.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Descriptor and snapshot
// ---------------------------------------------------------------------------

/// A job as handed to the tracker: an id plus an optional initial status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDescriptor {
    pub id: JobId,
    pub status: Option<JobStatus>,
}

impl JobDescriptor {
    pub fn new(id: impl Into<JobId>) -> Self {
        Self {
            id: id.into(),
            status: None,
        }
    }

    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// The status to display before the first poll.
    pub fn initial_status(&self) -> JobStatus {
        self.status.clone().unwrap_or_default()
    }

    /// Build a descriptor from a submission body, preferring `id` over
    /// `job_id`. Returns `None` when neither carries a non-empty id.
    pub fn from_submission(response: SubmissionResponse) -> Option<Self> {
        let id = response
            .id
            .filter(|id| !id.is_empty())
            .or(response.job_id.filter(|id| !id.is_empty()))?;

        Some(Self {
            id,
            status: response.status,
        })
    }
}

/// The tracker's latest observation of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobSnapshot {
    pub id: JobId,
    pub status: JobStatus,
    pub result_url: Option<String>,
    pub observed_at: DateTime<Utc>,
}

impl JobSnapshot {
    pub fn new(id: JobId, status: JobStatus) -> Self {
        Self {
            id,
            status,
            result_url: None,
            observed_at: Utc::now(),
        }
    }
}
