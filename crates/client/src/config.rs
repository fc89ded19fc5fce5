use std::time::Duration;

use crate::api::{DEFAULT_HEALTH_TIMEOUT, DEFAULT_STATUS_TIMEOUT};
use crate::liveness::DEFAULT_HEALTH_INTERVAL;
use crate::poller::DEFAULT_POLL_INTERVAL;

/// Default base URL of the retro filter service.
pub const DEFAULT_API_URL: &str = "http://localhost:8081";

/// Client configuration loaded from environment variables.
///
/// All fields have defaults suitable for a service running locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the service (default: `http://localhost:8081`).
    pub api_url: String,
    /// Delay after each status probe (default: 2000 ms).
    pub poll_interval: Duration,
    /// Cadence of the liveness monitor (default: 15000 ms).
    pub health_interval: Duration,
    /// Per-request timeout of the health probe (default: 5000 ms).
    pub health_timeout: Duration,
    /// Per-request timeout of a job status probe (default: 30000 ms).
    pub status_timeout: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be a positive integer number of milliseconds, got '{value}'")]
    Invalid { var: &'static str, value: String },
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            health_interval: DEFAULT_HEALTH_INTERVAL,
            health_timeout: DEFAULT_HEALTH_TIMEOUT,
            status_timeout: DEFAULT_STATUS_TIMEOUT,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var              | Default                 |
    /// |----------------------|-------------------------|
    /// | `RETRO_API_URL`      | `http://localhost:8081` |
    /// | `POLL_INTERVAL_MS`   | `2000`                  |
    /// | `HEALTH_INTERVAL_MS` | `15000`                 |
    /// | `HEALTH_TIMEOUT_MS`  | `5000`                  |
    /// | `STATUS_TIMEOUT_MS`  | `30000`                 |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reads values through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let api_url = lookup("RETRO_API_URL")
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .unwrap_or(defaults.api_url);

        Ok(Self {
            api_url,
            poll_interval: millis(&lookup, "POLL_INTERVAL_MS", defaults.poll_interval)?,
            health_interval: millis(&lookup, "HEALTH_INTERVAL_MS", defaults.health_interval)?,
            health_timeout: millis(&lookup, "HEALTH_TIMEOUT_MS", defaults.health_timeout)?,
            status_timeout: millis(&lookup, "STATUS_TIMEOUT_MS", defaults.status_timeout)?,
        })
    }
}

fn millis<F>(lookup: &F, var: &'static str, default: Duration) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(var) else {
        return Ok(default);
    };
    match raw.trim().parse::<u64>() {
        Ok(ms) if ms > 0 => Ok(Duration::from_millis(ms)),
        _ => Err(ConfigError::Invalid { var, value: raw }),
    }
}
