//! Service configuration.
//!
//! One aggregate object; no module-level mutable state. The bin reads the
//! environment (via dotenvy) once at startup and hands the result to
//! `ServerDeps`.

use std::collections::HashMap;
use std::time::Duration;

use super::jobs::{JobType, RetryPolicy};

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// How often the worker polls for ready jobs.
    pub poll_interval: Duration,
    /// Per-job deadline; exceeding it is a retryable failure.
    pub job_timeout: Duration,
    /// Retry policy per job type. Types without an entry use the default.
    pub retry: HashMap<JobType, RetryPolicy>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        let retry = JobType::all()
            .into_iter()
            .map(|t| (t, RetryPolicy::default()))
            .collect();
        Self {
            poll_interval: Duration::from_secs(5),
            job_timeout: Duration::from_secs(300),
            retry,
        }
    }
}

impl ServiceConfig {
    /// Read overrides from the environment; anything unset keeps defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(secs) = env_u64("POLL_INTERVAL_SECS") {
            config.poll_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = env_u64("JOB_TIMEOUT_SECS") {
            config.job_timeout = Duration::from_secs(secs);
        }
        config
    }

    /// Override the retry policy for one job type.
    pub fn with_retry_policy(mut self, job_type: JobType, policy: RetryPolicy) -> Self {
        self.retry.insert(job_type, policy);
        self
    }

    pub fn retry_policy(&self, job_type: JobType) -> RetryPolicy {
        self.retry.get(&job_type).cloned().unwrap_or_default()
    }
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}
