//! Per-job-type retry budgets and backoff schedule.

use std::time::Duration;

/// Retry configuration for one job type.
///
/// Holds no mutable state; the retry bookkeeping lives on the job record.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Bound on retry attempts. Zero disables retries entirely.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Cap applied to the exponential schedule.
    pub max_delay: Duration,
    /// Multiplier between consecutive retries.
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(300),
            backoff_factor: 2.0,
        }
    }
}

impl RetryPolicy {
    /// A policy with no waiting between attempts, for tests and
    /// time-accelerated runs.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_factor: 1.0,
        }
    }

    /// Delay gating the nth retry: `initial * factor^(n-1)`, capped at
    /// `max_delay`. `retry_count` is the job's current retry count (1 after
    /// the first failed attempt).
    pub fn next_delay(&self, retry_count: u32) -> Duration {
        let n = retry_count.max(1);
        let base_ms = self.initial_delay.as_millis() as f64;
        let cap_ms = self.max_delay.as_millis() as f64;
        let delay_ms = (base_ms * self.backoff_factor.powi((n - 1) as i32)).min(cap_ms);
        Duration::from_millis(delay_ms.max(0.0) as u64)
    }
}
