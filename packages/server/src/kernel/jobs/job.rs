//! Job model for asynchronous presentation work.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;
use uuid::Uuid;

// ============================================================================
// Enums
// ============================================================================

/// The kind of work a job performs, routed to one processor each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "job_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    /// AI-generate a template spec and record it as a new template version.
    Generate,
    /// Bind content onto a template spec, producing a new deck version.
    Bind,
    /// Render a version spec to a PPTX artifact.
    Render,
    /// Per-slide PNG thumbnails for a template version.
    Preview,
    /// Render a version spec to a downloadable PPTX export.
    Export,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::Generate => "generate",
            JobType::Bind => "bind",
            JobType::Render => "render",
            JobType::Preview => "preview",
            JobType::Export => "export",
        }
    }

    /// All known job types, in dispatch-registration order.
    pub fn all() -> [JobType; 5] {
        [
            JobType::Generate,
            JobType::Bind,
            JobType::Render,
            JobType::Preview,
            JobType::Export,
        ]
    }
}

impl std::fmt::Display for JobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Job execution status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "job_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting to be picked up by the worker.
    #[default]
    Queued,
    /// Claimed by the worker, processor in flight.
    Running,
    /// Finished; `output_ref` holds the result handle.
    Done,
    /// Permanent failure recorded without consuming retry credit.
    Failed,
    /// Failed retryably; waiting out the backoff window.
    Retry,
    /// Retries exhausted or permanent error; operator action required.
    DeadLetter,
}

impl JobStatus {
    /// Whether the job still occupies its deduplication key.
    pub fn is_active(&self) -> bool {
        matches!(self, JobStatus::Queued | JobStatus::Running | JobStatus::Retry)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed | JobStatus::DeadLetter)
    }
}

// ============================================================================
// Job
// ============================================================================

/// One unit of asynchronous work.
///
/// Jobs are created by the enqueue API, mutated only by the worker (plus the
/// explicit dead-letter requeue), and never deleted. All status transitions
/// go through the helpers below so the bookkeeping fields stay consistent.
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
pub struct Job {
    #[builder(default = Uuid::new_v4())]
    pub id: Uuid,

    pub tenant_id: String,
    pub job_type: JobType,

    #[builder(default)]
    pub status: JobStatus,

    /// Type-specific input: a template id, version id, or deck id.
    pub input_ref: String,

    /// Result handle, set only on `Done`. An asset id for render, export,
    /// and preview jobs; a version id for generate and bind.
    #[builder(default, setter(strip_option))]
    pub output_ref: Option<String>,

    #[builder(default, setter(strip_option))]
    pub error: Option<String>,

    #[builder(default = 0)]
    pub retry_count: u32,
    #[builder(default = 0)]
    pub max_retries: u32,

    /// Timestamp of the most recent failed attempt; basis for backoff gating.
    #[builder(default, setter(strip_option))]
    pub last_retry_at: Option<DateTime<Utc>>,

    #[builder(default, setter(strip_option))]
    pub deduplication_key: Option<String>,

    /// Caller-supplied context. Required for generate and bind jobs;
    /// the processor dead-letters when it is absent.
    #[builder(default, setter(strip_option))]
    pub metadata: Option<HashMap<String, String>>,

    #[builder(default, setter(strip_option))]
    pub progress_step: Option<String>,
    #[builder(default, setter(strip_option))]
    pub progress_pct: Option<u8>,

    #[builder(default = Utc::now())]
    pub created_at: DateTime<Utc>,
    #[builder(default = Utc::now())]
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Read a metadata value, treating absent metadata as absent key.
    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|m| m.get(key))
            .map(String::as_str)
    }

    /// Claim the job for an attempt.
    pub fn begin_attempt(&mut self) {
        self.status = JobStatus::Running;
        self.updated_at = Utc::now();
    }

    /// Record a successful attempt.
    pub fn complete(&mut self, output_ref: String) {
        self.status = JobStatus::Done;
        self.output_ref = Some(output_ref);
        self.error = None;
        self.updated_at = Utc::now();
    }

    /// Record a retryable failure and consume one retry credit.
    pub fn schedule_retry(&mut self, error: String, now: DateTime<Utc>) {
        self.status = JobStatus::Retry;
        self.retry_count += 1;
        self.last_retry_at = Some(now);
        self.error = Some(error);
        self.updated_at = now;
    }

    /// Quarantine the job for operator attention.
    pub fn dead_letter(&mut self, error: String) {
        self.status = JobStatus::DeadLetter;
        self.error = Some(error);
        self.updated_at = Utc::now();
    }

    /// Whether a `Retry` job has waited out its backoff window.
    ///
    /// A retry with no `last_retry_at` is treated as immediately ready
    /// rather than waiting a full window.
    pub fn retry_ready(&self, delay: Duration, now: DateTime<Utc>) -> bool {
        match self.last_retry_at {
            None => true,
            Some(at) => at + chrono::Duration::from_std(delay).unwrap_or_default() <= now,
        }
    }
}
