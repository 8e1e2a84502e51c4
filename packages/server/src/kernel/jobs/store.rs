//! Job storage: the durable queue contract and the in-memory implementation.
//!
//! The store owns job identity and the atomicity of multi-step invariants
//! (deduplicated insert in particular). Listing queries for the worker are
//! not tenant-scoped; one worker serves every tenant.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

use super::job::{Job, JobStatus, JobType};

/// Applied when the caller leaves `max_retries` at zero.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

#[derive(Debug, Error)]
pub enum JobStoreError {
    #[error("job not found: {0}")]
    NotFound(Uuid),
    #[error("storage error: {0}")]
    Storage(String),
}

/// Durable mapping from job id to job record.
///
/// All operations are individually atomic. `enqueue_dedup` is the one
/// multi-step invariant ("insert only if no active prior exists") and every
/// implementation must make it atomic: a lock here, a transaction plus
/// unique constraint in the relational store.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persist a new job. Assigns identity and timestamps; caller-supplied
    /// ids are discarded, and `max_retries` defaults when zero.
    async fn enqueue(&self, job: Job) -> Result<Job, JobStoreError>;

    /// Insert unless an active or `Done` job already holds the same
    /// `(tenant, deduplication_key)`. Returns the winning record and
    /// whether it was a duplicate hit.
    async fn enqueue_dedup(&self, job: Job) -> Result<(Job, bool), JobStoreError>;

    /// Tenant-scoped read.
    async fn get(&self, tenant_id: &str, id: Uuid) -> Result<Option<Job>, JobStoreError>;

    /// Most recent job for `(tenant, deduplication_key)`, regardless of status.
    async fn get_by_dedup(&self, tenant_id: &str, key: &str)
        -> Result<Option<Job>, JobStoreError>;

    /// Write all mutable fields and advance `updated_at`. The stored
    /// tenant and creation time are preserved.
    async fn update(&self, job: &Job) -> Result<Job, JobStoreError>;

    /// Record processor progress without touching the rest of the job.
    async fn update_progress(&self, id: Uuid, step: &str, pct: u8) -> Result<(), JobStoreError>;

    /// All `Queued` jobs across tenants, oldest first.
    async fn list_queued(&self) -> Result<Vec<Job>, JobStoreError>;

    /// All `Retry` jobs across tenants, oldest first. Backoff gating is the
    /// worker's concern.
    async fn list_retry(&self) -> Result<Vec<Job>, JobStoreError>;

    /// All `Running` jobs across tenants; used by the restart recovery sweep.
    async fn list_running(&self) -> Result<Vec<Job>, JobStoreError>;

    async fn list_dead_letter(&self) -> Result<Vec<Job>, JobStoreError>;

    /// Atomic status set to `DeadLetter`.
    async fn move_to_dead_letter(&self, id: Uuid) -> Result<(), JobStoreError>;

    /// Operator re-entry point: back to `Queued` with retry credit restored
    /// and the error cleared.
    async fn requeue_dead_letter(&self, id: Uuid) -> Result<Job, JobStoreError>;

    /// Jobs for `(tenant, input_ref, type)`, most recently updated first.
    /// Supports "is there already a completed export for this version?".
    async fn list_by_input(
        &self,
        tenant_id: &str,
        input_ref: &str,
        job_type: JobType,
    ) -> Result<Vec<Job>, JobStoreError>;
}

// ============================================================================
// In-memory implementation
// ============================================================================

/// In-memory job store for tests and single-process deployments.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<Uuid, Job>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepare an incoming record for insert: fresh identity, fresh
    /// timestamps, defaulted retry budget.
    fn sanitize(mut job: Job) -> Job {
        job.id = Uuid::new_v4();
        let now = Utc::now();
        job.created_at = now;
        job.updated_at = now;
        if job.max_retries == 0 {
            job.max_retries = DEFAULT_MAX_RETRIES;
        }
        job
    }

    fn by_status(&self, status: JobStatus) -> Result<Vec<Job>, JobStoreError> {
        let jobs = self.jobs.read().map_err(lock_poisoned)?;
        let mut out: Vec<Job> = jobs
            .values()
            .filter(|j| j.status == status)
            .cloned()
            .collect();
        out.sort_by_key(|j| j.created_at);
        Ok(out)
    }
}

fn lock_poisoned<T>(_: std::sync::PoisonError<T>) -> JobStoreError {
    JobStoreError::Storage("job store lock poisoned".to_string())
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn enqueue(&self, job: Job) -> Result<Job, JobStoreError> {
        let job = Self::sanitize(job);
        let mut jobs = self.jobs.write().map_err(lock_poisoned)?;
        jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn enqueue_dedup(&self, job: Job) -> Result<(Job, bool), JobStoreError> {
        let key = match &job.deduplication_key {
            Some(key) => key.clone(),
            None => return self.enqueue(job).await.map(|j| (j, false)),
        };

        // Single write lock makes lookup + insert atomic.
        let mut jobs = self.jobs.write().map_err(lock_poisoned)?;
        let prior = jobs
            .values()
            .filter(|j| {
                j.tenant_id == job.tenant_id && j.deduplication_key.as_deref() == Some(key.as_str())
            })
            .max_by_key(|j| j.created_at)
            .cloned();

        if let Some(prior) = prior {
            if prior.status.is_active() || prior.status == JobStatus::Done {
                return Ok((prior, true));
            }
        }

        let job = Self::sanitize(job);
        jobs.insert(job.id, job.clone());
        Ok((job, false))
    }

    async fn get(&self, tenant_id: &str, id: Uuid) -> Result<Option<Job>, JobStoreError> {
        let jobs = self.jobs.read().map_err(lock_poisoned)?;
        Ok(jobs
            .get(&id)
            .filter(|j| j.tenant_id == tenant_id)
            .cloned())
    }

    async fn get_by_dedup(
        &self,
        tenant_id: &str,
        key: &str,
    ) -> Result<Option<Job>, JobStoreError> {
        let jobs = self.jobs.read().map_err(lock_poisoned)?;
        Ok(jobs
            .values()
            .filter(|j| j.tenant_id == tenant_id && j.deduplication_key.as_deref() == Some(key))
            .max_by_key(|j| j.created_at)
            .cloned())
    }

    async fn update(&self, job: &Job) -> Result<Job, JobStoreError> {
        let mut jobs = self.jobs.write().map_err(lock_poisoned)?;
        let existing = jobs.get(&job.id).ok_or(JobStoreError::NotFound(job.id))?;

        let mut updated = job.clone();
        updated.tenant_id = existing.tenant_id.clone();
        updated.created_at = existing.created_at;
        updated.updated_at = Utc::now();
        jobs.insert(updated.id, updated.clone());
        Ok(updated)
    }

    async fn update_progress(&self, id: Uuid, step: &str, pct: u8) -> Result<(), JobStoreError> {
        let mut jobs = self.jobs.write().map_err(lock_poisoned)?;
        let job = jobs.get_mut(&id).ok_or(JobStoreError::NotFound(id))?;
        job.progress_step = Some(step.to_string());
        job.progress_pct = Some(pct.min(100));
        job.updated_at = Utc::now();
        Ok(())
    }

    async fn list_queued(&self) -> Result<Vec<Job>, JobStoreError> {
        self.by_status(JobStatus::Queued)
    }

    async fn list_retry(&self) -> Result<Vec<Job>, JobStoreError> {
        self.by_status(JobStatus::Retry)
    }

    async fn list_running(&self) -> Result<Vec<Job>, JobStoreError> {
        self.by_status(JobStatus::Running)
    }

    async fn list_dead_letter(&self) -> Result<Vec<Job>, JobStoreError> {
        self.by_status(JobStatus::DeadLetter)
    }

    async fn move_to_dead_letter(&self, id: Uuid) -> Result<(), JobStoreError> {
        let mut jobs = self.jobs.write().map_err(lock_poisoned)?;
        let job = jobs.get_mut(&id).ok_or(JobStoreError::NotFound(id))?;
        job.status = JobStatus::DeadLetter;
        job.updated_at = Utc::now();
        Ok(())
    }

    async fn requeue_dead_letter(&self, id: Uuid) -> Result<Job, JobStoreError> {
        let mut jobs = self.jobs.write().map_err(lock_poisoned)?;
        let job = jobs.get_mut(&id).ok_or(JobStoreError::NotFound(id))?;
        job.status = JobStatus::Queued;
        job.retry_count = 0;
        job.error = None;
        job.last_retry_at = None;
        job.updated_at = Utc::now();
        Ok(job.clone())
    }

    async fn list_by_input(
        &self,
        tenant_id: &str,
        input_ref: &str,
        job_type: JobType,
    ) -> Result<Vec<Job>, JobStoreError> {
        let jobs = self.jobs.read().map_err(lock_poisoned)?;
        let mut out: Vec<Job> = jobs
            .values()
            .filter(|j| {
                j.tenant_id == tenant_id && j.input_ref == input_ref && j.job_type == job_type
            })
            .cloned()
            .collect();
        out.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(out)
    }
}
