//! Enqueue API: the external entry point into the pipeline.
//!
//! Assigns job identity (via the store), applies deduplication, persists a
//! queued record, and reports whether the caller got a fresh job or an
//! existing one.

use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

use crate::kernel::config::ServiceConfig;

use super::job::{Job, JobType};
use super::store::{JobStore, JobStoreError};

/// Optional enqueue parameters.
#[derive(Debug, Clone, Default)]
pub struct EnqueueOptions {
    /// Stable caller key; concurrent submissions with the same key collapse
    /// onto one job while it is active or already done.
    pub deduplication_key: Option<String>,
    /// Caller context. Required for generate and bind jobs; the processor
    /// enforces that contract.
    pub metadata: Option<HashMap<String, String>>,
}

impl EnqueueOptions {
    pub fn with_dedup_key(key: impl Into<String>) -> Self {
        Self {
            deduplication_key: Some(key.into()),
            ..Default::default()
        }
    }

    pub fn with_metadata(metadata: HashMap<String, String>) -> Self {
        Self {
            metadata: Some(metadata),
            ..Default::default()
        }
    }
}

/// Result of an enqueue that distinguishes fresh inserts from dedup hits.
#[derive(Debug, Clone)]
pub enum EnqueueResult {
    /// A new job was persisted.
    Created(Job),
    /// An active or completed prior job holds the deduplication key.
    Duplicate(Job),
}

impl EnqueueResult {
    pub fn job(&self) -> &Job {
        match self {
            EnqueueResult::Created(job) | EnqueueResult::Duplicate(job) => job,
        }
    }

    pub fn into_job(self) -> Job {
        match self {
            EnqueueResult::Created(job) | EnqueueResult::Duplicate(job) => job,
        }
    }

    pub fn job_id(&self) -> Uuid {
        self.job().id
    }

    pub fn was_duplicate(&self) -> bool {
        matches!(self, EnqueueResult::Duplicate(_))
    }
}

/// External entry point for submitting work.
pub struct JobQueue {
    store: Arc<dyn JobStore>,
    config: ServiceConfig,
}

impl JobQueue {
    pub fn new(store: Arc<dyn JobStore>, config: ServiceConfig) -> Self {
        Self { store, config }
    }

    /// Submit a job. The returned record carries store-assigned identity;
    /// the retry budget comes from the per-type policy.
    pub async fn enqueue(
        &self,
        tenant_id: &str,
        job_type: JobType,
        input_ref: &str,
        opts: EnqueueOptions,
    ) -> Result<EnqueueResult, JobStoreError> {
        let policy = self.config.retry_policy(job_type);
        let mut job = Job::builder()
            .tenant_id(tenant_id)
            .job_type(job_type)
            .input_ref(input_ref)
            .max_retries(policy.max_retries)
            .build();
        job.deduplication_key = opts.deduplication_key;
        job.metadata = opts.metadata;

        if job.deduplication_key.is_some() {
            let (job, was_duplicate) = self.store.enqueue_dedup(job).await?;
            if was_duplicate {
                Ok(EnqueueResult::Duplicate(job))
            } else {
                Ok(EnqueueResult::Created(job))
            }
        } else {
            let job = self.store.enqueue(job).await?;
            Ok(EnqueueResult::Created(job))
        }
    }
}
