//! Processor registry: one handler per job type.
//!
//! The registry maps a [`JobType`] to an async processor. Processors take
//! the claimed job, the per-job cancellation token, and the shared
//! dependencies, and return the job's `output_ref` on success. Status
//! transitions belong to the worker; processors never touch job status.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::kernel::deps::ServerDeps;

use super::error::ProcessorError;
use super::job::{Job, JobType};

/// The boxed future a processor returns.
pub type ProcessorFuture = Pin<Box<dyn Future<Output = Result<String, ProcessorError>> + Send>>;

/// Type alias for the boxed async processor function.
type BoxedProcessor =
    Box<dyn Fn(CancellationToken, Job, Arc<ServerDeps>) -> ProcessorFuture + Send + Sync>;

/// Registry that maps job types to processors.
///
/// # Example
///
/// ```ignore
/// let mut registry = ProcessorRegistry::new();
/// registry.register(JobType::Export, processors::render::run_render);
///
/// // Later, in the worker
/// let output_ref = registry.execute(cancel, job, deps.clone()).await?;
/// ```
#[derive(Default)]
pub struct ProcessorRegistry {
    processors: HashMap<JobType, BoxedProcessor>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self {
            processors: HashMap::new(),
        }
    }

    /// Register the processor for a job type, replacing any prior one.
    pub fn register<F, Fut>(&mut self, job_type: JobType, processor: F)
    where
        F: Fn(CancellationToken, Job, Arc<ServerDeps>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, ProcessorError>> + Send + 'static,
    {
        let boxed: BoxedProcessor =
            Box::new(move |cancel, job, deps| Box::pin(processor(cancel, job, deps)));
        self.processors.insert(job_type, boxed);
    }

    /// Run the registered processor for the job's type.
    pub async fn execute(
        &self,
        cancel: CancellationToken,
        job: Job,
        deps: Arc<ServerDeps>,
    ) -> Result<String, ProcessorError> {
        let processor = self
            .processors
            .get(&job.job_type)
            .ok_or_else(|| ProcessorError::UnsupportedType(job.job_type.to_string()))?;
        processor(cancel, job, deps).await
    }

    pub fn is_registered(&self, job_type: JobType) -> bool {
        self.processors.contains_key(&job_type)
    }

    pub fn registered_types(&self) -> Vec<JobType> {
        self.processors.keys().copied().collect()
    }
}

/// Thread-safe registry wrapped in Arc.
pub type SharedProcessorRegistry = Arc<ProcessorRegistry>;
