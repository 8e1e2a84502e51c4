//! Job worker: the polling loop that drives the pipeline.
//!
//! The `JobWorker` is a long-running task that:
//! - Polls the job store for queued jobs and backoff-ready retries
//! - Dispatches each to its processor via the `ProcessorRegistry`
//! - Owns every status transition, including retry scheduling and
//!   dead-lettering
//! - Enforces the per-job deadline with a cancellation token the
//!   processors thread through to every collaborator
//!
//! # Architecture
//!
//! ```text
//! JobWorker
//!     │
//!     ├─► tick: list_queued + list_retry (backoff-gated)
//!     ├─► per job: Running, then ProcessorRegistry.execute under timeout
//!     │       └─► processor -> renderer / AI / asset store
//!     └─► Done / Retry / DeadLetter via JobStore.update
//! ```
//!
//! One worker task processes its batch sequentially; status transitions on
//! a single job are therefore strictly serial. Store errors while
//! recording a transition are logged and never crash the loop.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::kernel::deps::ServerDeps;

use super::error::{ErrorKind, ProcessorError};
use super::job::Job;
use super::registry::SharedProcessorRegistry;
use super::store::JobStore;

/// Configuration for the job worker.
#[derive(Debug, Clone)]
pub struct JobWorkerConfig {
    /// How long to wait between polls.
    pub poll_interval: Duration,
    /// Per-job deadline; exceeding it is a retryable failure.
    pub job_timeout: Duration,
    /// Worker ID for this instance, for log correlation.
    pub worker_id: String,
}

impl Default for JobWorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            job_timeout: Duration::from_secs(300),
            worker_id: format!("worker-{}", Uuid::new_v4()),
        }
    }
}

/// Background service that claims and processes jobs.
pub struct JobWorker {
    store: Arc<dyn JobStore>,
    registry: SharedProcessorRegistry,
    deps: Arc<ServerDeps>,
    config: JobWorkerConfig,
}

impl JobWorker {
    /// Create a worker wired from the shared dependencies.
    pub fn new(deps: Arc<ServerDeps>, registry: SharedProcessorRegistry) -> Self {
        let config = JobWorkerConfig {
            poll_interval: deps.config.poll_interval,
            job_timeout: deps.config.job_timeout,
            ..Default::default()
        };
        Self {
            store: deps.job_store.clone(),
            registry,
            deps,
            config,
        }
    }

    pub fn with_config(
        deps: Arc<ServerDeps>,
        registry: SharedProcessorRegistry,
        config: JobWorkerConfig,
    ) -> Self {
        Self {
            store: deps.job_store.clone(),
            registry,
            deps,
            config,
        }
    }

    /// Run until the shutdown token fires.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        info!(
            worker_id = %self.config.worker_id,
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            job_timeout_ms = self.config.job_timeout.as_millis() as u64,
            "job worker starting"
        );

        self.recover_stale().await;

        let mut interval = tokio::time::interval(self.config.poll_interval);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {}
            }
            self.tick(&shutdown).await;
        }

        info!(worker_id = %self.config.worker_id, "job worker stopped");
        Ok(())
    }

    /// One polling pass: claim queued jobs plus backoff-ready retries and
    /// process them sequentially.
    ///
    /// Public so tests (and operational tooling) can drive the worker
    /// without the timer.
    pub async fn tick(&self, shutdown: &CancellationToken) {
        let queued = match self.store.list_queued().await {
            Ok(jobs) => jobs,
            Err(e) => {
                error!(error = %e, "failed to list queued jobs");
                return;
            }
        };
        let retries = match self.store.list_retry().await {
            Ok(jobs) => jobs,
            Err(e) => {
                error!(error = %e, "failed to list retry jobs");
                return;
            }
        };

        let now = Utc::now();
        let ready_retries = retries.into_iter().filter(|job| {
            let delay = self
                .deps
                .config
                .retry_policy(job.job_type)
                .next_delay(job.retry_count);
            job.retry_ready(delay, now)
        });

        let batch: Vec<Job> = queued.into_iter().chain(ready_retries).collect();
        if batch.is_empty() {
            return;
        }
        debug!(count = batch.len(), "claimed jobs");

        for job in batch {
            if shutdown.is_cancelled() {
                break;
            }
            self.process_job(job, shutdown).await;
        }
    }

    /// Process a single claimed job under the per-job deadline.
    async fn process_job(&self, mut job: Job, shutdown: &CancellationToken) {
        let job_id = job.id;
        let job_type = job.job_type;

        job.begin_attempt();
        job = match self.store.update(&job).await {
            Ok(job) => job,
            Err(e) => {
                error!(job_id = %job_id, error = %e, "failed to mark job running");
                return;
            }
        };

        debug!(job_id = %job_id, job_type = %job_type, attempt = job.retry_count + 1, "executing job");

        let cancel = shutdown.child_token();
        let execution = self
            .registry
            .execute(cancel.clone(), job.clone(), self.deps.clone());

        let result = match tokio::time::timeout(self.config.job_timeout, execution).await {
            Ok(result) => result,
            Err(_) => {
                cancel.cancel();
                Err(ProcessorError::Timeout(self.config.job_timeout))
            }
        };

        match result {
            Ok(output_ref) => {
                job.complete(output_ref);
                if let Err(e) = self.store.update(&job).await {
                    error!(job_id = %job_id, error = %e, "failed to mark job done");
                    return;
                }
                info!(job_id = %job_id, job_type = %job_type, "job succeeded");
            }
            Err(e) => self.handle_failure(job, e).await,
        }
    }

    /// Record a failed attempt: schedule a retry when the error is
    /// retryable and credit remains, otherwise dead-letter with a
    /// composite message carrying the classification and attempt count.
    async fn handle_failure(&self, mut job: Job, err: ProcessorError) {
        let job_id = job.id;
        let kind = err.kind();

        if kind.should_retry() && job.retry_count < job.max_retries {
            job.schedule_retry(err.to_string(), Utc::now());
            warn!(
                job_id = %job_id,
                job_type = %job.job_type,
                retry_count = job.retry_count,
                max_retries = job.max_retries,
                error = %err,
                "job failed, retry scheduled"
            );
            if let Err(e) = self.store.update(&job).await {
                error!(job_id = %job_id, error = %e, "failed to schedule retry");
            }
            return;
        }

        let message = match kind {
            ErrorKind::Retryable => format!(
                "Final retry {}/{} failed ({}): {}",
                job.retry_count,
                job.max_retries,
                kind.as_str(),
                err
            ),
            ErrorKind::Permanent => format!(
                "{} failure on attempt {}: {}",
                kind.as_str(),
                job.retry_count + 1,
                err
            ),
        };

        warn!(
            job_id = %job_id,
            job_type = %job.job_type,
            classification = kind.as_str(),
            error = %err,
            "job dead-lettered"
        );
        job.dead_letter(message);
        if let Err(e) = self.store.update(&job).await {
            error!(job_id = %job_id, error = %e, "failed to dead-letter job");
        }
    }

    /// Startup recovery sweep: a job must never stay `Running` across
    /// worker restarts. Anything running longer than the job timeout is
    /// treated as a retryable timeout failure.
    pub async fn recover_stale(&self) {
        let running = match self.store.list_running().await {
            Ok(jobs) => jobs,
            Err(e) => {
                error!(error = %e, "recovery sweep failed to list running jobs");
                return;
            }
        };

        let timeout =
            chrono::Duration::from_std(self.config.job_timeout).unwrap_or(chrono::Duration::zero());
        let cutoff = Utc::now() - timeout;

        for job in running {
            if job.updated_at > cutoff {
                continue;
            }
            warn!(
                job_id = %job.id,
                job_type = %job.job_type,
                updated_at = %job.updated_at,
                "recovering job stuck in running"
            );
            self.handle_failure(job, ProcessorError::Timeout(self.config.job_timeout))
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::jobs::registry::ProcessorRegistry;
    use crate::kernel::jobs::{JobStatus, JobType, RetryPolicy};
    use crate::kernel::test_dependencies::test_deps_with_config;
    use crate::kernel::ServiceConfig;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn worker_with(
        registry: ProcessorRegistry,
        config: ServiceConfig,
    ) -> (JobWorker, Arc<ServerDeps>) {
        let deps = test_deps_with_config(config);
        let worker = JobWorker::new(deps.clone(), Arc::new(registry));
        (worker, deps)
    }

    fn accelerated_config(max_retries: u32) -> ServiceConfig {
        let mut config = ServiceConfig::default();
        for job_type in JobType::all() {
            config = config.with_retry_policy(job_type, RetryPolicy::immediate(max_retries));
        }
        config
    }

    async fn enqueue(deps: &ServerDeps, job_type: JobType, input: &str) -> Job {
        let policy = deps.config.retry_policy(job_type);
        let job = Job::builder()
            .tenant_id("acme")
            .job_type(job_type)
            .input_ref(input)
            .max_retries(policy.max_retries)
            .build();
        deps.job_store.enqueue(job).await.unwrap()
    }

    #[tokio::test]
    async fn successful_job_transitions_to_done() {
        let mut registry = ProcessorRegistry::new();
        registry.register(JobType::Render, |_c, _j, _d| async { Ok("out-1".to_string()) });
        let (worker, deps) = worker_with(registry, accelerated_config(2));

        let job = enqueue(&deps, JobType::Render, "v1").await;
        worker.tick(&CancellationToken::new()).await;

        let done = deps.job_store.get("acme", job.id).await.unwrap().unwrap();
        assert_eq!(done.status, JobStatus::Done);
        assert_eq!(done.output_ref.as_deref(), Some("out-1"));
        assert!(done.error.is_none());
    }

    #[tokio::test]
    async fn retryable_failure_schedules_retry_then_dead_letters() {
        let mut registry = ProcessorRegistry::new();
        registry.register(JobType::Render, |_c, _j, _d| async {
            Err(ProcessorError::Renderer("socket closed".to_string()))
        });
        let (worker, deps) = worker_with(registry, accelerated_config(2));

        let job = enqueue(&deps, JobType::Render, "v1").await;
        let shutdown = CancellationToken::new();

        worker.tick(&shutdown).await;
        let after_first = deps.job_store.get("acme", job.id).await.unwrap().unwrap();
        assert_eq!(after_first.status, JobStatus::Retry);
        assert_eq!(after_first.retry_count, 1);
        assert!(after_first.last_retry_at.is_some());

        worker.tick(&shutdown).await;
        let after_second = deps.job_store.get("acme", job.id).await.unwrap().unwrap();
        assert_eq!(after_second.status, JobStatus::Retry);
        assert_eq!(after_second.retry_count, 2);

        worker.tick(&shutdown).await;
        let dead = deps.job_store.get("acme", job.id).await.unwrap().unwrap();
        assert_eq!(dead.status, JobStatus::DeadLetter);
        assert_eq!(dead.retry_count, 2);
        let error = dead.error.unwrap();
        assert!(error.contains("Final retry 2/2"));
        assert!(error.contains("retryable"));
    }

    #[tokio::test]
    async fn permanent_failure_dead_letters_without_consuming_credit() {
        let mut registry = ProcessorRegistry::new();
        registry.register(JobType::Render, |_c, _j, _d| async {
            Err(ProcessorError::InputNotFound("version not found: v1".to_string()))
        });
        let (worker, deps) = worker_with(registry, accelerated_config(3));

        let job = enqueue(&deps, JobType::Render, "v1").await;
        worker.tick(&CancellationToken::new()).await;

        let dead = deps.job_store.get("acme", job.id).await.unwrap().unwrap();
        assert_eq!(dead.status, JobStatus::DeadLetter);
        assert_eq!(dead.retry_count, 0);
        let error = dead.error.unwrap();
        assert!(error.contains("permanent"));
        assert!(error.contains("attempt 1"));
    }

    #[tokio::test]
    async fn backoff_window_gates_retry_claims() {
        let mut registry = ProcessorRegistry::new();
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();
        registry.register(JobType::Render, move |_c, _j, _d| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(ProcessorError::Renderer("flaky".to_string()))
            }
        });

        // Hour-long backoff: the retry must not be picked up again.
        let mut config = ServiceConfig::default();
        config = config.with_retry_policy(
            JobType::Render,
            RetryPolicy {
                max_retries: 2,
                initial_delay: Duration::from_secs(3600),
                max_delay: Duration::from_secs(3600),
                backoff_factor: 2.0,
            },
        );
        let (worker, deps) = worker_with(registry, config);

        let job = enqueue(&deps, JobType::Render, "v1").await;
        let shutdown = CancellationToken::new();

        worker.tick(&shutdown).await;
        worker.tick(&shutdown).await;
        worker.tick(&shutdown).await;

        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        let read = deps.job_store.get("acme", job.id).await.unwrap().unwrap();
        assert_eq!(read.status, JobStatus::Retry);
        assert_eq!(read.retry_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_a_retryable_failure() {
        let mut registry = ProcessorRegistry::new();
        registry.register(JobType::Render, |cancel, _j, _d| async move {
            // Honors cancellation like a well-behaved collaborator.
            cancel.cancelled().await;
            Err(ProcessorError::Renderer("render cancelled".to_string()))
        });

        let mut config = accelerated_config(1);
        config.job_timeout = Duration::from_secs(2);
        let (worker, deps) = worker_with(registry, config);

        let job = enqueue(&deps, JobType::Render, "v1").await;
        worker.tick(&CancellationToken::new()).await;

        let read = deps.job_store.get("acme", job.id).await.unwrap().unwrap();
        assert_eq!(read.status, JobStatus::Retry);
        assert!(read.error.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn recovery_sweep_fails_stale_running_jobs() {
        let registry = ProcessorRegistry::new();
        // Zero timeout: every running record predates the cutoff.
        let mut config = accelerated_config(2);
        config.job_timeout = Duration::ZERO;
        let (worker, deps) = worker_with(registry, config);

        let mut job = enqueue(&deps, JobType::Render, "v1").await;
        job.begin_attempt();
        deps.job_store.update(&job).await.unwrap();

        worker.recover_stale().await;

        let read = deps.job_store.get("acme", job.id).await.unwrap().unwrap();
        assert_eq!(read.status, JobStatus::Retry);
        assert_eq!(read.retry_count, 1);
        assert!(read.error.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn recovery_sweep_leaves_fresh_running_jobs_alone() {
        let registry = ProcessorRegistry::new();
        let (worker, deps) = worker_with(registry, accelerated_config(2));

        let mut job = enqueue(&deps, JobType::Render, "v1").await;
        job.begin_attempt();
        deps.job_store.update(&job).await.unwrap();

        worker.recover_stale().await;

        let read = deps.job_store.get("acme", job.id).await.unwrap().unwrap();
        assert_eq!(read.status, JobStatus::Running);
    }

    #[tokio::test]
    async fn unregistered_job_type_dead_letters_permanently() {
        let registry = ProcessorRegistry::new();
        let (worker, deps) = worker_with(registry, accelerated_config(2));

        let job = enqueue(&deps, JobType::Bind, "deck-1").await;
        worker.tick(&CancellationToken::new()).await;

        let dead = deps.job_store.get("acme", job.id).await.unwrap().unwrap();
        assert_eq!(dead.status, JobStatus::DeadLetter);
        assert!(dead.error.unwrap().contains("unsupported job type"));
    }
}
