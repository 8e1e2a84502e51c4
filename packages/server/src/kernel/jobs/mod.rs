//! The job pipeline: durable queue, enqueue API, processor registry, and
//! the polling worker.
//!
//! Lifecycle of a job:
//!
//! ```text
//! Queued ──► Running ──► Done
//!              │  ▲
//!              ▼  │ (backoff elapsed)
//!            Retry ┘
//!              │
//!              ▼ (credit exhausted or permanent error)
//!          DeadLetter ──► Queued   (operator requeue)
//! ```
//!
//! The enqueue API creates `Queued` records; every other transition is
//! owned by the worker.

pub mod enqueue;
pub mod error;
pub mod job;
pub mod postgres;
pub mod registry;
pub mod retry;
pub mod store;
pub mod worker;

pub use enqueue::{EnqueueOptions, EnqueueResult, JobQueue};
pub use error::{ErrorKind, ProcessorError};
pub use job::{Job, JobStatus, JobType};
pub use postgres::PgJobStore;
pub use registry::{ProcessorRegistry, SharedProcessorRegistry};
pub use retry::RetryPolicy;
pub use store::{InMemoryJobStore, JobStore, JobStoreError, DEFAULT_MAX_RETRIES};
pub use worker::{JobWorker, JobWorkerConfig};
