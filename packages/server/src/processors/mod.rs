//! Processors: one per job type, dispatched by the worker through the
//! `ProcessorRegistry`.
//!
//! Processors consume the job's typed input, call collaborators through
//! the `Base*` traits, and return an output reference: an asset id for
//! render/export/preview, a version id for generate/bind. They never
//! mutate job status; that is the worker's job. Progress updates go
//! through `JobStore::update_progress` and are best-effort.

pub mod bind;
pub mod generate;
pub mod preview;
pub mod render;

use tracing::warn;

use crate::kernel::deps::ServerDeps;
use crate::kernel::jobs::{Job, JobType, ProcessorRegistry};

/// Metadata keys shared with enqueue callers.
pub mod keys {
    pub const PROMPT: &str = "prompt";
    pub const LANGUAGE: &str = "language";
    pub const TONE: &str = "tone";
    pub const RTL: &str = "rtl";
    pub const BRAND_KIT_ID: &str = "brandKitId";
    pub const USER_ID: &str = "userId";
    pub const SOURCE_TEMPLATE_VERSION_ID: &str = "sourceTemplateVersionId";
    pub const CONTENT: &str = "content";
}

/// Wire every job type to its processor.
pub fn build_registry() -> ProcessorRegistry {
    let mut registry = ProcessorRegistry::new();
    registry.register(JobType::Generate, generate::run_generate);
    registry.register(JobType::Bind, bind::run_bind);
    registry.register(JobType::Render, render::run_render);
    registry.register(JobType::Preview, preview::run_preview);
    registry.register(JobType::Export, render::run_render);
    registry
}

/// Best-effort progress write; a store hiccup must not fail the job.
pub(crate) async fn report_progress(deps: &ServerDeps, job: &Job, step: &str, pct: u8) {
    if let Err(e) = deps.job_store.update_progress(job.id, step, pct).await {
        warn!(job_id = %job.id, error = %e, "failed to record job progress");
    }
}
