//! Test harness wiring the whole pipeline over in-memory stores and mock
//! collaborators.
//!
//! Retry backoff is zeroed so each worker tick drives exactly one attempt;
//! tests that need real backoff windows build their own config.

use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use server_core::domains::presentations::{Deck, DeckStore, TemplateStore, TemplateVersion};
use server_core::kernel::jobs::{
    EnqueueOptions, EnqueueResult, Job, JobQueue, JobStore, JobType, JobWorker, RetryPolicy,
};
use server_core::kernel::{ServiceConfig, TestDependencies};
use server_core::processors::build_registry;

/// A ServiceConfig with no backoff delay and the given retry budget for
/// every job type.
pub fn accelerated_config(max_retries: u32) -> ServiceConfig {
    let mut config = ServiceConfig::default();
    for job_type in JobType::all() {
        config = config.with_retry_policy(job_type, RetryPolicy::immediate(max_retries));
    }
    config
}

/// The assembled pipeline plus handles to every mock for assertions.
pub struct Pipeline {
    pub test: TestDependencies,
    pub deps: Arc<server_core::kernel::ServerDeps>,
    pub queue: JobQueue,
    pub worker: JobWorker,
    pub shutdown: CancellationToken,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::with_parts(accelerated_config(3), TestDependencies::new())
    }

    pub fn with_dependencies(test: TestDependencies) -> Self {
        Self::with_parts(accelerated_config(3), test)
    }

    pub fn with_parts(config: ServiceConfig, test: TestDependencies) -> Self {
        let deps = test.server_deps(config.clone());
        let store: Arc<dyn JobStore> = test.job_store.clone();
        let queue = JobQueue::new(store, config);
        let worker = JobWorker::new(deps.clone(), Arc::new(build_registry()));
        Self {
            test,
            deps,
            queue,
            worker,
            shutdown: CancellationToken::new(),
        }
    }

    /// One worker polling pass.
    pub async fn tick(&self) {
        self.worker.tick(&self.shutdown).await;
    }

    pub async fn enqueue(
        &self,
        tenant: &str,
        job_type: JobType,
        input_ref: &str,
        opts: EnqueueOptions,
    ) -> EnqueueResult {
        self.queue
            .enqueue(tenant, job_type, input_ref, opts)
            .await
            .expect("enqueue failed")
    }

    pub async fn job(&self, tenant: &str, id: Uuid) -> Job {
        self.test
            .job_store
            .get(tenant, id)
            .await
            .expect("job store read failed")
            .expect("job missing")
    }

    /// Seed a template version under a well-known id.
    pub async fn seed_template_version(&self, tenant: &str, id: &str, spec: Value) {
        let version = TemplateVersion {
            id: id.to_string(),
            tenant_id: tenant.to_string(),
            template_id: format!("tpl-for-{id}"),
            version_number: 1,
            spec,
            created_by: "seed".to_string(),
            created_at: chrono::Utc::now(),
        };
        self.test
            .template_store
            .insert_version(version)
            .await
            .expect("seeding template version failed");
    }

    /// Seed a deck, returning its id.
    pub async fn seed_deck(&self, tenant: &str, name: &str) -> String {
        let deck = Deck::new(tenant, name);
        let deck = self
            .test
            .deck_store
            .insert(deck)
            .await
            .expect("seeding deck failed");
        deck.id
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// The S1 spec literal: one layout, one placeholder.
pub fn title_only_spec() -> Value {
    serde_json::json!({
        "layouts": [{
            "name": "Title",
            "placeholders": [
                {"id": "title", "geometry": {"x": 0.1, "y": 0.2, "w": 0.8, "h": 0.2}}
            ]
        }]
    })
}

/// Assert an output ref is an opaque id: no path separators, no extension.
pub fn assert_opaque_ref(output_ref: &str) {
    assert!(
        output_ref
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-'),
        "output ref {output_ref:?} is not opaque"
    );
    assert!(!output_ref.contains('/'), "output ref contains a path");
    assert!(!output_ref.contains('.'), "output ref contains an extension");
}
