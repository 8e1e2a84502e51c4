//! Service entry point.
//!
//! Wires the job pipeline and runs the worker until interrupted. Stores
//! come from `DATABASE_URL` when set, in-memory otherwise; produced bytes
//! land in filesystem storage under `STORAGE_ROOT`. The renderer and
//! design AI are deployment integrations; without one compiled in, this
//! binary runs the pipeline against the in-process stubs, which is enough
//! to exercise the queue end to end locally.

use std::sync::Arc;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use server_core::kernel::assets::{AssetStore, InMemoryAssetStore, PgAssetStore};
use server_core::kernel::jobs::{InMemoryJobStore, JobStore, JobWorker, PgJobStore};
use server_core::kernel::{
    db, FsObjectStorage, MockDesignAi, MockRenderer, ServerDeps, ServiceConfig,
};
use server_core::domains::presentations::{InMemoryDeckStore, InMemoryTemplateStore};
use server_core::processors::build_registry;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = ServiceConfig::from_env();
    let storage_root =
        std::env::var("STORAGE_ROOT").unwrap_or_else(|_| "./data/assets".to_string());
    let storage = Arc::new(FsObjectStorage::new(storage_root));

    let (job_store, asset_store): (Arc<dyn JobStore>, Arc<dyn AssetStore>) =
        match std::env::var("DATABASE_URL") {
            Ok(url) => {
                let pool = db::connect(&url).await?;
                db::run_migrations(&pool).await?;
                info!("using postgres stores");
                (
                    Arc::new(PgJobStore::new(pool.clone())),
                    Arc::new(PgAssetStore::new(pool, storage)),
                )
            }
            Err(_) => {
                info!("DATABASE_URL unset, using in-memory stores");
                (
                    Arc::new(InMemoryJobStore::new()),
                    Arc::new(InMemoryAssetStore::new(storage)),
                )
            }
        };

    let deps = Arc::new(ServerDeps::new(
        config,
        job_store,
        asset_store,
        Arc::new(InMemoryTemplateStore::new()),
        Arc::new(InMemoryDeckStore::new()),
        Arc::new(MockRenderer::new()),
        Arc::new(MockDesignAi::new()),
    ));

    let registry = Arc::new(build_registry());
    let worker = JobWorker::new(deps, registry);

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("received shutdown signal");
        signal_token.cancel();
    });

    worker.run(shutdown).await
}
