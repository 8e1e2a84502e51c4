//! Preview processor: template version to per-slide PNG thumbnails.

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::kernel::assets::{Asset, AssetKind};
use crate::kernel::deps::ServerDeps;
use crate::kernel::jobs::{Job, ProcessorError};

use super::report_progress;

/// Run a preview job. Each thumbnail becomes its own asset; the returned
/// output ref is the first thumbnail's asset id.
///
/// Only template versions are supported; previewing a bound deck version
/// fails permanently.
pub async fn run_preview(
    cancel: CancellationToken,
    job: Job,
    deps: Arc<ServerDeps>,
) -> Result<String, ProcessorError> {
    if deps
        .deck_store
        .get_version(&job.tenant_id, &job.input_ref)
        .await
        .map_err(|e| ProcessorError::Store(e.to_string()))?
        .is_some()
    {
        return Err(ProcessorError::UnsupportedInput(format!(
            "preview requires a template version, got deck version {}",
            job.input_ref
        )));
    }

    let version = deps
        .template_store
        .get_version(&job.tenant_id, &job.input_ref)
        .await
        .map_err(|e| ProcessorError::Store(e.to_string()))?
        .ok_or_else(|| {
            ProcessorError::InputNotFound(format!("template version not found: {}", job.input_ref))
        })?;

    report_progress(&deps, &job, "normalizing spec", 10).await;
    let spec = deckspec::normalize_value(&version.spec)?;

    report_progress(&deps, &job, "rendering thumbnails", 30).await;
    let thumbnails = deps
        .renderer
        .generate_thumbnails(&cancel, &spec)
        .await
        .map_err(|e| ProcessorError::Renderer(e.to_string()))?;

    if thumbnails.is_empty() {
        return Err(ProcessorError::EmptyResult(
            "renderer produced no thumbnails".to_string(),
        ));
    }

    let stamp = Utc::now().timestamp_millis();
    let total = thumbnails.len();
    let mut first_asset_id: Option<Uuid> = None;

    for (index, bytes) in thumbnails.into_iter().enumerate() {
        let slide = index + 1;
        let step = format!("uploading slide {slide} of {total}");
        let pct = 30 + ((60 * slide) / total) as u8;
        report_progress(&deps, &job, &step, pct).await;

        let asset_id = Uuid::new_v4();
        let storage_key = format!("{}-{}-slide-{}.preview.png", job.id, stamp, slide);

        deps.asset_store
            .upload(&cancel, &storage_key, &bytes, AssetKind::Png.mime())
            .await
            .map_err(|e| ProcessorError::Upload(e.to_string()))?;

        let asset = Asset::new(asset_id, job.tenant_id.clone(), AssetKind::Png, storage_key);
        deps.asset_store
            .create(asset)
            .await
            .map_err(|e| ProcessorError::Store(e.to_string()))?;

        first_asset_id.get_or_insert(asset_id);
    }

    report_progress(&deps, &job, "done", 100).await;

    // Non-empty is checked above; the first upload always records an id.
    let first = first_asset_id
        .ok_or_else(|| ProcessorError::EmptyResult("no thumbnail assets created".to_string()))?;
    Ok(first.to_string())
}
