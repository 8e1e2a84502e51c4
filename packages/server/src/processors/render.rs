//! Render and export processor: version spec to PPTX asset.
//!
//! Shared by the `render` and `export` job types; both produce a PPTX
//! artifact, export being the client-download path.

use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::kernel::assets::{Asset, AssetKind};
use crate::kernel::deps::ServerDeps;
use crate::kernel::jobs::{Job, ProcessorError};

use super::report_progress;

/// Run a render/export job. Returns the produced asset id.
///
/// The asset id is generated before upload so the storage key embeds it:
/// a reader holding the job's `output_ref` can locate both the record and
/// the bytes.
pub async fn run_render(
    cancel: CancellationToken,
    job: Job,
    deps: Arc<ServerDeps>,
) -> Result<String, ProcessorError> {
    let spec_value = resolve_version_spec(&job, &deps).await?;

    report_progress(&deps, &job, "normalizing spec", 10).await;
    let spec = deckspec::normalize_value(&spec_value)?;

    report_progress(&deps, &job, "rendering", 30).await;
    let bytes = deps
        .renderer
        .render_bytes(&cancel, &spec)
        .await
        .map_err(|e| ProcessorError::Renderer(e.to_string()))?;

    let asset_id = Uuid::new_v4();
    let kind = AssetKind::Pptx;
    let storage_key = format!("{}.{}", asset_id, kind.extension());

    report_progress(&deps, &job, "uploading", 70).await;
    deps.asset_store
        .upload(&cancel, &storage_key, &bytes, kind.mime())
        .await
        .map_err(|e| ProcessorError::Upload(e.to_string()))?;

    let asset = Asset::new(asset_id, job.tenant_id.clone(), kind, storage_key);
    deps.asset_store
        .create(asset)
        .await
        .map_err(|e| ProcessorError::Store(e.to_string()))?;

    report_progress(&deps, &job, "done", 100).await;
    Ok(asset_id.to_string())
}

/// Resolve the job's input to a stored spec: deck version first, then
/// template version.
pub(crate) async fn resolve_version_spec(
    job: &Job,
    deps: &ServerDeps,
) -> Result<Value, ProcessorError> {
    if let Some(version) = deps
        .deck_store
        .get_version(&job.tenant_id, &job.input_ref)
        .await
        .map_err(|e| ProcessorError::Store(e.to_string()))?
    {
        return Ok(version.spec);
    }

    if let Some(version) = deps
        .template_store
        .get_version(&job.tenant_id, &job.input_ref)
        .await
        .map_err(|e| ProcessorError::Store(e.to_string()))?
    {
        return Ok(version.spec);
    }

    Err(ProcessorError::InputNotFound(format!(
        "version not found: {}",
        job.input_ref
    )))
}
