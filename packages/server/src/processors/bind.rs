//! Bind processor: content bound onto a template spec, recorded as a new
//! deck version.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::domains::presentations::DeckVersion;
use crate::kernel::deps::ServerDeps;
use crate::kernel::jobs::{Job, ProcessorError};

use super::{keys, report_progress};

/// Run a bind job. The input ref is a deck id; metadata names the source
/// template version, the content to bind, and the acting user.
pub async fn run_bind(
    cancel: CancellationToken,
    job: Job,
    deps: Arc<ServerDeps>,
) -> Result<String, ProcessorError> {
    let metadata = job
        .metadata
        .as_ref()
        .ok_or_else(|| ProcessorError::MetadataMissing("bind parameters required".to_string()))?;

    let source_version_id = metadata
        .get(keys::SOURCE_TEMPLATE_VERSION_ID)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            ProcessorError::MetadataMissing(format!(
                "{} required",
                keys::SOURCE_TEMPLATE_VERSION_ID
            ))
        })?;
    let content = metadata
        .get(keys::CONTENT)
        .ok_or_else(|| ProcessorError::MetadataMissing(format!("{} required", keys::CONTENT)))?;
    let user_id = metadata
        .get(keys::USER_ID)
        .map(String::as_str)
        .unwrap_or_default();

    let deck = deps
        .deck_store
        .get(&job.tenant_id, &job.input_ref)
        .await
        .map_err(|e| ProcessorError::Store(e.to_string()))?
        .ok_or_else(|| {
            ProcessorError::InputNotFound(format!("deck not found: {}", job.input_ref))
        })?;

    let source = deps
        .template_store
        .get_version(&job.tenant_id, source_version_id)
        .await
        .map_err(|e| ProcessorError::Store(e.to_string()))?
        .ok_or_else(|| {
            ProcessorError::InputNotFound(format!(
                "template version not found: {source_version_id}"
            ))
        })?;

    // Normalize before handing the spec to the AI. A stored string spec
    // re-serialized naively would arrive double-encoded.
    report_progress(&deps, &job, "normalizing template spec", 10).await;
    let template_spec = deckspec::normalize_value(&source.spec)?;

    report_progress(&deps, &job, "binding content", 30).await;
    let bound = deps
        .ai
        .bind_deck_spec(&cancel, &job.tenant_id, user_id, &template_spec, content)
        .await
        .map_err(|e| ProcessorError::Ai(e.to_string()))?;

    let canonical = deckspec::normalize_value(&bound)
        .map_err(|e| ProcessorError::Ai(format!("provider returned unusable spec: {e}")))?;
    let spec: serde_json::Value = serde_json::from_slice(&canonical)
        .map_err(|e| ProcessorError::Ai(format!("provider returned unusable spec: {e}")))?;

    report_progress(&deps, &job, "recording version", 80).await;
    let number = deps
        .deck_store
        .latest_version_number(&job.tenant_id, &deck.id)
        .await
        .map_err(|e| ProcessorError::Store(e.to_string()))?
        + 1;
    let version = DeckVersion::new(&job.tenant_id, &deck.id, number, spec, user_id);
    let version = deps
        .deck_store
        .insert_version(version)
        .await
        .map_err(|e| ProcessorError::Store(e.to_string()))?;

    deps.deck_store
        .set_current_version(&job.tenant_id, &deck.id, &version.id)
        .await
        .map_err(|e| ProcessorError::Store(e.to_string()))?;

    report_progress(&deps, &job, "done", 100).await;
    Ok(version.id)
}
