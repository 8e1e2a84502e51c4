//! Generate processor: AI-produced template spec recorded as a new
//! template version.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::domains::presentations::TemplateVersion;
use crate::kernel::deps::ServerDeps;
use crate::kernel::jobs::{Job, ProcessorError};
use crate::kernel::traits::GenerateRequest;

use super::{keys, report_progress};

/// Run a generate job. The input ref is a freshly created template id;
/// metadata carries the generation parameters and is a hard contract,
/// so absent metadata dead-letters the job.
pub async fn run_generate(
    cancel: CancellationToken,
    job: Job,
    deps: Arc<ServerDeps>,
) -> Result<String, ProcessorError> {
    let metadata = job.metadata.as_ref().ok_or_else(|| {
        ProcessorError::MetadataMissing("generation parameters required".to_string())
    })?;

    let prompt = metadata
        .get(keys::PROMPT)
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ProcessorError::MetadataMissing(format!("{} required", keys::PROMPT)))?;
    let user_id = metadata
        .get(keys::USER_ID)
        .map(String::as_str)
        .unwrap_or_default();

    let template = deps
        .template_store
        .get(&job.tenant_id, &job.input_ref)
        .await
        .map_err(|e| ProcessorError::Store(e.to_string()))?
        .ok_or_else(|| {
            ProcessorError::InputNotFound(format!("template not found: {}", job.input_ref))
        })?;

    let request = GenerateRequest {
        prompt: prompt.clone(),
        language: metadata
            .get(keys::LANGUAGE)
            .cloned()
            .unwrap_or_else(|| "en".to_string()),
        tone: metadata.get(keys::TONE).cloned(),
        rtl: metadata
            .get(keys::RTL)
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false),
        brand_kit_id: metadata.get(keys::BRAND_KIT_ID).cloned(),
    };

    report_progress(&deps, &job, "generating spec", 20).await;
    let generated = deps
        .ai
        .generate_template_spec(&cancel, &job.tenant_id, user_id, &request)
        .await
        .map_err(|e| ProcessorError::Ai(e.to_string()))?;

    // A provider can return syntactically fine JSON that is not a usable
    // spec; that is a provider failure, not a caller one.
    let canonical = deckspec::normalize_value(&generated)
        .map_err(|e| ProcessorError::Ai(format!("provider returned unusable spec: {e}")))?;
    let spec: serde_json::Value = serde_json::from_slice(&canonical)
        .map_err(|e| ProcessorError::Ai(format!("provider returned unusable spec: {e}")))?;

    report_progress(&deps, &job, "recording version", 80).await;
    let number = deps
        .template_store
        .latest_version_number(&job.tenant_id, &template.id)
        .await
        .map_err(|e| ProcessorError::Store(e.to_string()))?
        + 1;
    let version = TemplateVersion::new(&job.tenant_id, &template.id, number, spec, user_id);
    let version = deps
        .template_store
        .insert_version(version)
        .await
        .map_err(|e| ProcessorError::Store(e.to_string()))?;

    deps.template_store
        .set_current_version(&job.tenant_id, &template.id, &version.id)
        .await
        .map_err(|e| ProcessorError::Store(e.to_string()))?;

    report_progress(&deps, &job, "done", 100).await;
    Ok(version.id)
}
