// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic. The renderer,
// the design AI, and the object store live outside this service; the
// processors talk to them exclusively through these interfaces.
//
// Naming convention: Base* for trait names (e.g., BaseRenderer)

use anyhow::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

// =============================================================================
// Renderer Trait (Infrastructure - PPTX/PNG synthesis)
// =============================================================================

/// Renders canonical spec bytes into presentation artifacts.
///
/// Both calls must honor cancellation: the worker cancels the token when
/// the per-job deadline expires.
#[async_trait]
pub trait BaseRenderer: Send + Sync {
    /// Render a full presentation to PPTX bytes.
    async fn render_bytes(&self, cancel: &CancellationToken, spec: &[u8]) -> Result<Vec<u8>>;

    /// Render one PNG thumbnail per slide, in slide order.
    async fn generate_thumbnails(
        &self,
        cancel: &CancellationToken,
        spec: &[u8],
    ) -> Result<Vec<Vec<u8>>>;
}

// =============================================================================
// Design AI Trait (Infrastructure - spec generation and binding)
// =============================================================================

/// Parameters for AI template generation, lifted from job metadata.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub prompt: String,
    pub language: String,
    pub tone: Option<String>,
    pub rtl: bool,
    pub brand_kit_id: Option<String>,
}

#[async_trait]
pub trait BaseDesignAi: Send + Sync {
    /// Produce a template spec document for a generation request.
    async fn generate_template_spec(
        &self,
        cancel: &CancellationToken,
        tenant_id: &str,
        user_id: &str,
        request: &GenerateRequest,
    ) -> Result<serde_json::Value>;

    /// Bind caller content onto a template spec, producing a deck spec.
    async fn bind_deck_spec(
        &self,
        cancel: &CancellationToken,
        tenant_id: &str,
        user_id: &str,
        template_spec: &[u8],
        content: &str,
    ) -> Result<serde_json::Value>;
}

// =============================================================================
// Object Storage Trait (Infrastructure - produced bytes)
// =============================================================================

/// Result of a successful upload.
#[derive(Debug, Clone)]
pub struct UploadedObject {
    pub key: String,
    pub url: String,
    pub content_type: String,
}

/// Byte storage behind the asset layer. Keys are internal; clients only
/// ever see asset ids.
#[async_trait]
pub trait BaseObjectStorage: Send + Sync {
    async fn upload(
        &self,
        cancel: &CancellationToken,
        key: &str,
        bytes: &[u8],
        mime: &str,
    ) -> Result<UploadedObject>;

    async fn download(&self, key: &str) -> Result<Vec<u8>>;
}
