// TestDependencies - mock implementations for testing
//
// Provides mock collaborators that can be injected into ServerDeps for
// tests and for the local development binary. Mocks queue canned
// responses, record calls, and support failure injection, including a
// renderer that blocks until its cancellation token fires (for deadline
// tests).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use crate::domains::presentations::{InMemoryDeckStore, InMemoryTemplateStore};
use crate::kernel::assets::InMemoryAssetStore;
use crate::kernel::config::ServiceConfig;
use crate::kernel::deps::ServerDeps;
use crate::kernel::jobs::InMemoryJobStore;
use crate::kernel::traits::{
    BaseDesignAi, BaseObjectStorage, BaseRenderer, GenerateRequest, UploadedObject,
};

/// A minimal valid spec document, shared by mock defaults and tests.
pub fn sample_spec() -> Value {
    json!({
        "tokens": {},
        "constraints": {"safeMargin": 0.05},
        "layouts": [{
            "name": "Title",
            "placeholders": [
                {"id": "title", "type": "title", "geometry": {"x": 0.1, "y": 0.1, "w": 0.8, "h": 0.2}},
                {"id": "body", "geometry": {"x": 0.1, "y": 0.4, "w": 0.8, "h": 0.5}}
            ]
        }]
    })
}

// =============================================================================
// Mock Renderer
// =============================================================================

pub struct MockRenderer {
    fail_message: Mutex<Option<String>>,
    fail_remaining: AtomicI32,
    block_until_cancelled: AtomicBool,
    thumbnails: Mutex<Vec<Vec<u8>>>,
    render_calls: AtomicU32,
    thumbnail_calls: AtomicU32,
    last_spec: Mutex<Option<Vec<u8>>>,
}

impl MockRenderer {
    pub fn new() -> Self {
        Self {
            fail_message: Mutex::new(None),
            fail_remaining: AtomicI32::new(0),
            block_until_cancelled: AtomicBool::new(false),
            thumbnails: Mutex::new(vec![b"PNG-1".to_vec(), b"PNG-2".to_vec()]),
            render_calls: AtomicU32::new(0),
            thumbnail_calls: AtomicU32::new(0),
            last_spec: Mutex::new(None),
        }
    }

    /// Fail every call with the given message.
    pub fn failing(message: impl Into<String>) -> Self {
        let renderer = Self::new();
        *renderer.fail_message.lock().unwrap() = Some(message.into());
        renderer.fail_remaining.store(-1, Ordering::SeqCst);
        renderer
    }

    /// Fail the first `n` calls, then succeed.
    pub fn failing_times(n: u32, message: impl Into<String>) -> Self {
        let renderer = Self::new();
        *renderer.fail_message.lock().unwrap() = Some(message.into());
        renderer.fail_remaining.store(n as i32, Ordering::SeqCst);
        renderer
    }

    /// Block until the cancellation token fires, then report cancellation.
    pub fn blocking() -> Self {
        let renderer = Self::new();
        renderer.block_until_cancelled.store(true, Ordering::SeqCst);
        renderer
    }

    pub fn with_thumbnails(self, thumbnails: Vec<Vec<u8>>) -> Self {
        *self.thumbnails.lock().unwrap() = thumbnails;
        self
    }

    pub fn render_calls(&self) -> u32 {
        self.render_calls.load(Ordering::SeqCst)
    }

    pub fn thumbnail_calls(&self) -> u32 {
        self.thumbnail_calls.load(Ordering::SeqCst)
    }

    /// The spec bytes from the most recent call.
    pub fn last_spec(&self) -> Option<Vec<u8>> {
        self.last_spec.lock().unwrap().clone()
    }

    /// Shared failure gate. `fail_remaining` semantics: negative fails
    /// forever, positive fails and counts down, zero succeeds.
    async fn gate(&self, cancel: &CancellationToken) -> Result<()> {
        if self.block_until_cancelled.load(Ordering::SeqCst) {
            cancel.cancelled().await;
            return Err(anyhow!("render cancelled"));
        }
        let remaining = self.fail_remaining.load(Ordering::SeqCst);
        if remaining != 0 {
            if remaining > 0 {
                self.fail_remaining.fetch_sub(1, Ordering::SeqCst);
            }
            let message = self
                .fail_message
                .lock()
                .unwrap()
                .clone()
                .unwrap_or_else(|| "render failed".to_string());
            return Err(anyhow!(message));
        }
        Ok(())
    }
}

impl Default for MockRenderer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseRenderer for MockRenderer {
    async fn render_bytes(&self, cancel: &CancellationToken, spec: &[u8]) -> Result<Vec<u8>> {
        self.render_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_spec.lock().unwrap() = Some(spec.to_vec());
        self.gate(cancel).await?;

        let mut bytes = b"PPTX:".to_vec();
        bytes.extend_from_slice(spec);
        Ok(bytes)
    }

    async fn generate_thumbnails(
        &self,
        cancel: &CancellationToken,
        spec: &[u8],
    ) -> Result<Vec<Vec<u8>>> {
        self.thumbnail_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_spec.lock().unwrap() = Some(spec.to_vec());
        self.gate(cancel).await?;
        Ok(self.thumbnails.lock().unwrap().clone())
    }
}

// =============================================================================
// Mock Design AI
// =============================================================================

pub struct MockDesignAi {
    template_spec: Mutex<Value>,
    bound_spec: Mutex<Option<Value>>,
    fail_message: Mutex<Option<String>>,
    generate_calls: Mutex<Vec<GenerateRequest>>,
    bind_calls: Mutex<Vec<String>>,
}

impl MockDesignAi {
    pub fn new() -> Self {
        Self {
            template_spec: Mutex::new(sample_spec()),
            bound_spec: Mutex::new(None),
            fail_message: Mutex::new(None),
            generate_calls: Mutex::new(Vec::new()),
            bind_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        let ai = Self::new();
        *ai.fail_message.lock().unwrap() = Some(message.into());
        ai
    }

    /// Override the spec returned for generation requests.
    pub fn with_template_spec(self, spec: Value) -> Self {
        *self.template_spec.lock().unwrap() = spec;
        self
    }

    /// Override the spec returned for bind requests.
    pub fn with_bound_spec(self, spec: Value) -> Self {
        *self.bound_spec.lock().unwrap() = Some(spec);
        self
    }

    pub fn generate_calls(&self) -> Vec<GenerateRequest> {
        self.generate_calls.lock().unwrap().clone()
    }

    pub fn bind_calls(&self) -> Vec<String> {
        self.bind_calls.lock().unwrap().clone()
    }
}

impl Default for MockDesignAi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseDesignAi for MockDesignAi {
    async fn generate_template_spec(
        &self,
        _cancel: &CancellationToken,
        _tenant_id: &str,
        _user_id: &str,
        request: &GenerateRequest,
    ) -> Result<Value> {
        self.generate_calls.lock().unwrap().push(request.clone());
        if let Some(message) = self.fail_message.lock().unwrap().clone() {
            return Err(anyhow!(message));
        }
        Ok(self.template_spec.lock().unwrap().clone())
    }

    async fn bind_deck_spec(
        &self,
        _cancel: &CancellationToken,
        _tenant_id: &str,
        _user_id: &str,
        template_spec: &[u8],
        content: &str,
    ) -> Result<Value> {
        self.bind_calls.lock().unwrap().push(content.to_string());
        if let Some(message) = self.fail_message.lock().unwrap().clone() {
            return Err(anyhow!(message));
        }
        if let Some(bound) = self.bound_spec.lock().unwrap().clone() {
            return Ok(bound);
        }
        // Default: echo the template spec back as the bound document.
        Ok(serde_json::from_slice(template_spec)?)
    }
}

// =============================================================================
// Mock Object Storage
// =============================================================================

pub struct MockObjectStorage {
    objects: RwLock<HashMap<String, (Vec<u8>, String)>>,
    fail_uploads: AtomicBool,
}

impl MockObjectStorage {
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            fail_uploads: AtomicBool::new(false),
        }
    }

    pub fn failing_uploads() -> Self {
        let storage = Self::new();
        storage.fail_uploads.store(true, Ordering::SeqCst);
        storage
    }

    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.objects
            .read()
            .unwrap()
            .get(key)
            .map(|(bytes, _)| bytes.clone())
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.read().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn object_count(&self) -> usize {
        self.objects.read().unwrap().len()
    }
}

impl Default for MockObjectStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseObjectStorage for MockObjectStorage {
    async fn upload(
        &self,
        _cancel: &CancellationToken,
        key: &str,
        bytes: &[u8],
        mime: &str,
    ) -> Result<UploadedObject> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(anyhow!("upload rejected"));
        }
        self.objects
            .write()
            .unwrap()
            .insert(key.to_string(), (bytes.to_vec(), mime.to_string()));
        Ok(UploadedObject {
            key: key.to_string(),
            url: format!("memory://{key}"),
            content_type: mime.to_string(),
        })
    }

    async fn download(&self, key: &str) -> Result<Vec<u8>> {
        self.objects
            .read()
            .unwrap()
            .get(key)
            .map(|(bytes, _)| bytes.clone())
            .ok_or_else(|| anyhow!("object not found: {key}"))
    }
}

// =============================================================================
// Test dependency bundle
// =============================================================================

/// All in-memory stores and mock collaborators, with the concrete handles
/// kept for assertions.
pub struct TestDependencies {
    pub job_store: Arc<InMemoryJobStore>,
    pub asset_store: Arc<InMemoryAssetStore>,
    pub template_store: Arc<InMemoryTemplateStore>,
    pub deck_store: Arc<InMemoryDeckStore>,
    pub renderer: Arc<MockRenderer>,
    pub ai: Arc<MockDesignAi>,
    pub storage: Arc<MockObjectStorage>,
}

impl TestDependencies {
    pub fn new() -> Self {
        Self::with_collaborators(MockRenderer::new(), MockDesignAi::new(), MockObjectStorage::new())
    }

    pub fn with_collaborators(
        renderer: MockRenderer,
        ai: MockDesignAi,
        storage: MockObjectStorage,
    ) -> Self {
        let storage = Arc::new(storage);
        Self {
            job_store: Arc::new(InMemoryJobStore::new()),
            asset_store: Arc::new(InMemoryAssetStore::new(storage.clone())),
            template_store: Arc::new(InMemoryTemplateStore::new()),
            deck_store: Arc::new(InMemoryDeckStore::new()),
            renderer: Arc::new(renderer),
            ai: Arc::new(ai),
            storage,
        }
    }

    /// Build ServerDeps sharing these stores and mocks.
    pub fn server_deps(&self, config: ServiceConfig) -> Arc<ServerDeps> {
        Arc::new(ServerDeps::new(
            config,
            self.job_store.clone(),
            self.asset_store.clone(),
            self.template_store.clone(),
            self.deck_store.clone(),
            self.renderer.clone(),
            self.ai.clone(),
        ))
    }
}

impl Default for TestDependencies {
    fn default() -> Self {
        Self::new()
    }
}

/// ServerDeps over fresh in-memory stores and default mocks.
pub fn test_deps() -> Arc<ServerDeps> {
    test_deps_with_config(ServiceConfig::default())
}

pub fn test_deps_with_config(config: ServiceConfig) -> Arc<ServerDeps> {
    TestDependencies::new().server_deps(config)
}
