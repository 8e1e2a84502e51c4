//! Asset persistence and the upload path to object storage.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::kernel::traits::{BaseObjectStorage, UploadedObject};

use super::asset::Asset;

#[derive(Debug, Error)]
pub enum AssetStoreError {
    #[error("asset not found: {0}")]
    NotFound(Uuid),
    #[error("upload failed: {0}")]
    Upload(String),
    #[error("storage error: {0}")]
    Storage(String),
}

/// Durable mapping from asset id to record, plus byte transfer to the
/// object backend. Callers generate the asset id and storage key before
/// uploading, then persist the record pointing at the uploaded key.
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Persist a record. Assigns an id only when the caller left it nil.
    async fn create(&self, asset: Asset) -> Result<Asset, AssetStoreError>;

    /// Tenant-scoped read.
    async fn get(&self, tenant_id: &str, id: Uuid) -> Result<Option<Asset>, AssetStoreError>;

    /// Transfer bytes to the object backend under `key`.
    async fn upload(
        &self,
        cancel: &CancellationToken,
        key: &str,
        bytes: &[u8],
        mime: &str,
    ) -> Result<UploadedObject, AssetStoreError>;
}

/// In-memory asset store for tests and single-process deployments.
/// Records live in a map; bytes go to the injected object storage.
pub struct InMemoryAssetStore {
    assets: RwLock<HashMap<Uuid, Asset>>,
    storage: Arc<dyn BaseObjectStorage>,
}

impl InMemoryAssetStore {
    pub fn new(storage: Arc<dyn BaseObjectStorage>) -> Self {
        Self {
            assets: RwLock::new(HashMap::new()),
            storage,
        }
    }
}

#[async_trait]
impl AssetStore for InMemoryAssetStore {
    async fn create(&self, mut asset: Asset) -> Result<Asset, AssetStoreError> {
        if asset.id.is_nil() {
            asset.id = Uuid::new_v4();
        }
        let mut assets = self
            .assets
            .write()
            .map_err(|_| AssetStoreError::Storage("asset store lock poisoned".to_string()))?;
        assets.insert(asset.id, asset.clone());
        Ok(asset)
    }

    async fn get(&self, tenant_id: &str, id: Uuid) -> Result<Option<Asset>, AssetStoreError> {
        let assets = self
            .assets
            .read()
            .map_err(|_| AssetStoreError::Storage("asset store lock poisoned".to_string()))?;
        Ok(assets
            .get(&id)
            .filter(|a| a.tenant_id == tenant_id)
            .cloned())
    }

    async fn upload(
        &self,
        cancel: &CancellationToken,
        key: &str,
        bytes: &[u8],
        mime: &str,
    ) -> Result<UploadedObject, AssetStoreError> {
        self.storage
            .upload(cancel, key, bytes, mime)
            .await
            .map_err(|e| AssetStoreError::Upload(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::assets::asset::AssetKind;
    use crate::kernel::test_dependencies::MockObjectStorage;

    fn store() -> (InMemoryAssetStore, Arc<MockObjectStorage>) {
        let storage = Arc::new(MockObjectStorage::new());
        (InMemoryAssetStore::new(storage.clone()), storage)
    }

    #[tokio::test]
    async fn create_keeps_pregenerated_id() {
        let (store, _) = store();
        let id = Uuid::new_v4();
        let created = store
            .create(Asset::new(id, "acme", AssetKind::Pptx, format!("{id}.pptx")))
            .await
            .unwrap();
        assert_eq!(created.id, id);
    }

    #[tokio::test]
    async fn create_assigns_id_when_nil() {
        let (store, _) = store();
        let created = store
            .create(Asset::new(Uuid::nil(), "acme", AssetKind::File, "blob.bin"))
            .await
            .unwrap();
        assert!(!created.id.is_nil());
    }

    #[tokio::test]
    async fn get_is_tenant_scoped() {
        let (store, _) = store();
        let id = Uuid::new_v4();
        store
            .create(Asset::new(id, "acme", AssetKind::Png, format!("{id}.png")))
            .await
            .unwrap();

        assert!(store.get("acme", id).await.unwrap().is_some());
        assert!(store.get("globex", id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn upload_delegates_to_object_storage() {
        let (store, storage) = store();
        let cancel = CancellationToken::new();
        let uploaded = store
            .upload(&cancel, "a1.pptx", b"bytes", AssetKind::Pptx.mime())
            .await
            .unwrap();
        assert_eq!(uploaded.key, "a1.pptx");
        assert_eq!(storage.object("a1.pptx").unwrap(), b"bytes".to_vec());
    }
}
