//! PostgreSQL-backed asset store.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::kernel::traits::{BaseObjectStorage, UploadedObject};

use super::asset::{Asset, AssetKind};
use super::store::{AssetStore, AssetStoreError};

const ASSET_COLUMNS: &str = "id, tenant_id, kind, storage_key, mime, created_at";

/// Asset store over a PostgreSQL pool; bytes go to the injected object
/// storage backend.
pub struct PgAssetStore {
    pool: PgPool,
    storage: Arc<dyn BaseObjectStorage>,
}

impl PgAssetStore {
    pub fn new(pool: PgPool, storage: Arc<dyn BaseObjectStorage>) -> Self {
        Self { pool, storage }
    }
}

#[async_trait]
impl AssetStore for PgAssetStore {
    async fn create(&self, mut asset: Asset) -> Result<Asset, AssetStoreError> {
        if asset.id.is_nil() {
            asset.id = Uuid::new_v4();
        }
        let sql = format!(
            "INSERT INTO assets (id, tenant_id, kind, storage_key, mime, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {ASSET_COLUMNS}"
        );
        let row = sqlx::query_as::<_, AssetRow>(&sql)
            .bind(asset.id)
            .bind(&asset.tenant_id)
            .bind(asset.kind)
            .bind(&asset.storage_key)
            .bind(&asset.mime)
            .bind(asset.created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AssetStoreError::Storage(e.to_string()))?;
        Ok(row.into())
    }

    async fn get(&self, tenant_id: &str, id: Uuid) -> Result<Option<Asset>, AssetStoreError> {
        let sql = format!("SELECT {ASSET_COLUMNS} FROM assets WHERE id = $1 AND tenant_id = $2");
        let row = sqlx::query_as::<_, AssetRow>(&sql)
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AssetStoreError::Storage(e.to_string()))?;
        Ok(row.map(Into::into))
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

#[derive(sqlx::FromRow)]
struct AssetRow {
    id: Uuid,
    tenant_id: String,
    kind: AssetKind,
    storage_key: String,
    mime: String,
    created_at: DateTime<Utc>,
}

impl From<AssetRow> for Asset {
    fn from(row: AssetRow) -> Self {
        Asset {
            id: row.id,
            tenant_id: row.tenant_id,
            kind: row.kind,
            storage_key: row.storage_key,
            mime: row.mime,
            created_at: row.created_at,
        }
    }
}
