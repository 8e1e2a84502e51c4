//! Asset model: an immutable produced artifact bound to an opaque id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Artifact content kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "asset_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    Pptx,
    Png,
    File,
}

impl AssetKind {
    pub fn mime(&self) -> &'static str {
        match self {
            AssetKind::Pptx => {
                "application/vnd.openxmlformats-officedocument.presentationml.presentation"
            }
            AssetKind::Png => "image/png",
            AssetKind::File => "application/octet-stream",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            AssetKind::Pptx => "pptx",
            AssetKind::Png => "png",
            AssetKind::File => "bin",
        }
    }
}

/// A produced artifact. The id is the only client-visible handle; the
/// storage key stays internal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    pub id: Uuid,
    pub tenant_id: String,
    pub kind: AssetKind,
    pub storage_key: String,
    pub mime: String,
    pub created_at: DateTime<Utc>,
}

impl Asset {
    /// Build a record for a pre-generated id. Ids are generated before
    /// upload so the storage key can embed them.
    pub fn new(id: Uuid, tenant_id: impl Into<String>, kind: AssetKind, storage_key: impl Into<String>) -> Self {
        Self {
            id,
            tenant_id: tenant_id.into(),
            kind,
            storage_key: storage_key.into(),
            mime: kind.mime().to_string(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_asset_carries_kind_mime() {
        let id = Uuid::new_v4();
        let asset = Asset::new(id, "acme", AssetKind::Pptx, format!("{id}.pptx"));
        assert_eq!(asset.mime, AssetKind::Pptx.mime());
        assert!(asset.storage_key.ends_with(".pptx"));
        assert!(asset.storage_key.starts_with(&id.to_string()));
    }
}
