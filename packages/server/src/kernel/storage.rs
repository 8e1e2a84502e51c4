//! Filesystem object storage for single-node deployments.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::traits::{BaseObjectStorage, UploadedObject};

/// Stores objects as files under a root directory. Keys map directly to
/// file names; callers never see the resulting paths, only asset ids.
pub struct FsObjectStorage {
    root: PathBuf,
}

impl FsObjectStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        // Keys are internal and flat; strip any separators defensively so
        // a malformed key cannot escape the root.
        let name = Path::new(key)
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| key.replace('/', "_").into());
        self.root.join(name)
    }
}

#[async_trait]
impl BaseObjectStorage for FsObjectStorage {
    async fn upload(
        &self,
        cancel: &CancellationToken,
        key: &str,
        bytes: &[u8],
        mime: &str,
    ) -> Result<UploadedObject> {
        if cancel.is_cancelled() {
            anyhow::bail!("upload cancelled");
        }

        tokio::fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("creating storage root {}", self.root.display()))?;

        let path = self.path_for(key);
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("writing object {key}"))?;

        debug!(key = %key, bytes = bytes.len(), "stored object");
        Ok(UploadedObject {
            key: key.to_string(),
            url: format!("file://{}", path.display()),
            content_type: mime.to_string(),
        })
    }

    async fn download(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.path_for(key);
        tokio::fs::read(&path)
            .await
            .with_context(|| format!("reading object {key}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upload_then_download_round_trips() {
        let dir = std::env::temp_dir().join(format!("assets-{}", uuid::Uuid::new_v4()));
        let storage = FsObjectStorage::new(&dir);
        let cancel = CancellationToken::new();

        storage
            .upload(&cancel, "a1.pptx", b"deck bytes", "application/octet-stream")
            .await
            .unwrap();
        let read = storage.download("a1.pptx").await.unwrap();
        assert_eq!(read, b"deck bytes".to_vec());

        tokio::fs::remove_dir_all(&dir).await.ok();
    }

    #[tokio::test]
    async fn keys_cannot_escape_the_root() {
        let dir = std::env::temp_dir().join(format!("assets-{}", uuid::Uuid::new_v4()));
        let storage = FsObjectStorage::new(&dir);
        let path = storage.path_for("../../etc/passwd");
        assert!(path.starts_with(&dir));
    }
}
