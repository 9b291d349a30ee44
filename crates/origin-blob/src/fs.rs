//! Filesystem blob store, development only
//!
//! Objects land under a base directory mirroring the key layout. Presign
//! returns `file://` URLs; the evidence download endpoint recognizes them
//! and streams the file directly instead of redirecting.

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;

use crate::{validate_key, BlobError, BlobResult, BlobStore};

/// Blob store rooted at a local directory
#[derive(Clone)]
pub struct FsBlobStore {
    base: PathBuf,
}

impl FsBlobStore {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    fn path_for(&self, key: &str) -> BlobResult<PathBuf> {
        validate_key(key)?;
        Ok(self.base.join(key))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, _content_type: &str) -> BlobResult<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| BlobError::Unavailable(format!("mkdir {}: {e}", parent.display())))?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| BlobError::Unavailable(format!("write {}: {e}", path.display())))
    }

    async fn get(&self, key: &str) -> BlobResult<Vec<u8>> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(BlobError::NotFound { key: key.to_string() })
            }
            Err(e) => Err(BlobError::Unavailable(format!("read {}: {e}", path.display()))),
        }
    }

    async fn presign(&self, key: &str, _ttl: Duration) -> BlobResult<String> {
        let path = self.path_for(key)?;
        Ok(format!("file://{}", path.display()))
    }

    async fn bucket_exists(&self) -> BlobResult<bool> {
        Ok(tokio::fs::metadata(&self.base)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> FsBlobStore {
        let dir = std::env::temp_dir().join(format!("origin-blob-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        FsBlobStore::new(dir)
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let store = temp_store();
        store
            .put("t1/c1/json", b"{\"a\":1}".to_vec(), "application/json")
            .await
            .unwrap();
        assert_eq!(store.get("t1/c1/json").await.unwrap(), b"{\"a\":1}");
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let store = temp_store();
        assert!(matches!(
            store.get("t1/missing/json").await,
            Err(BlobError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_presign_returns_file_url() {
        let store = temp_store();
        let url = store
            .presign("t1/c1/pdf", Duration::from_secs(60))
            .await
            .unwrap();
        assert!(url.starts_with("file://"));
        assert!(url.ends_with("t1/c1/pdf"));
    }

    #[tokio::test]
    async fn test_bucket_exists() {
        let store = temp_store();
        assert!(store.bucket_exists().await.unwrap());
        assert!(!FsBlobStore::new("/nonexistent-origin-path")
            .bucket_exists()
            .await
            .unwrap());
    }
}
