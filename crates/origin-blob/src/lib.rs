//! ORIGIN Blob Store - evidence artifact storage
//!
//! A small blob interface consumed by the evidence pipeline: put, get,
//! presign, bucket existence. The production variant speaks the S3 API
//! (including MinIO via a custom endpoint); the filesystem variant exists
//! for development only and presigns `file://` URLs that the download
//! endpoint streams directly.

pub mod fs;
pub mod s3;

pub use fs::FsBlobStore;
pub use s3::S3BlobStore;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Blob storage errors
#[derive(Debug, Error)]
pub enum BlobError {
    #[error("Blob not found: {key}")]
    NotFound { key: String },

    #[error("Bucket missing: {bucket}")]
    BucketMissing { bucket: String },

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),
}

pub type BlobResult<T> = Result<T, BlobError>;

/// Blob storage capability
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store an object.
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> BlobResult<()>;

    /// Fetch an object's bytes.
    async fn get(&self, key: &str) -> BlobResult<Vec<u8>>;

    /// Produce a short-lived download URL.
    async fn presign(&self, key: &str, ttl: Duration) -> BlobResult<String>;

    /// Whether the configured bucket exists and is reachable.
    async fn bucket_exists(&self) -> BlobResult<bool>;
}

/// Reject keys that could escape a tenant prefix. Artifact keys are always
/// `{tenant_id}/{certificate_id}/{format}`, so separators beyond `/` and
/// any traversal component are programming errors upstream.
pub(crate) fn validate_key(key: &str) -> BlobResult<()> {
    if key.is_empty() || key.starts_with('/') {
        return Err(BlobError::InvalidKey(key.to_string()));
    }
    if key.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..") {
        return Err(BlobError::InvalidKey(key.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_validation() {
        assert!(validate_key("tnt_1/cert_2/json").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("/abs").is_err());
        assert!(validate_key("a//b").is_err());
        assert!(validate_key("a/../b").is_err());
    }
}
