//! S3-compatible blob store
//!
//! Works against AWS S3 proper and MinIO (custom endpoint + path-style
//! addressing). Presigned GETs carry the configured TTL.

use async_trait::async_trait;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use std::time::Duration;

use crate::{validate_key, BlobError, BlobResult, BlobStore};

/// Blob store backed by an S3-compatible service
#[derive(Clone)]
pub struct S3BlobStore {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3BlobStore {
    pub fn new(client: aws_sdk_s3::Client, bucket: String) -> Self {
        Self { client, bucket }
    }

    /// Build a client for a custom endpoint (MinIO) with static credentials.
    pub async fn connect(
        endpoint: &str,
        access_key: &str,
        secret_key: &str,
        bucket: String,
    ) -> Self {
        let credentials = aws_sdk_s3::config::Credentials::new(
            access_key, secret_key, None, None, "origin-blob",
        );
        let base = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .load()
            .await;
        let config = aws_sdk_s3::config::Builder::from(&base)
            .endpoint_url(endpoint)
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();
        Self::new(aws_sdk_s3::Client::from_conf(config), bucket)
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> BlobResult<()> {
        validate_key(key)?;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| BlobError::Unavailable(format!("put {key}: {e}")))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> BlobResult<Vec<u8>> {
        validate_key(key)?;
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().map(|s| s.is_no_such_key()).unwrap_or(false) {
                    BlobError::NotFound { key: key.to_string() }
                } else {
                    BlobError::Unavailable(format!("get {key}: {e}"))
                }
            })?;
        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| BlobError::Unavailable(format!("read {key}: {e}")))?;
        Ok(bytes.into_bytes().to_vec())
    }

    async fn presign(&self, key: &str, ttl: Duration) -> BlobResult<String> {
        validate_key(key)?;
        let config = PresigningConfig::expires_in(ttl)
            .map_err(|e| BlobError::Unavailable(format!("presign config: {e}")))?;
        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(config)
            .await
            .map_err(|e| BlobError::Unavailable(format!("presign {key}: {e}")))?;
        Ok(presigned.uri().to_string())
    }

    async fn bucket_exists(&self) -> BlobResult<bool> {
        match self.client.head_bucket().bucket(&self.bucket).send().await {
            Ok(_) => Ok(true),
            Err(e) => {
                if e.as_service_error().map(|s| s.is_not_found()).unwrap_or(false) {
                    Ok(false)
                } else {
                    Err(BlobError::Unavailable(format!(
                        "head_bucket {}: {e}",
                        self.bucket
                    )))
                }
            }
        }
    }
}
