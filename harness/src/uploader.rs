use std::time::Duration;

use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use aws_types::region::Region;
use tracing::{debug, info};
use upload_meter_common::config::StorageConfig;

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("put object failed: {0}")]
    PutObject(String),
    #[error("upload timed out after {0:?}")]
    Timeout(Duration),
    #[error("failed to create bucket: {0}")]
    CreateBucket(String),
}

/// Blob store client. One call, one attempt — retry and backoff belong
/// to the upload worker, not the backend.
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(
        &self,
        data: &[u8],
        blob_name: &str,
        timeout: Duration,
    ) -> Result<(), UploadError>;
}

/// S3-compatible blob store backend.
pub struct S3Uploader {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3Uploader {
    pub async fn new(config: &StorageConfig) -> Self {
        let creds = Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,
            None,
            "static",
        );

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .credentials_provider(creds)
            .region(Region::new(config.region.clone()));
        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;

        // Path-style access for MinIO-style endpoints.
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.endpoint.is_some())
            .build();

        Self {
            client: aws_sdk_s3::Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
        }
    }

    /// Ensure the destination bucket exists, creating it if necessary.
    pub async fn ensure_bucket(&self) -> Result<(), UploadError> {
        match self.client.head_bucket().bucket(&self.bucket).send().await {
            Ok(_) => {
                info!(bucket = self.bucket, "bucket exists");
                Ok(())
            }
            Err(_) => {
                info!(bucket = self.bucket, "creating bucket");
                self.client
                    .create_bucket()
                    .bucket(&self.bucket)
                    .send()
                    .await
                    .map_err(|e| UploadError::CreateBucket(e.to_string()))?;
                Ok(())
            }
        }
    }
}

#[async_trait]
impl Uploader for S3Uploader {
    async fn upload(
        &self,
        data: &[u8],
        blob_name: &str,
        timeout: Duration,
    ) -> Result<(), UploadError> {
        let size = data.len();
        let put = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(blob_name)
            .content_type("image/jpeg")
            .body(ByteStream::from(data.to_vec()))
            .send();

        match tokio::time::timeout(timeout, put).await {
            Ok(Ok(_)) => {
                debug!(blob = blob_name, size, "uploaded frame");
                Ok(())
            }
            Ok(Err(e)) => Err(UploadError::PutObject(e.to_string())),
            Err(_) => Err(UploadError::Timeout(timeout)),
        }
    }
}
