//! Archive client
//!
//! Entry point tying configuration, the S3 client and the uploader together.
//!
//! # Example
//!
//! ```no_run
//! use archive_uploadr::{ArchiveClient, Config};
//! use archive_uploadr::upload::UploadRequest;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ArchiveClient::new(Config::load("config.yaml")?)?;
//! let outcome = client
//!     .put(UploadRequest::new("my-item").file("movie.mp4"))
//!     .await?;
//! assert!(outcome.is_complete());
//! # Ok(())
//! # }
//! ```

use crate::config::Config;
use crate::item::{DeleteRequest, UseLimitResponse};
use crate::s3::{S3Client, S3ClientConfig, S3ClientError, S3MultipartUpload};
use crate::upload::{UploadError, UploadOutcome, UploadRequest, Uploader};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Client for the archive's S3-style API
pub struct ArchiveClient {
    config: Config,
    s3: Arc<S3Client>,
    uploader: Uploader,
}

impl ArchiveClient {
    /// Build a client from configuration
    pub fn new(config: Config) -> Result<Self, S3ClientError> {
        let s3 = Arc::new(S3Client::new(S3ClientConfig::from_config(&config)?)?);
        let uploader = Uploader::new(s3.clone(), config.upload.clone());

        tracing::debug!(
            endpoint = %s3.endpoint(),
            read_only = config.read_only,
            dry_run = config.dry_run,
            "Archive client ready"
        );

        Ok(Self {
            config,
            s3,
            uploader,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn s3(&self) -> &S3Client {
        &self.s3
    }

    pub fn uploader(&self) -> &Uploader {
        &self.uploader
    }

    /// Upload without an external cancellation signal
    pub async fn put(&self, request: UploadRequest) -> Result<UploadOutcome, UploadError> {
        self.put_with_cancel(request, &CancellationToken::new()).await
    }

    pub async fn put_with_cancel(
        &self,
        request: UploadRequest,
        cancel: &CancellationToken,
    ) -> Result<UploadOutcome, UploadError> {
        self.uploader.upload(request, cancel).await
    }

    /// Abort in-progress multipart uploads; returns how many were aborted
    pub async fn abort_uploads(
        &self,
        bucket: &str,
        remote_filename: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<usize, UploadError> {
        self.uploader.abort(bucket, remote_filename, cancel).await
    }

    pub async fn list_uploads(
        &self,
        bucket: &str,
        remote_filename: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<S3MultipartUpload>, UploadError> {
        self.uploader.list_uploads(bucket, remote_filename, cancel).await
    }

    /// Delete an item or one of its files
    pub async fn delete(
        &self,
        request: &DeleteRequest,
        cancel: &CancellationToken,
    ) -> Result<(), S3ClientError> {
        if request.bucket.trim().is_empty() {
            return Err(S3ClientError::ConfigError("bucket is required".into()));
        }
        self.s3
            .delete_object(
                &request.bucket,
                request.remote_filename.as_deref(),
                request.headers(),
                cancel,
            )
            .await
    }

    /// Task-queue rationing state for the access key, and for `bucket` if given
    pub async fn use_limit(
        &self,
        bucket: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<UseLimitResponse, S3ClientError> {
        self.s3.check_limit(bucket.unwrap_or_default(), cancel).await
    }
}
