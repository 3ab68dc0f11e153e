//! PutObject handler
//!
//! Handles uploads below the multipart threshold, empty files, and
//! item-level metadata writes (no source, no remote filename).
//!
//! # Example
//!
//! ```no_run
//! use archive_uploadr::config::UploadConfig;
//! use archive_uploadr::s3::{Credentials, S3Client, S3ClientConfig};
//! use archive_uploadr::upload::put_object::PutObjectHandler;
//! use archive_uploadr::upload::{UploadHandler, UploadRequest};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut config = S3ClientConfig::new("https://s3.us.archive.org");
//! config.credentials = Some(Credentials::new("access", "secret"));
//! let handler = PutObjectHandler::new(Arc::new(S3Client::new(config)?));
//!
//! let job = UploadRequest::new("my-item")
//!     .file("hello.txt")
//!     .prepare(&UploadConfig::default())
//!     .await?;
//! let outcome = handler.upload(job, &CancellationToken::new()).await?;
//! println!("Uploaded: {:?}", outcome.completed().map(|r| &r.etag));
//! # Ok(())
//! # }
//! ```

use super::request::PreparedUpload;
use super::{UploadError, UploadHandler, UploadOutcome, UploadResult};
use crate::metrics;
use crate::s3::S3Client;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::header::HeaderValue;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Simple upload handler
///
/// Sends the whole source in one PUT with a whole-stream `Content-MD5`.
pub struct PutObjectHandler {
    client: Arc<S3Client>,
}

impl PutObjectHandler {
    pub fn new(client: Arc<S3Client>) -> Self {
        Self { client }
    }

    async fn send(
        &self,
        job: PreparedUpload,
        cancel: &CancellationToken,
    ) -> Result<UploadResult, UploadError> {
        let PreparedUpload {
            bucket,
            key,
            source,
            mut headers,
            progress,
            ..
        } = job;

        let (body, content_length, content_md5) = match source {
            Some(source) => {
                let digest = source.md5().await?;
                let value = HeaderValue::from_str(&STANDARD.encode(digest))
                    .map_err(|e| UploadError::Validation(e.to_string()))?;
                headers.insert("content-md5", value);

                let body = source.stream_body(progress.clone()).await?;
                (body, source.len(), Some(hex::encode(digest)))
            }
            None => (reqwest::Body::from(Vec::<u8>::new()), 0, None),
        };

        let response = self
            .client
            .put_object(&bucket, key.as_deref(), headers, body, content_length, cancel)
            .await?;

        // A dry-run body is never read, so its stream reports nothing.
        if content_length == 0 || self.client.is_dry_run() {
            progress.report(content_length, content_length);
        }

        Ok(UploadResult {
            bucket,
            key,
            etag: response.etag,
            bytes_written: content_length,
            upload_id: None,
            parts: 0,
            content_md5,
        })
    }
}

#[async_trait]
impl UploadHandler for PutObjectHandler {
    #[tracing::instrument(
        name = "upload.put_object",
        skip(self, job, cancel),
        fields(
            s3.bucket = %job.bucket,
            s3.key = ?job.key,
            upload.bytes = job.content_length(),
            // Result fields - will be set after operation
            s3.etag = tracing::field::Empty,
            upload.bytes_written = tracing::field::Empty
        ),
        err
    )]
    async fn upload(
        &self,
        job: PreparedUpload,
        cancel: &CancellationToken,
    ) -> Result<UploadOutcome, UploadError> {
        let bucket = job.bucket.clone();
        let start_time = Instant::now();

        let upload_result = self.send(job, cancel).await;

        let duration = start_time.elapsed();
        metrics::record_upload_duration(&bucket, "put_object", duration.as_secs_f64());

        match upload_result {
            Ok(result) => {
                metrics::record_upload_success(&bucket, "put_object", result.bytes_written);

                let span = tracing::Span::current();
                if let Some(ref etag) = result.etag {
                    span.record("s3.etag", etag.as_str());
                }
                span.record("upload.bytes_written", result.bytes_written);

                tracing::info!(
                    etag = ?result.etag,
                    bytes_written = result.bytes_written,
                    duration_ms = duration.as_millis() as u64,
                    "PutObject upload completed"
                );

                Ok(UploadOutcome::Completed(result))
            }
            Err(UploadError::Cancelled) => {
                metrics::record_upload_failure(&bucket, "put_object", "cancelled");
                Err(UploadError::Cancelled)
            }
            Err(e) => {
                metrics::record_upload_failure(&bucket, "put_object", "failure");
                metrics::record_error(e.kind());

                tracing::error!(
                    error = %e,
                    duration_ms = duration.as_millis() as u64,
                    "PutObject upload failed"
                );

                Err(e)
            }
        }
    }
}
