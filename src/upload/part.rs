//! Part uploader
//!
//! Uploads one planned part: reads its range from the shared source,
//! checksums it, PUTs it and records the returned ETag.

use super::planner::PartRange;
use super::progress::ProgressReporter;
use super::source::SharedSource;
use super::UploadError;
use crate::metrics;
use crate::s3::S3Client;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use dashmap::DashMap;
use md5::{Digest, Md5};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Uploads the parts of one multipart session
pub struct PartUploader {
    client: Arc<S3Client>,
    bucket: String,
    key: String,
    upload_id: String,
    source: SharedSource,
    total_parts: u32,
    results: Arc<DashMap<u32, String>>,
    progress: ProgressReporter,
}

impl PartUploader {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        client: Arc<S3Client>,
        bucket: &str,
        key: &str,
        upload_id: &str,
        source: SharedSource,
        total_parts: u32,
        results: Arc<DashMap<u32, String>>,
        progress: ProgressReporter,
    ) -> Self {
        Self {
            client,
            bucket: bucket.to_string(),
            key: key.to_string(),
            upload_id: upload_id.to_string(),
            source,
            total_parts,
            results,
            progress,
        }
    }

    /// Upload one part and record its ETag
    #[tracing::instrument(
        name = "upload.multipart.part",
        skip(self, part, cancel),
        fields(
            s3.upload_id = %self.upload_id,
            s3.part_number = part.number,
            upload.bytes = part.length,
            s3.etag = tracing::field::Empty
        ),
        err
    )]
    pub async fn upload(
        &self,
        part: PartRange,
        cancel: &CancellationToken,
    ) -> Result<(), UploadError> {
        if cancel.is_cancelled() {
            return Err(UploadError::Cancelled);
        }

        let body = self.source.read_range(part.offset, part.length).await?;
        if body.len() as u64 != part.length {
            return Err(UploadError::ShortRead {
                part_number: part.number,
                expected: part.length,
                actual: body.len() as u64,
            });
        }

        let content_md5 = STANDARD.encode(Md5::digest(&body));
        let response = self
            .client
            .upload_part(
                &self.bucket,
                &self.key,
                &self.upload_id,
                part.number,
                body,
                &content_md5,
                cancel,
            )
            .await?;

        let etag = response.etag.ok_or(UploadError::MissingETag {
            part_number: part.number,
        })?;
        tracing::Span::current().record("s3.etag", etag.as_str());

        self.results.insert(part.number, etag);
        self.progress
            .report_part(part.number, self.total_parts, part.length);
        metrics::record_part("uploaded", part.length);

        Ok(())
    }

    /// Report a part as transferred without sending it.
    ///
    /// `reason` is `"resumed"` for parts the server already holds and
    /// `"skipped"` for parts left out on purpose.
    pub fn report_skipped(&self, part: &PartRange, reason: &str) {
        tracing::debug!(part_number = part.number, reason = reason, "Part not sent");
        self.progress
            .report_part(part.number, self.total_parts, part.length);
        metrics::record_part(reason, 0);
    }
}
