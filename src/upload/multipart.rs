//! Multipart upload handler
//!
//! Handles large uploads using the multipart API:
//!
//! 1. Plan the parts from the source length.
//! 2. Resume the server's in-progress session for the key, or initiate one.
//! 3. Upload the missing parts on a bounded worker pool.
//! 4. Complete with the manifest ordered by part number, or leave the
//!    session open when not every part was stored.

use super::part::PartUploader;
use super::planner::PartPlan;
use super::request::PreparedUpload;
use super::session::SessionResolver;
use super::{IncompleteUpload, UploadError, UploadHandler, UploadOutcome, UploadResult};
use crate::metrics;
use crate::s3::{CompletedPart, S3Client};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Multipart upload handler
pub struct MultipartHandler {
    client: Arc<S3Client>,
    resolver: SessionResolver,
}

impl MultipartHandler {
    pub fn new(client: Arc<S3Client>) -> Self {
        Self {
            resolver: SessionResolver::new(client.clone()),
            client,
        }
    }

    pub fn resolver(&self) -> &SessionResolver {
        &self.resolver
    }

    /// Abort every in-progress upload for `bucket`, or only for `key`.
    ///
    /// Having nothing to abort is not an error.
    #[tracing::instrument(
        name = "upload.abort",
        skip(self, cancel),
        fields(aborted = tracing::field::Empty),
        err
    )]
    pub async fn abort(
        &self,
        bucket: &str,
        key: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<usize, UploadError> {
        let uploads = self.resolver.find_uploads(bucket, key, cancel).await?;
        if uploads.is_empty() {
            tracing::info!("No multipart uploads in progress");
        }

        for upload in &uploads {
            self.client
                .abort_multipart_upload(bucket, &upload.key, &upload.upload_id, cancel)
                .await?;
        }

        tracing::Span::current().record("aborted", uploads.len());
        Ok(uploads.len())
    }

    async fn run(
        &self,
        job: PreparedUpload,
        cancel: &CancellationToken,
    ) -> Result<UploadOutcome, UploadError> {
        let PreparedUpload {
            bucket,
            key,
            source,
            headers,
            tuning,
            skip_parts,
            progress,
        } = job;
        let (Some(key), Some(source)) = (key, source) else {
            return Err(UploadError::Validation(
                "multipart upload needs a remote filename and a source".into(),
            ));
        };

        let plan = match tuning.part_count {
            Some(count) => PartPlan::with_part_count(source.len(), count)?,
            None => PartPlan::with_part_size(source.len(), tuning.part_size)?,
        };
        if plan.is_empty() {
            return Err(UploadError::Validation(
                "multipart upload of an empty source".into(),
            ));
        }
        let span = tracing::Span::current();
        span.record("parts_count", plan.len());

        let (upload_id, known_parts) = match self.resolver.resume(&bucket, &key, cancel).await? {
            Some(session) => (session.upload_id, session.parts),
            None => {
                let created = self
                    .client
                    .create_multipart_upload(&bucket, &key, headers, cancel)
                    .await?;
                (created.upload_id, BTreeMap::new())
            }
        };
        span.record("s3.upload_id", upload_id.as_str());

        let results: Arc<DashMap<u32, String>> = Arc::new(DashMap::new());
        for (part_number, etag) in known_parts {
            if plan.contains(part_number) {
                results.insert(part_number, etag);
            } else {
                tracing::warn!(
                    part_number = part_number,
                    "Stored part is outside the current plan; ignoring it"
                );
            }
        }

        let uploader = Arc::new(PartUploader::new(
            self.client.clone(),
            &bucket,
            &key,
            &upload_id,
            source,
            plan.len() as u32,
            results.clone(),
            progress,
        ));

        let semaphore = Arc::new(Semaphore::new(tuning.concurrent_parts));
        let mut workers = JoinSet::new();

        for part in plan.parts().iter().copied() {
            if cancel.is_cancelled() {
                break;
            }
            if results.contains_key(&part.number) {
                uploader.report_skipped(&part, "resumed");
                continue;
            }
            if skip_parts.contains(&part.number) {
                uploader.report_skipped(&part, "skipped");
                continue;
            }

            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                permit = semaphore.clone().acquire_owned() => {
                    permit.map_err(|e| UploadError::Worker(e.to_string()))?
                }
            };

            let uploader = uploader.clone();
            let cancel = cancel.clone();
            workers.spawn(async move {
                let _permit = permit;
                uploader.upload(part, &cancel).await
            });
        }

        let mut first_error: Option<UploadError> = None;
        while let Some(joined) = workers.join_next().await {
            let result = joined
                .map_err(|e| UploadError::Worker(e.to_string()))
                .and_then(|result| result);
            if let Err(e) = result {
                if !e.is_cancelled() {
                    metrics::record_part("failed", 0);
                }
                match first_error {
                    None => first_error = Some(e),
                    Some(_) => tracing::debug!(error = %e, "Additional part failure"),
                }
            }
        }

        if cancel.is_cancelled() {
            tracing::warn!(upload_id = %upload_id, "Multipart upload cancelled");
            return Err(UploadError::Cancelled);
        }
        if let Some(e) = first_error {
            return Err(e);
        }

        if results.len() != plan.len() {
            let mut uploaded_parts: Vec<u32> = results.iter().map(|entry| *entry.key()).collect();
            uploaded_parts.sort_unstable();
            tracing::warn!(
                upload_id = %upload_id,
                uploaded = uploaded_parts.len(),
                planned = plan.len(),
                "Not every part was stored; leaving the upload open"
            );
            return Ok(UploadOutcome::Incomplete(IncompleteUpload {
                bucket,
                key,
                upload_id,
                uploaded_parts,
                total_parts: plan.len(),
            }));
        }

        let mut parts: Vec<CompletedPart> = results
            .iter()
            .map(|entry| CompletedPart {
                part_number: *entry.key(),
                etag: entry.value().clone(),
            })
            .collect();
        parts.sort_by_key(|part| part.part_number);

        let completed = self
            .client
            .complete_multipart_upload(&bucket, &key, &upload_id, &parts, cancel)
            .await?;

        Ok(UploadOutcome::Completed(UploadResult {
            bucket,
            key: Some(key),
            etag: completed.etag,
            bytes_written: plan.total_length(),
            upload_id: Some(upload_id),
            parts: parts.len(),
            content_md5: None,
        }))
    }
}

#[async_trait]
impl UploadHandler for MultipartHandler {
    #[tracing::instrument(
        name = "upload.multipart",
        skip(self, job, cancel),
        fields(
            s3.bucket = %job.bucket,
            s3.key = ?job.key,
            upload.bytes = job.content_length(),
            parts_count = tracing::field::Empty,
            s3.upload_id = tracing::field::Empty
        ),
        err
    )]
    async fn upload(
        &self,
        job: PreparedUpload,
        cancel: &CancellationToken,
    ) -> Result<UploadOutcome, UploadError> {
        let bucket = job.bucket.clone();
        let bytes = job.content_length();
        let start_time = Instant::now();

        let outcome = self.run(job, cancel).await;

        let duration = start_time.elapsed();
        metrics::record_upload_duration(&bucket, "multipart", duration.as_secs_f64());

        match &outcome {
            Ok(UploadOutcome::Completed(result)) => {
                metrics::record_upload_success(&bucket, "multipart", bytes);
                metrics::record_multipart_upload(&bucket, "completed", Some(result.parts));
                tracing::info!(
                    etag = ?result.etag,
                    parts = result.parts,
                    bytes_written = result.bytes_written,
                    duration_ms = duration.as_millis() as u64,
                    "Multipart upload completed"
                );
            }
            Ok(UploadOutcome::Incomplete(_)) => {
                metrics::record_multipart_upload(&bucket, "incomplete", None);
            }
            Err(UploadError::Cancelled) => {
                metrics::record_upload_failure(&bucket, "multipart", "cancelled");
                metrics::record_multipart_upload(&bucket, "cancelled", None);
            }
            Err(e) => {
                metrics::record_upload_failure(&bucket, "multipart", "failure");
                metrics::record_multipart_upload(&bucket, "failed", None);
                metrics::record_error(e.kind());
                tracing::error!(
                    error = %e,
                    duration_ms = duration.as_millis() as u64,
                    "Multipart upload failed"
                );
            }
        }

        outcome
    }
}
