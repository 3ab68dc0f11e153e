//! Upload session resolver
//!
//! Sessions are never cached: every upload call asks the server which
//! multipart uploads are in progress and which parts they already hold.

use super::UploadError;
use crate::s3::{S3Client, S3MultipartUpload};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A server-side multipart session being resumed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSession {
    pub upload_id: String,
    /// Part number to ETag for parts already stored
    pub parts: BTreeMap<u32, String>,
}

pub struct SessionResolver {
    client: Arc<S3Client>,
}

impl SessionResolver {
    pub fn new(client: Arc<S3Client>) -> Self {
        Self { client }
    }

    /// In-progress uploads for `bucket`, only those for `key` when given
    pub async fn find_uploads(
        &self,
        bucket: &str,
        key: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<S3MultipartUpload>, UploadError> {
        Ok(self.client.list_multipart_uploads(bucket, key, cancel).await?)
    }

    /// Find a session to resume for `key`.
    ///
    /// The first listed session wins. A 404 from either listing means there
    /// is nothing to resume.
    #[tracing::instrument(name = "upload.resolve_session", skip(self, cancel), err)]
    pub async fn resume(
        &self,
        bucket: &str,
        key: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<UploadSession>, UploadError> {
        let uploads = match self.client.list_multipart_uploads(bucket, Some(key), cancel).await {
            Ok(uploads) => uploads,
            Err(e) if e.is_not_found() => {
                tracing::debug!("Bucket has no upload listing; starting fresh");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        if uploads.len() > 1 {
            tracing::warn!(
                sessions = uploads.len(),
                "Several uploads in progress for this key; resuming the first"
            );
        }
        let Some(upload) = uploads.into_iter().next() else {
            return Ok(None);
        };

        let parts = match self
            .client
            .list_parts(bucket, key, &upload.upload_id, cancel)
            .await
        {
            Ok(parts) => parts,
            Err(e) if e.is_not_found() => {
                tracing::info!(
                    upload_id = %upload.upload_id,
                    "Listed upload no longer exists; starting fresh"
                );
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let parts: BTreeMap<u32, String> = parts
            .into_iter()
            .map(|part| (part.part_number, part.etag))
            .collect();

        tracing::info!(
            upload_id = %upload.upload_id,
            known_parts = parts.len(),
            "Resuming multipart upload"
        );

        Ok(Some(UploadSession {
            upload_id: upload.upload_id,
            parts,
        }))
    }
}
