//! Upload module
//!
//! Decides between a single PUT and a chunked multipart upload, and runs
//! either against the archive's S3-style API.
//!
//! # Example
//!
//! ```no_run
//! use archive_uploadr::config::UploadConfig;
//! use archive_uploadr::s3::{Credentials, S3Client, S3ClientConfig};
//! use archive_uploadr::upload::{UploadOutcome, UploadRequest, Uploader};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut config = S3ClientConfig::new("https://s3.us.archive.org");
//! config.credentials = Some(Credentials::new("access", "secret"));
//! let uploader = Uploader::new(Arc::new(S3Client::new(config)?), UploadConfig::default());
//!
//! let request = UploadRequest::new("my-item")
//!     .file("movie.mp4")
//!     .metadata("title", "My movie")
//!     .create_bucket(true);
//!
//! match uploader.upload(request, &CancellationToken::new()).await? {
//!     UploadOutcome::Completed(result) => println!("ETag: {:?}", result.etag),
//!     UploadOutcome::Incomplete(open) => println!("Upload {} left open", open.upload_id),
//! }
//! # Ok(())
//! # }
//! ```

use crate::config::UploadConfig;
use crate::s3::{S3Client, S3ClientError, S3MultipartUpload};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub mod multipart;
pub mod part;
pub mod planner;
pub mod progress;
pub mod put_object;
pub mod request;
pub mod session;
pub mod source;

pub use multipart::MultipartHandler;
pub use part::PartUploader;
pub use planner::{PartPlan, PartRange, MAX_PARTS, MIN_PART_SIZE};
pub use progress::{ProgressCallback, ProgressReporter, UploadStatus};
pub use put_object::PutObjectHandler;
pub use request::{PreparedUpload, Tuning, UploadRequest, UploadSource};
pub use session::{SessionResolver, UploadSession};
pub use source::{shared_reader, SeekableSource, SharedReader, SharedSource};

/// Upload errors
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Invalid upload request: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("S3 error: {0}")]
    S3(S3ClientError),

    #[error("Short read for part {part_number}: expected {expected} bytes, got {actual}")]
    ShortRead {
        part_number: u32,
        expected: u64,
        actual: u64,
    },

    #[error("Part {part_number} was stored without an ETag")]
    MissingETag { part_number: u32 },

    #[error("Upload needs {planned} parts, at most {max} are allowed")]
    TooManyParts { planned: u64, max: usize },

    #[error("Part worker failed: {0}")]
    Worker(String),

    #[error("Upload cancelled")]
    Cancelled,
}

impl From<S3ClientError> for UploadError {
    fn from(e: S3ClientError) -> Self {
        match e {
            S3ClientError::Cancelled => Self::Cancelled,
            other => Self::S3(other),
        }
    }
}

impl UploadError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// HTTP status of a remote rejection
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::S3(e) => e.status(),
            _ => None,
        }
    }

    /// Short label used for the errors metric
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Io(_) => "io",
            Self::S3(_) => "s3",
            Self::ShortRead { .. } => "short_read",
            Self::MissingETag { .. } => "missing_etag",
            Self::TooManyParts { .. } => "too_many_parts",
            Self::Worker(_) => "worker",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Upload result
#[derive(Debug, Clone)]
pub struct UploadResult {
    pub bucket: String,
    /// `None` for an item-level metadata write
    pub key: Option<String>,
    pub etag: Option<String>,
    pub bytes_written: u64,
    /// Set for multipart uploads
    pub upload_id: Option<String>,
    /// Number of parts in the completion manifest; 0 for single-shot
    pub parts: usize,
    /// Hex MD5 of the content sent in a single PUT
    pub content_md5: Option<String>,
}

/// A multipart upload left open because not every planned part was stored.
///
/// The session stays on the server; upload again to resume it or call
/// [`Uploader::abort`] to discard it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncompleteUpload {
    pub bucket: String,
    pub key: String,
    pub upload_id: String,
    pub uploaded_parts: Vec<u32>,
    pub total_parts: usize,
}

/// Result of a successful upload call
#[derive(Debug, Clone)]
pub enum UploadOutcome {
    Completed(UploadResult),
    Incomplete(IncompleteUpload),
}

impl UploadOutcome {
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    pub fn completed(&self) -> Option<&UploadResult> {
        match self {
            Self::Completed(result) => Some(result),
            Self::Incomplete(_) => None,
        }
    }
}

/// Upload handler trait
#[async_trait::async_trait]
pub trait UploadHandler: Send + Sync {
    /// Handle upload
    async fn upload(
        &self,
        job: PreparedUpload,
        cancel: &CancellationToken,
    ) -> Result<UploadOutcome, UploadError>;
}

/// Picks single-shot or multipart for each request
pub struct Uploader {
    config: UploadConfig,
    put_object: PutObjectHandler,
    multipart: MultipartHandler,
}

impl Uploader {
    pub fn new(client: Arc<S3Client>, config: UploadConfig) -> Self {
        Self {
            config,
            put_object: PutObjectHandler::new(client.clone()),
            multipart: MultipartHandler::new(client),
        }
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Upload a file, a stream, or item metadata.
    ///
    /// Sources at or above the multipart threshold go through the multipart
    /// protocol; everything else (including empty sources) is one PUT.
    pub async fn upload(
        &self,
        request: UploadRequest,
        cancel: &CancellationToken,
    ) -> Result<UploadOutcome, UploadError> {
        if cancel.is_cancelled() {
            return Err(UploadError::Cancelled);
        }

        let job = request.prepare(&self.config).await?;
        let handler: &dyn UploadHandler = if job.is_multipart() {
            &self.multipart
        } else {
            &self.put_object
        };
        handler.upload(job, cancel).await
    }

    /// Abort every in-progress multipart upload for `bucket` (or only those
    /// for `key`). Returns how many sessions were aborted.
    pub async fn abort(
        &self,
        bucket: &str,
        key: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<usize, UploadError> {
        self.multipart.abort(bucket, key, cancel).await
    }

    /// Multipart uploads in progress for `bucket`, optionally for one key
    pub async fn list_uploads(
        &self,
        bucket: &str,
        key: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<S3MultipartUpload>, UploadError> {
        self.multipart.resolver().find_uploads(bucket, key, cancel).await
    }
}
