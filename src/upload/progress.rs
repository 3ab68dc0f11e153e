//! Progress reporting
//!
//! Progress is delivered through a caller-supplied callback, invoked
//! synchronously at each reporting point. Multipart uploads report once per
//! part (in no particular cross-part order); single PUTs report as the body
//! stream is consumed.

use bytes::Bytes;
use futures::Stream;
use pin_project_lite::pin_project;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// One progress event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadStatus {
    pub bucket: String,
    pub key: Option<String>,
    /// Bytes sent so far for the current unit (the whole object or one part)
    pub bytes_transferred: u64,
    pub total_bytes: u64,
    /// Absent for single-shot uploads
    pub part_number: Option<u32>,
    pub total_parts: Option<u32>,
}

impl UploadStatus {
    /// Percent complete of the current unit
    pub fn percent(&self) -> f64 {
        if self.total_bytes == 0 {
            return 100.0;
        }
        self.bytes_transferred as f64 * 100.0 / self.total_bytes as f64
    }
}

/// Progress callback
pub type ProgressCallback = Arc<dyn Fn(&UploadStatus) + Send + Sync>;

/// Stamps events with the upload's destination and forwards them
#[derive(Clone, Default)]
pub struct ProgressReporter {
    bucket: String,
    key: Option<String>,
    callback: Option<ProgressCallback>,
}

impl ProgressReporter {
    pub fn new(bucket: &str, key: Option<&str>, callback: Option<ProgressCallback>) -> Self {
        Self {
            bucket: bucket.to_string(),
            key: key.map(str::to_string),
            callback,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.callback.is_some()
    }

    /// Report a single-shot transfer
    pub fn report(&self, bytes_transferred: u64, total_bytes: u64) {
        self.emit(bytes_transferred, total_bytes, None, None);
    }

    /// Report a whole part as transferred
    pub fn report_part(&self, part_number: u32, total_parts: u32, part_bytes: u64) {
        self.emit(part_bytes, part_bytes, Some(part_number), Some(total_parts));
    }

    fn emit(
        &self,
        bytes_transferred: u64,
        total_bytes: u64,
        part_number: Option<u32>,
        total_parts: Option<u32>,
    ) {
        if let Some(ref callback) = self.callback {
            callback(&UploadStatus {
                bucket: self.bucket.clone(),
                key: self.key.clone(),
                bytes_transferred,
                total_bytes,
                part_number,
                total_parts,
            });
        }
    }
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("bucket", &self.bucket)
            .field("key", &self.key)
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

pin_project! {
    /// Body stream that reports how much of it has been consumed
    pub struct ProgressStream<S> {
        #[pin]
        inner: S,
        reporter: ProgressReporter,
        sent: u64,
        total: u64,
    }
}

impl<S> ProgressStream<S> {
    pub fn new(inner: S, reporter: ProgressReporter, total: u64) -> Self {
        Self {
            inner,
            reporter,
            sent: 0,
            total,
        }
    }
}

impl<S> Stream for ProgressStream<S>
where
    S: Stream<Item = std::io::Result<Bytes>>,
{
    type Item = std::io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        let polled = this.inner.poll_next(cx);
        if let Poll::Ready(Some(Ok(ref chunk))) = polled {
            *this.sent += chunk.len() as u64;
            this.reporter.report(*this.sent, *this.total);
        }
        polled
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}
