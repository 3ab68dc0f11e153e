//! Upload request model
//!
//! An [`UploadRequest`] is what the caller builds. [`UploadRequest::prepare`]
//! validates it, opens the source and renders the archive headers, all
//! before any network call is made.

use super::progress::{ProgressCallback, ProgressReporter};
use super::source::{SharedReader, SharedSource};
use super::UploadError;
use crate::config::UploadConfig;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Characters `uri(...)` metadata values keep unescaped
const URI_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Where the content comes from
#[derive(Clone)]
pub enum UploadSource {
    /// Local file, opened and closed by the uploader
    File(PathBuf),
    /// Caller stream, uploaded from offset 0 to its end
    Reader(SharedReader),
}

impl std::fmt::Debug for UploadSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(path) => f.debug_tuple("File").field(path).finish(),
            Self::Reader(_) => f.write_str("Reader(..)"),
        }
    }
}

/// Request to upload a file, a stream, or item metadata
#[derive(Clone, Default)]
pub struct UploadRequest {
    pub bucket: String,
    pub source: Option<UploadSource>,
    /// Defaults to the file name of a `File` source
    pub remote_filename: Option<String>,
    /// Repeated keys are sent as repeated headers, in order
    pub metadata: Vec<(String, String)>,
    pub create_bucket: bool,
    pub no_derive: bool,
    pub keep_old_version: bool,
    pub delete_existing_metadata: bool,
    pub multipart_threshold: Option<u64>,
    pub part_size: Option<u64>,
    /// Split into this many equal parts instead of using `part_size`
    pub part_count: Option<u32>,
    pub concurrent_parts: Option<usize>,
    /// Part numbers to leave out; fault injection for tests
    #[doc(hidden)]
    pub skip_parts: BTreeSet<u32>,
    /// Ask the server to fail with this error
    pub simulate_error: Option<String>,
    pub progress: Option<ProgressCallback>,
}

impl std::fmt::Debug for UploadRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadRequest")
            .field("bucket", &self.bucket)
            .field("source", &self.source)
            .field("remote_filename", &self.remote_filename)
            .field("metadata", &self.metadata)
            .field("create_bucket", &self.create_bucket)
            .field("no_derive", &self.no_derive)
            .field("keep_old_version", &self.keep_old_version)
            .field("delete_existing_metadata", &self.delete_existing_metadata)
            .field("multipart_threshold", &self.multipart_threshold)
            .field("part_size", &self.part_size)
            .field("part_count", &self.part_count)
            .field("concurrent_parts", &self.concurrent_parts)
            .field("skip_parts", &self.skip_parts)
            .field("simulate_error", &self.simulate_error)
            .finish_non_exhaustive()
    }
}

impl UploadRequest {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            ..Default::default()
        }
    }

    pub fn file(mut self, path: impl Into<PathBuf>) -> Self {
        self.source = Some(UploadSource::File(path.into()));
        self
    }

    pub fn reader(mut self, reader: SharedReader) -> Self {
        self.source = Some(UploadSource::Reader(reader));
        self
    }

    pub fn remote_filename(mut self, name: impl Into<String>) -> Self {
        self.remote_filename = Some(name.into());
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.push((key.into(), value.into()));
        self
    }

    pub fn create_bucket(mut self, enabled: bool) -> Self {
        self.create_bucket = enabled;
        self
    }

    pub fn no_derive(mut self, enabled: bool) -> Self {
        self.no_derive = enabled;
        self
    }

    pub fn keep_old_version(mut self, enabled: bool) -> Self {
        self.keep_old_version = enabled;
        self
    }

    pub fn delete_existing_metadata(mut self, enabled: bool) -> Self {
        self.delete_existing_metadata = enabled;
        self
    }

    pub fn multipart_threshold(mut self, bytes: u64) -> Self {
        self.multipart_threshold = Some(bytes);
        self
    }

    pub fn part_size(mut self, bytes: u64) -> Self {
        self.part_size = Some(bytes);
        self
    }

    pub fn part_count(mut self, count: u32) -> Self {
        self.part_count = Some(count);
        self
    }

    pub fn concurrent_parts(mut self, workers: usize) -> Self {
        self.concurrent_parts = Some(workers);
        self
    }

    #[doc(hidden)]
    pub fn skip_part(mut self, part_number: u32) -> Self {
        self.skip_parts.insert(part_number);
        self
    }

    pub fn simulate_error(mut self, marker: impl Into<String>) -> Self {
        self.simulate_error = Some(marker.into());
        self
    }

    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(&super::UploadStatus) + Send + Sync + 'static,
    {
        self.progress = Some(std::sync::Arc::new(callback));
        self
    }

    /// Validate, open the source and render headers
    pub async fn prepare(self, defaults: &UploadConfig) -> Result<PreparedUpload, UploadError> {
        validate_bucket(&self.bucket)?;
        if let Some(ref name) = self.remote_filename {
            if name.trim().is_empty() {
                return Err(UploadError::Validation("remote filename is empty".into()));
            }
        }

        let tuning = Tuning {
            multipart_threshold: self
                .multipart_threshold
                .unwrap_or(defaults.multipart_threshold),
            part_size: self.part_size.unwrap_or(defaults.part_size),
            part_count: self.part_count,
            concurrent_parts: self
                .concurrent_parts
                .unwrap_or(defaults.concurrent_parts)
                .max(1),
        };
        if tuning.part_size == 0 {
            return Err(UploadError::Validation("part size must be at least 1 byte".into()));
        }
        if tuning.part_count == Some(0) {
            return Err(UploadError::Validation("part count must be at least 1".into()));
        }

        let mut headers = metadata_headers(&self.metadata)?;
        self.flag_headers(&mut headers)?;

        let (key, source) = match (self.source, self.remote_filename) {
            (Some(UploadSource::File(path)), name) => {
                let key = match name {
                    Some(name) => name,
                    None => path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .ok_or_else(|| {
                            UploadError::Validation(format!(
                                "cannot derive a remote filename from {}",
                                path.display()
                            ))
                        })?,
                };
                (Some(key), Some(SharedSource::open(&path).await?))
            }
            (Some(UploadSource::Reader(_)), None) => {
                return Err(UploadError::Validation(
                    "a stream upload needs a remote filename".into(),
                ));
            }
            (Some(UploadSource::Reader(reader)), Some(name)) => {
                (Some(name), Some(SharedSource::from_shared(reader).await?))
            }
            (None, Some(name)) => {
                return Err(UploadError::Validation(format!(
                    "no content source for remote file '{}'",
                    name
                )));
            }
            (None, None) => (None, None),
        };

        if let Some(ref source) = source {
            headers.insert("x-archive-size-hint", HeaderValue::from(source.len()));
        }

        let progress = ProgressReporter::new(&self.bucket, key.as_deref(), self.progress);

        Ok(PreparedUpload {
            bucket: self.bucket,
            key,
            source,
            headers,
            tuning,
            skip_parts: self.skip_parts,
            progress,
        })
    }

    fn flag_headers(&self, headers: &mut HeaderMap) -> Result<(), UploadError> {
        if self.create_bucket {
            headers.insert("x-archive-auto-make-bucket", HeaderValue::from_static("1"));
        }
        if self.keep_old_version {
            headers.insert("x-archive-keep-old-version", HeaderValue::from_static("1"));
        }
        if self.no_derive {
            headers.insert("x-archive-queue-derive", HeaderValue::from_static("0"));
        }
        if self.delete_existing_metadata {
            headers.insert(
                "x-archive-ignore-preexisting-bucket",
                HeaderValue::from_static("1"),
            );
        }
        if let Some(ref marker) = self.simulate_error {
            let value = HeaderValue::from_str(marker).map_err(|_| {
                UploadError::Validation("simulate_error is not valid header text".into())
            })?;
            headers.insert("x-archive-simulate-error", value);
        }
        Ok(())
    }
}

/// Sizing knobs after defaults are applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tuning {
    pub multipart_threshold: u64,
    pub part_size: u64,
    pub part_count: Option<u32>,
    pub concurrent_parts: usize,
}

/// A validated request with its source opened
#[derive(Debug)]
pub struct PreparedUpload {
    pub bucket: String,
    /// `None` for an item-level metadata write
    pub key: Option<String>,
    pub source: Option<SharedSource>,
    /// Metadata, flag and size-hint headers
    pub headers: HeaderMap,
    pub tuning: Tuning,
    pub skip_parts: BTreeSet<u32>,
    pub progress: ProgressReporter,
}

impl PreparedUpload {
    pub fn content_length(&self) -> u64 {
        self.source.as_ref().map_or(0, SharedSource::len)
    }

    /// Non-empty content at or above the threshold
    pub fn is_multipart(&self) -> bool {
        let len = self.content_length();
        self.source.is_some() && len > 0 && len >= self.tuning.multipart_threshold
    }
}

fn validate_bucket(bucket: &str) -> Result<(), UploadError> {
    if bucket.trim().is_empty() {
        return Err(UploadError::Validation("bucket is required".into()));
    }
    if bucket.contains('/') {
        return Err(UploadError::Validation(format!(
            "bucket '{}' must not contain '/'",
            bucket
        )));
    }
    Ok(())
}

/// `x-archive-meta{n}-{key}` headers, `n` counting occurrences per key.
///
/// Keys are grouped in order of first appearance. Underscores in keys are
/// written as `--`; values outside ASCII are sent as `uri(<escaped>)`.
pub(crate) fn metadata_headers(metadata: &[(String, String)]) -> Result<HeaderMap, UploadError> {
    let mut groups: Vec<(&str, Vec<&str>)> = Vec::new();
    for (key, value) in metadata {
        match groups.iter_mut().find(|(k, _)| *k == key.as_str()) {
            Some((_, values)) => values.push(value.as_str()),
            None => groups.push((key.as_str(), vec![value.as_str()])),
        }
    }

    let mut headers = HeaderMap::new();
    for (key, values) in groups {
        for (index, value) in values.into_iter().enumerate() {
            let name = format!("x-archive-meta{}-{}", index, key.replace('_', "--"));
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
                UploadError::Validation(format!("metadata key '{}' is not a valid header", key))
            })?;

            let value = if value.is_ascii() {
                value.to_string()
            } else {
                format!("uri({})", utf8_percent_encode(value, URI_VALUE))
            };
            let value = HeaderValue::from_str(&value).map_err(|_| {
                UploadError::Validation(format!("metadata value for '{}' is not valid", key))
            })?;

            headers.append(name, value);
        }
    }

    Ok(headers)
}
