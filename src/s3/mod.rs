//! S3-style client for the archive endpoint
//!
//! One method per wire call of the archive's S3-compatible API. Every call
//! goes through the transport (read-only / dry-run gating, retries,
//! cancellation) and is wrapped in a tracing span.
//!
//! # Example
//!
//! ```no_run
//! use archive_uploadr::s3::{Credentials, S3Client, S3ClientConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut config = S3ClientConfig::new("https://s3.us.archive.org");
//! config.credentials = Some(Credentials::new("access", "secret"));
//!
//! let client = S3Client::new(config)?;
//! let cancel = CancellationToken::new();
//!
//! let upload = client
//!     .create_multipart_upload("my-item", "movie.mp4", Default::default(), &cancel)
//!     .await?;
//! println!("Upload ID: {}", upload.upload_id);
//! # Ok(())
//! # }
//! ```
//!
//! # Tracing
//!
//! | Operation | Span Name | Attributes |
//! |-----------|-----------|------------|
//! | PutObject | `s3.put_object` | bucket, key, method, bytes, etag, status_code |
//! | CreateMultipartUpload | `s3.create_multipart_upload` | bucket, key, method, upload_id, status_code |
//! | UploadPart | `s3.upload_part` | bucket, key, upload_id, part_number, bytes, etag, status_code |
//! | CompleteMultipartUpload | `s3.complete_multipart_upload` | bucket, key, upload_id, parts_count, etag, status_code |
//! | AbortMultipartUpload | `s3.abort_multipart_upload` | bucket, key, upload_id, status_code |
//! | ListMultipartUploads | `s3.list_multipart_uploads` | bucket, key, uploads_count |
//! | ListParts | `s3.list_parts` | bucket, key, upload_id, parts_count |

pub mod credentials;
mod transport;
pub(crate) mod xml;

pub use credentials::{Credentials, CredentialsError, CredentialsProvider};
pub use transport::RetryPolicy;

use crate::config::{Config, RetryConfig};
use crate::item::UseLimitResponse;
use bytes::Bytes;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_LENGTH, ETAG, USER_AGENT};
use reqwest::{Method, Url};
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use transport::{Gate, Transport};

/// Characters left unescaped in a path segment or query value
const UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Object keys may contain directories
const KEY_PATH: &AsciiSet = &UNRESERVED.remove(b'/');

/// S3 client errors
#[derive(Error, Debug)]
pub enum S3ClientError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Credentials error: {0}")]
    CredentialsError(#[from] CredentialsError),

    #[error("Refusing to send credentials over plain http: {0}")]
    InsecureRequest(String),

    #[error("Cannot send {0} request: client is read-only")]
    ReadOnly(String),

    #[error("HTTP error {status}: {body}")]
    RequestFailed { status: u16, body: String },

    #[error("Request error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("XML error: {0}")]
    XmlError(String),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Response error: {0}")]
    ResponseError(String),

    #[error("Request cancelled")]
    Cancelled,
}

impl S3ClientError {
    /// HTTP status of a rejected request
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RequestFailed { status, .. } => Some(*status),
            Self::HttpError(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// S3 Client configuration
#[derive(Debug, Clone)]
pub struct S3ClientConfig {
    pub endpoint: String,
    pub credentials: Option<Credentials>,
    pub read_only: bool,
    pub dry_run: bool,
    pub allow_insecure: bool,
    pub interactive_priority: bool,
    pub retry: Option<RetryConfig>,
    pub timeout: Option<Duration>,
    pub connect_timeout: Option<Duration>,
}

impl S3ClientConfig {
    /// Writable client config with default transport settings and no credentials
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            credentials: None,
            read_only: false,
            dry_run: false,
            allow_insecure: false,
            interactive_priority: false,
            retry: None,
            timeout: None,
            connect_timeout: None,
        }
    }

    /// Build from the application configuration.
    ///
    /// Credentials come from the config block or the environment; they are
    /// only mandatory for a client that may mutate.
    pub fn from_config(config: &Config) -> Result<Self, S3ClientError> {
        let may_mutate = !config.read_only && !config.dry_run;
        let credentials = match CredentialsProvider::resolve(config.credentials.as_ref()) {
            Ok(credentials) => Some(credentials),
            Err(e) if may_mutate => return Err(e.into()),
            Err(e) => {
                tracing::debug!(error = %e, "No credentials; continuing without them");
                None
            }
        };

        Ok(Self {
            endpoint: config.endpoint.clone(),
            credentials,
            read_only: config.read_only,
            dry_run: config.dry_run,
            allow_insecure: config.allow_insecure,
            interactive_priority: config.interactive_priority,
            retry: Some(config.http.retry.clone()),
            timeout: Some(config.http.timeout()),
            connect_timeout: Some(config.http.connect_timeout()),
        })
    }
}

/// S3 Client
pub struct S3Client {
    config: S3ClientConfig,
    endpoint: String,
    transport: Transport,
}

impl S3Client {
    /// Create a new S3 client
    pub fn new(config: S3ClientConfig) -> Result<Self, S3ClientError> {
        let endpoint = config.endpoint.trim_end_matches('/').to_string();
        Url::parse(&endpoint)
            .map_err(|e| S3ClientError::ConfigError(format!("invalid endpoint: {}", e)))?;

        let attach_credentials = !config.read_only && !config.dry_run;
        if attach_credentials && config.credentials.is_none() {
            return Err(S3ClientError::ConfigError(
                "credentials are required unless read_only or dry_run is set".into(),
            ));
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("archive-uploadr/", env!("CARGO_PKG_VERSION"))),
        );
        if attach_credentials {
            if let Some(ref credentials) = config.credentials {
                let mut value = HeaderValue::from_str(&credentials.authorization_value())
                    .map_err(|_| {
                        S3ClientError::ConfigError("credentials are not valid header text".into())
                    })?;
                value.set_sensitive(true);
                headers.insert(AUTHORIZATION, value);
            }
        }
        if config.interactive_priority {
            headers.insert(
                "x-archive-interactive-priority",
                HeaderValue::from_static("1"),
            );
        }

        let mut builder = reqwest::Client::builder().default_headers(headers);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(connect_timeout) = config.connect_timeout {
            builder = builder.connect_timeout(connect_timeout);
        }
        let http_client = builder
            .build()
            .map_err(|e| S3ClientError::ConfigError(e.to_string()))?;

        let retry = config
            .retry
            .as_ref()
            .map(RetryPolicy::from_config)
            .unwrap_or_else(|| RetryPolicy::from_config(&RetryConfig::default()));

        let transport = Transport::new(
            http_client,
            Gate {
                read_only: config.read_only,
                dry_run: config.dry_run,
                allow_insecure: config.allow_insecure,
            },
            retry,
        );

        Ok(Self {
            config,
            endpoint,
            transport,
        })
    }

    /// Get the endpoint URL
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn is_dry_run(&self) -> bool {
        self.config.dry_run
    }

    pub fn is_read_only(&self) -> bool {
        self.config.read_only
    }

    /// Access key in use, if any
    pub fn access_key(&self) -> Option<&str> {
        self.config.credentials.as_ref().map(|c| c.access_key())
    }

    /// `{endpoint}/{bucket}[/{key}][?query]`
    fn object_url(&self, bucket: &str, key: Option<&str>, query: &str) -> Result<Url, S3ClientError> {
        let mut url = format!(
            "{}/{}",
            self.endpoint,
            utf8_percent_encode(bucket, UNRESERVED)
        );
        if let Some(key) = key {
            url.push('/');
            url.push_str(&utf8_percent_encode(key, KEY_PATH).to_string());
        }
        if !query.is_empty() {
            url.push('?');
            url.push_str(query);
        }
        Url::parse(&url).map_err(|e| S3ClientError::ConfigError(format!("invalid url {}: {}", url, e)))
    }

    fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        self.transport.http().request(method, url)
    }

    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
        cancel: &CancellationToken,
    ) -> Result<Option<reqwest::Response>, S3ClientError> {
        let request = builder.build()?;
        self.transport.send(request, cancel).await
    }

    /// Upload an object in one request (PutObject).
    ///
    /// `key` is `None` for item-level metadata writes, which target the
    /// bucket itself.
    #[tracing::instrument(
        name = "s3.put_object",
        skip(self, headers, body, cancel),
        fields(
            s3.bucket = %bucket,
            s3.key = ?key,
            http.method = "PUT",
            upload.bytes = content_length,
            s3.etag = tracing::field::Empty,
            http.status_code = tracing::field::Empty
        ),
        err
    )]
    pub async fn put_object(
        &self,
        bucket: &str,
        key: Option<&str>,
        headers: HeaderMap,
        body: reqwest::Body,
        content_length: u64,
        cancel: &CancellationToken,
    ) -> Result<S3PutObjectResponse, S3ClientError> {
        let url = self.object_url(bucket, key, "")?;
        let builder = self
            .request(Method::PUT, url)
            .headers(headers)
            .header(CONTENT_LENGTH, content_length)
            .body(body);

        let span = tracing::Span::current();
        let etag = match self.send(builder, cancel).await? {
            Some(response) => {
                span.record("http.status_code", response.status().as_u16());
                etag_of(&response)
            }
            None => Some(synthetic_etag()),
        };
        if let Some(ref etag) = etag {
            span.record("s3.etag", etag.as_str());
        }

        tracing::info!(etag = ?etag, bytes = content_length, "PutObject completed");
        Ok(S3PutObjectResponse { etag })
    }

    /// Create a multipart upload
    #[tracing::instrument(
        name = "s3.create_multipart_upload",
        skip(self, headers, cancel),
        fields(
            s3.bucket = %bucket,
            s3.key = %key,
            http.method = "POST",
            s3.upload_id = tracing::field::Empty,
            http.status_code = tracing::field::Empty
        ),
        err
    )]
    pub async fn create_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        headers: HeaderMap,
        cancel: &CancellationToken,
    ) -> Result<S3CreateMultipartUploadResponse, S3ClientError> {
        let url = self.object_url(bucket, Some(key), "uploads")?;
        let builder = self.request(Method::POST, url).headers(headers);

        let span = tracing::Span::current();
        let upload_id = match self.send(builder, cancel).await? {
            Some(response) => {
                span.record("http.status_code", response.status().as_u16());
                let body = response.text().await?;
                let result: xml::InitiateMultipartUploadResult = xml::parse(&body)?;
                result.upload_id
            }
            None => format!("dry-run-{}", uuid::Uuid::new_v4()),
        };

        if upload_id.trim().is_empty() {
            return Err(S3ClientError::ResponseError("empty UploadId".into()));
        }
        span.record("s3.upload_id", upload_id.as_str());

        tracing::info!(upload_id = %upload_id, "CreateMultipartUpload completed");
        Ok(S3CreateMultipartUploadResponse { upload_id })
    }

    /// List multipart uploads in progress for a bucket.
    ///
    /// With `key`, only uploads for exactly that object are returned.
    /// Follows pagination markers until the listing is complete.
    #[tracing::instrument(
        name = "s3.list_multipart_uploads",
        skip(self, cancel),
        fields(
            s3.bucket = %bucket,
            s3.key = ?key,
            uploads_count = tracing::field::Empty
        ),
        err
    )]
    pub async fn list_multipart_uploads(
        &self,
        bucket: &str,
        key: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<S3MultipartUpload>, S3ClientError> {
        let mut uploads = Vec::new();
        let mut markers: Option<(String, Option<String>)> = None;

        loop {
            let mut query = String::from("uploads");
            if let Some(key) = key {
                query.push_str("&prefix=");
                query.push_str(&encode_query(key));
            }
            if let Some((ref key_marker, ref upload_id_marker)) = markers {
                query.push_str("&key-marker=");
                query.push_str(&encode_query(key_marker));
                if let Some(upload_id_marker) = upload_id_marker {
                    query.push_str("&upload-id-marker=");
                    query.push_str(&encode_query(upload_id_marker));
                }
            }

            let url = self.object_url(bucket, Some(""), &query)?;
            let Some(response) = self.send(self.request(Method::GET, url), cancel).await? else {
                break;
            };
            let body = response.text().await?;
            let page: xml::ListMultipartUploadsResult = xml::parse(&body)?;

            uploads.extend(
                page.uploads
                    .into_iter()
                    .filter(|upload| key.map_or(true, |key| upload.key == key))
                    .map(|upload| S3MultipartUpload {
                        key: upload.key,
                        upload_id: upload.upload_id,
                        initiated: upload.initiated,
                    }),
            );

            let next_key = xml::non_empty(page.next_key_marker);
            match (page.is_truncated.unwrap_or(false), next_key) {
                (true, Some(next_key)) => {
                    markers = Some((next_key, xml::non_empty(page.next_upload_id_marker)));
                }
                _ => break,
            }
        }

        tracing::Span::current().record("uploads_count", uploads.len());
        Ok(uploads)
    }

    /// List the parts already stored for an upload
    #[tracing::instrument(
        name = "s3.list_parts",
        skip(self, cancel),
        fields(
            s3.bucket = %bucket,
            s3.key = %key,
            s3.upload_id = %upload_id,
            parts_count = tracing::field::Empty
        ),
        err
    )]
    pub async fn list_parts(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<S3Part>, S3ClientError> {
        let mut parts = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let mut query = format!("uploadId={}", encode_query(upload_id));
            if let Some(ref marker) = marker {
                query.push_str("&part-number-marker=");
                query.push_str(&encode_query(marker));
            }

            let url = self.object_url(bucket, Some(key), &query)?;
            let Some(response) = self.send(self.request(Method::GET, url), cancel).await? else {
                break;
            };
            let body = response.text().await?;
            let page: xml::ListPartsResult = xml::parse(&body)?;

            parts.extend(page.parts.into_iter().map(|part| S3Part {
                part_number: part.part_number,
                etag: part.etag,
                size: part.size,
            }));

            match (
                page.is_truncated.unwrap_or(false),
                xml::non_empty(page.next_part_number_marker),
            ) {
                (true, Some(next)) => marker = Some(next),
                _ => break,
            }
        }

        tracing::Span::current().record("parts_count", parts.len());
        Ok(parts)
    }

    /// Upload a part in a multipart upload
    #[tracing::instrument(
        name = "s3.upload_part",
        skip(self, body, content_md5, cancel),
        fields(
            s3.bucket = %bucket,
            s3.key = %key,
            s3.upload_id = %upload_id,
            s3.part_number = part_number,
            http.method = "PUT",
            upload.bytes = body.len(),
            s3.etag = tracing::field::Empty,
            http.status_code = tracing::field::Empty
        ),
        err
    )]
    pub async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: u32,
        body: Bytes,
        content_md5: &str,
        cancel: &CancellationToken,
    ) -> Result<S3UploadPartResponse, S3ClientError> {
        let query = format!(
            "partNumber={}&uploadId={}",
            part_number,
            encode_query(upload_id)
        );
        let url = self.object_url(bucket, Some(key), &query)?;
        let bytes = body.len();
        let builder = self
            .request(Method::PUT, url)
            .header("Content-MD5", content_md5)
            .header(CONTENT_LENGTH, bytes)
            .body(body);

        let span = tracing::Span::current();
        let etag = match self.send(builder, cancel).await? {
            Some(response) => {
                span.record("http.status_code", response.status().as_u16());
                etag_of(&response)
            }
            None => Some(synthetic_etag()),
        };
        if let Some(ref etag) = etag {
            span.record("s3.etag", etag.as_str());
        }

        tracing::debug!(etag = ?etag, part_number = part_number, bytes = bytes, "UploadPart completed");
        Ok(S3UploadPartResponse { etag })
    }

    /// Complete a multipart upload. `parts` must be ordered by part number.
    #[tracing::instrument(
        name = "s3.complete_multipart_upload",
        skip(self, parts, cancel),
        fields(
            s3.bucket = %bucket,
            s3.key = %key,
            s3.upload_id = %upload_id,
            http.method = "POST",
            parts_count = parts.len(),
            s3.etag = tracing::field::Empty,
            http.status_code = tracing::field::Empty
        ),
        err
    )]
    pub async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
        cancel: &CancellationToken,
    ) -> Result<S3CompleteMultipartUploadResponse, S3ClientError> {
        let manifest = xml::complete_manifest(parts)?;
        let url = self.object_url(bucket, Some(key), &format!("uploadId={}", encode_query(upload_id)))?;
        let builder = self
            .request(Method::POST, url)
            .header("Content-Type", "application/xml")
            .body(manifest);

        let span = tracing::Span::current();
        let etag = match self.send(builder, cancel).await? {
            Some(response) => {
                span.record("http.status_code", response.status().as_u16());
                let header_etag = etag_of(&response);
                let body = response.text().await?;
                if body.trim().is_empty() {
                    header_etag
                } else {
                    let result: xml::CompleteMultipartUploadResult = xml::parse(&body)?;
                    result.etag.or(header_etag)
                }
            }
            None => Some(synthetic_etag()),
        };
        if let Some(ref etag) = etag {
            span.record("s3.etag", etag.as_str());
        }

        tracing::info!(etag = ?etag, parts = parts.len(), "CompleteMultipartUpload completed");
        Ok(S3CompleteMultipartUploadResponse { etag })
    }

    /// Abort a multipart upload, discarding stored parts
    #[tracing::instrument(
        name = "s3.abort_multipart_upload",
        skip(self, cancel),
        fields(
            s3.bucket = %bucket,
            s3.key = %key,
            s3.upload_id = %upload_id,
            http.method = "DELETE",
            http.status_code = tracing::field::Empty
        ),
        err
    )]
    pub async fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        cancel: &CancellationToken,
    ) -> Result<(), S3ClientError> {
        let url = self.object_url(bucket, Some(key), &format!("uploadId={}", encode_query(upload_id)))?;
        if let Some(response) = self.send(self.request(Method::DELETE, url), cancel).await? {
            tracing::Span::current().record("http.status_code", response.status().as_u16());
        }

        tracing::info!(upload_id = %upload_id, "Aborted multipart upload");
        Ok(())
    }

    /// Delete an item (`key` = `None`) or a single file of an item
    #[tracing::instrument(
        name = "s3.delete_object",
        skip(self, headers, cancel),
        fields(
            s3.bucket = %bucket,
            s3.key = ?key,
            http.method = "DELETE",
            http.status_code = tracing::field::Empty
        ),
        err
    )]
    pub async fn delete_object(
        &self,
        bucket: &str,
        key: Option<&str>,
        headers: HeaderMap,
        cancel: &CancellationToken,
    ) -> Result<(), S3ClientError> {
        let url = self.object_url(bucket, key, "")?;
        let builder = self.request(Method::DELETE, url).headers(headers);
        if let Some(response) = self.send(builder, cancel).await? {
            tracing::Span::current().record("http.status_code", response.status().as_u16());
        }
        Ok(())
    }

    /// Query the task-queue rationing state for a bucket
    #[tracing::instrument(name = "s3.check_limit", skip(self, cancel), fields(s3.bucket = %bucket), err)]
    pub async fn check_limit(
        &self,
        bucket: &str,
        cancel: &CancellationToken,
    ) -> Result<UseLimitResponse, S3ClientError> {
        let query = format!(
            "check_limit=1&accesskey={}&bucket={}",
            encode_query(self.access_key().unwrap_or_default()),
            encode_query(bucket)
        );
        let url = Url::parse(&format!("{}/?{}", self.endpoint, query))
            .map_err(|e| S3ClientError::ConfigError(e.to_string()))?;

        let response = self
            .send(self.request(Method::GET, url), cancel)
            .await?
            .ok_or_else(|| S3ClientError::ResponseError("no response to check_limit".into()))?;
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

fn encode_query(value: &str) -> String {
    utf8_percent_encode(value, UNRESERVED).to_string()
}

fn etag_of(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get(ETAG)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .filter(|etag| !etag.is_empty())
}

/// Success marker returned for calls suppressed by dry-run
fn synthetic_etag() -> String {
    format!("\"dry-run-{}\"", uuid::Uuid::new_v4())
}

/// S3 PutObject response
#[derive(Debug, Clone)]
pub struct S3PutObjectResponse {
    pub etag: Option<String>,
}

/// S3 CreateMultipartUpload response
#[derive(Debug, Clone)]
pub struct S3CreateMultipartUploadResponse {
    pub upload_id: String,
}

/// S3 UploadPart response
#[derive(Debug, Clone)]
pub struct S3UploadPartResponse {
    pub etag: Option<String>,
}

/// S3 CompleteMultipartUpload response
#[derive(Debug, Clone)]
pub struct S3CompleteMultipartUploadResponse {
    pub etag: Option<String>,
}

/// An in-progress multipart upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3MultipartUpload {
    pub key: String,
    pub upload_id: String,
    pub initiated: Option<String>,
}

/// A part already stored by the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Part {
    pub part_number: u32,
    pub etag: String,
    pub size: Option<u64>,
}

/// Entry of the completion manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedPart {
    pub part_number: u32,
    pub etag: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> S3ClientConfig {
        let mut config = S3ClientConfig::new("https://s3.us.archive.org/");
        config.credentials = Some(Credentials::new("access", "secret"));
        config
    }

    #[test]
    fn test_s3_client_creation() {
        let client = S3Client::new(test_config()).unwrap();
        assert_eq!(client.endpoint(), "https://s3.us.archive.org");
        assert_eq!(client.access_key(), Some("access"));
        assert!(!client.is_dry_run());
    }

    #[test]
    fn test_writable_client_requires_credentials() {
        let config = S3ClientConfig::new("https://s3.us.archive.org");
        assert!(matches!(
            S3Client::new(config),
            Err(S3ClientError::ConfigError(_))
        ));
    }

    #[test]
    fn test_read_only_client_without_credentials() {
        let mut config = S3ClientConfig::new("https://s3.us.archive.org");
        config.read_only = true;
        let client = S3Client::new(config).unwrap();
        assert!(client.is_read_only());
        assert_eq!(client.access_key(), None);
    }

    #[test]
    fn test_object_url_encoding() {
        let client = S3Client::new(test_config()).unwrap();

        let url = client
            .object_url("my-item", Some("dir/a file.txt"), "uploads")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://s3.us.archive.org/my-item/dir/a%20file.txt?uploads"
        );

        let url = client.object_url("my-item", None, "").unwrap();
        assert_eq!(url.as_str(), "https://s3.us.archive.org/my-item");

        let url = client.object_url("my-item", Some(""), "uploads").unwrap();
        assert_eq!(url.as_str(), "https://s3.us.archive.org/my-item/?uploads");
    }

    #[test]
    fn test_error_status_helpers() {
        let err = S3ClientError::RequestFailed {
            status: 404,
            body: "NoSuchUpload".into(),
        };
        assert!(err.is_not_found());
        assert_eq!(err.status(), Some(404));
        assert!(err.to_string().contains("NoSuchUpload"));
        assert!(S3ClientError::Cancelled.is_cancelled());
    }

    #[test]
    fn test_synthetic_etag_is_quoted() {
        let etag = synthetic_etag();
        assert!(etag.starts_with("\"dry-run-"));
        assert!(etag.ends_with('"'));
    }
}
