//! Shared helpers for the integration tests
#![allow(dead_code)]

use archive_uploadr::config::RetryConfig;
use archive_uploadr::s3::{Credentials, S3Client, S3ClientConfig};
use rand::Rng;
use std::io::Write;
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

pub const MB: usize = 1024 * 1024;

pub const BUCKET: &str = "test-item";

pub fn client_config(server: &MockServer) -> S3ClientConfig {
    let mut config = S3ClientConfig::new(server.uri());
    config.credentials = Some(Credentials::new("test-access", "test-secret"));
    config.allow_insecure = true;
    config.retry = Some(RetryConfig {
        max_attempts: 1,
        initial_backoff_millis: 0,
        max_backoff_millis: 0,
    });
    config
}

pub fn client_for(server: &MockServer) -> Arc<S3Client> {
    Arc::new(S3Client::new(client_config(server)).unwrap())
}

pub fn random_payload(len: usize) -> Vec<u8> {
    let mut data = vec![0u8; len];
    rand::rng().fill(&mut data[..]);
    data
}

pub fn temp_file_with(data: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(data).unwrap();
    file.flush().unwrap();
    file
}

/// Responds to part PUTs with `"etag-{partNumber}"`
pub struct PartEtag;

impl Respond for PartEtag {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let part = part_number(request).unwrap_or_default();
        ResponseTemplate::new(200).insert_header("ETag", format!("\"etag-{}\"", part).as_str())
    }
}

pub fn part_number(request: &Request) -> Option<u32> {
    request
        .url
        .query_pairs()
        .find(|(k, _)| k == "partNumber")
        .and_then(|(_, v)| v.parse().ok())
}

pub fn list_uploads_xml(uploads: &[(&str, &str)]) -> String {
    let entries: String = uploads
        .iter()
        .map(|(key, id)| format!("<Upload><Key>{}</Key><UploadId>{}</UploadId></Upload>", key, id))
        .collect();
    format!(
        "<ListMultipartUploadsResult><Bucket>{}</Bucket><IsTruncated>false</IsTruncated>{}</ListMultipartUploadsResult>",
        BUCKET, entries
    )
}

pub fn list_parts_xml(parts: &[(u32, &str)]) -> String {
    let entries: String = parts
        .iter()
        .map(|(n, etag)| format!("<Part><PartNumber>{}</PartNumber><ETag>{}</ETag></Part>", n, etag))
        .collect();
    format!(
        "<ListPartsResult><Bucket>{}</Bucket><IsTruncated>false</IsTruncated>{}</ListPartsResult>",
        BUCKET, entries
    )
}

pub async fn mount_uploads_listing(server: &MockServer, uploads: &[(&str, &str)]) {
    Mock::given(method("GET"))
        .and(path(format!("/{}/", BUCKET)))
        .and(query_param("uploads", ""))
        .respond_with(ResponseTemplate::new(200).set_body_string(list_uploads_xml(uploads)))
        .mount(server)
        .await;
}

pub async fn mount_initiate(server: &MockServer, key: &str, upload_id: &str, expected: u64) {
    Mock::given(method("POST"))
        .and(path(format!("/{}/{}", BUCKET, key)))
        .and(query_param("uploads", ""))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            "<InitiateMultipartUploadResult><Bucket>{}</Bucket><Key>{}</Key><UploadId>{}</UploadId></InitiateMultipartUploadResult>",
            BUCKET, key, upload_id
        )))
        .expect(expected)
        .mount(server)
        .await;
}

pub async fn mount_parts(server: &MockServer, key: &str, upload_id: &str) {
    Mock::given(method("PUT"))
        .and(path(format!("/{}/{}", BUCKET, key)))
        .and(query_param("uploadId", upload_id))
        .respond_with(PartEtag)
        .mount(server)
        .await;
}

pub async fn mount_complete(server: &MockServer, key: &str, upload_id: &str, expected: u64) {
    Mock::given(method("POST"))
        .and(path(format!("/{}/{}", BUCKET, key)))
        .and(query_param("uploadId", upload_id))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<CompleteMultipartUploadResult><ETag>\"final-etag\"</ETag></CompleteMultipartUploadResult>",
        ))
        .expect(expected)
        .mount(server)
        .await;
}

/// Part PUTs received by the server, ordered by part number
pub async fn received_parts(server: &MockServer) -> Vec<(u32, Request)> {
    let mut parts: Vec<(u32, Request)> = server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.method.as_str() == "PUT")
        .filter_map(|r| part_number(&r).map(|n| (n, r)))
        .collect();
    parts.sort_by_key(|(n, _)| *n);
    parts
}

/// Collects progress events
pub fn progress_sink() -> (
    Arc<Mutex<Vec<archive_uploadr::upload::UploadStatus>>>,
    impl Fn(&archive_uploadr::upload::UploadStatus) + Send + Sync + 'static,
) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    (events, move |status: &archive_uploadr::upload::UploadStatus| {
        sink.lock().unwrap().push(status.clone());
    })
}
