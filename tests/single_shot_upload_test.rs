//! Single PUT Upload Tests
//!
//! Uploads below the multipart threshold, empty files and item-level
//! metadata writes.

mod common;

#[cfg(test)]
mod tests {
    use super::common::*;
    use archive_uploadr::config::UploadConfig;
    use archive_uploadr::s3::{S3Client, S3ClientConfig, S3ClientError};
    use archive_uploadr::upload::{UploadError, UploadRequest, Uploader};
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use md5::{Digest, Md5};
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;
    use wiremock::matchers::{body_bytes, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn uploader(server: &MockServer) -> Uploader {
        Uploader::new(client_for(server), UploadConfig::default())
    }

    fn header_value<'a>(request: &'a wiremock::Request, name: &str) -> Option<&'a str> {
        request.headers.get(name).and_then(|v| v.to_str().ok())
    }

    // ========================================================================
    // TEST: Single PUT
    // ========================================================================

    /// Headers, checksum and body of a small file upload
    #[tokio::test]
    async fn test_small_file_single_put() {
        let server = MockServer::start().await;
        let data = random_payload(4096);
        let digest = Md5::digest(&data);

        Mock::given(method("PUT"))
            .and(path(format!("/{}/notes.txt", BUCKET)))
            .and(header("authorization", "LOW test-access:test-secret"))
            .and(body_bytes(data.clone()))
            .respond_with(ResponseTemplate::new(200).insert_header("ETag", "\"abc123\""))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let file = temp_file_with(&data);
        let request = UploadRequest::new(BUCKET)
            .file(file.path())
            .remote_filename("notes.txt")
            .metadata("title", "Field notes")
            .metadata("subject", "birds")
            .metadata("subject", "spring")
            .create_bucket(true)
            .no_derive(true)
            .keep_old_version(true);

        let outcome = uploader(&server)
            .upload(request, &CancellationToken::new())
            .await
            .unwrap();

        let result = outcome.completed().cloned().unwrap();
        assert_eq!(result.etag.as_deref(), Some("\"abc123\""));
        assert_eq!(result.bytes_written, 4096);
        assert_eq!(result.parts, 0);
        assert_eq!(result.content_md5, Some(hex::encode(digest)));

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        let put = &requests[0];

        let expected_md5 = STANDARD.encode(digest);
        assert_eq!(header_value(put, "content-md5"), Some(expected_md5.as_str()));
        assert_eq!(header_value(put, "x-archive-size-hint"), Some("4096"));
        assert_eq!(header_value(put, "x-archive-meta0-title"), Some("Field notes"));
        assert_eq!(header_value(put, "x-archive-meta0-subject"), Some("birds"));
        assert_eq!(header_value(put, "x-archive-meta1-subject"), Some("spring"));
        assert_eq!(header_value(put, "x-archive-auto-make-bucket"), Some("1"));
        assert_eq!(header_value(put, "x-archive-queue-derive"), Some("0"));
        assert_eq!(header_value(put, "x-archive-keep-old-version"), Some("1"));
        assert!(put.headers.get("x-archive-ignore-preexisting-bucket").is_none());
    }

    /// The remote name defaults to the local file name
    #[tokio::test]
    async fn test_remote_name_defaults_to_basename() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("report.pdf");
        std::fs::write(&local, b"%PDF-1.4").unwrap();

        Mock::given(method("PUT"))
            .and(path(format!("/{}/report.pdf", BUCKET)))
            .respond_with(ResponseTemplate::new(200).insert_header("ETag", "\"pdf\""))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = uploader(&server)
            .upload(UploadRequest::new(BUCKET).file(&local), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(
            outcome.completed().and_then(|r| r.key.clone()).as_deref(),
            Some("report.pdf")
        );
    }

    /// Progress reaches the full size of the body
    #[tokio::test]
    async fn test_single_put_reports_progress() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200).insert_header("ETag", "\"p\""))
            .mount(&server)
            .await;

        let (events, callback) = progress_sink();
        let file = temp_file_with(&random_payload(200_000));
        let request = UploadRequest::new(BUCKET)
            .file(file.path())
            .remote_filename("progress.bin")
            .on_progress(callback);

        uploader(&server)
            .upload(request, &CancellationToken::new())
            .await
            .unwrap();

        let events = events.lock().unwrap();
        assert!(!events.is_empty());
        assert!(events.iter().all(|e| e.part_number.is_none()));
        assert!(events
            .windows(2)
            .all(|w| w[0].bytes_transferred <= w[1].bytes_transferred));
        let last = events.last().unwrap();
        assert_eq!(last.bytes_transferred, 200_000);
        assert_eq!(last.total_bytes, 200_000);
        assert_eq!(last.key.as_deref(), Some("progress.bin"));
    }

    /// An empty file is one zero-length PUT, never multipart
    #[tokio::test]
    async fn test_empty_file_uploads_with_single_put() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path(format!("/{}/empty.txt", BUCKET)))
            .respond_with(ResponseTemplate::new(200).insert_header("ETag", "\"empty\""))
            .expect(1)
            .mount(&server)
            .await;

        let (events, callback) = progress_sink();
        let file = temp_file_with(&[]);
        let request = UploadRequest::new(BUCKET)
            .file(file.path())
            .remote_filename("empty.txt")
            .multipart_threshold(0)
            .on_progress(callback);

        let outcome = uploader(&server)
            .upload(request, &CancellationToken::new())
            .await
            .unwrap();

        let result = outcome.completed().cloned().unwrap();
        assert_eq!(result.bytes_written, 0);
        assert!(result.upload_id.is_none());
        assert_eq!(events.lock().unwrap().last().map(|e| e.percent()), Some(100.0));

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].body.is_empty());
        assert_eq!(header_value(&requests[0], "x-archive-size-hint"), Some("0"));
    }

    // ========================================================================
    // TEST: Metadata-only writes
    // ========================================================================

    /// No source and no remote name targets the item itself
    #[tokio::test]
    async fn test_metadata_only_put_targets_item() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path(format!("/{}", BUCKET)))
            .and(header("x-archive-meta0-title", "New item"))
            .and(header("x-archive-ignore-preexisting-bucket", "1"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let request = UploadRequest::new(BUCKET)
            .metadata("title", "New item")
            .metadata("external_identifier", "urn:test")
            .create_bucket(true)
            .delete_existing_metadata(true);

        let outcome = uploader(&server)
            .upload(request, &CancellationToken::new())
            .await
            .unwrap();

        let result = outcome.completed().cloned().unwrap();
        assert!(result.key.is_none());
        assert_eq!(result.bytes_written, 0);

        let requests = server.received_requests().await.unwrap();
        assert_eq!(
            header_value(&requests[0], "x-archive-meta0-external--identifier"),
            Some("urn:test")
        );
        assert!(requests[0].headers.get("content-md5").is_none());
    }

    /// Non-ASCII metadata is sent URI-escaped
    #[tokio::test]
    async fn test_unicode_metadata_is_escaped() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(header("x-archive-meta0-creator", "uri(Bj%C3%B6rk)"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        uploader(&server)
            .upload(
                UploadRequest::new(BUCKET).metadata("creator", "Björk"),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
    }

    // ========================================================================
    // TEST: Validation
    // ========================================================================

    /// Invalid requests fail before anything is sent
    #[tokio::test]
    async fn test_invalid_requests_send_nothing() {
        let server = MockServer::start().await;
        let up = uploader(&server);
        let cancel = CancellationToken::new();

        let cases = vec![
            UploadRequest::new(""),
            UploadRequest::new("a/b").metadata("title", "x"),
            UploadRequest::new(BUCKET).remote_filename("orphan.txt"),
            UploadRequest::new(BUCKET)
                .reader(archive_uploadr::upload::shared_reader(std::io::Cursor::new(vec![1u8; 8]))),
            UploadRequest::new(BUCKET).metadata("bad key", "x"),
        ];

        for request in cases {
            let result = up.upload(request, &cancel).await;
            assert!(matches!(result, Err(UploadError::Validation(_))));
        }

        let missing = up
            .upload(
                UploadRequest::new(BUCKET).file("/definitely/not/here.bin"),
                &cancel,
            )
            .await;
        assert!(matches!(missing, Err(UploadError::Io(_))));

        assert!(server.received_requests().await.unwrap().is_empty());
    }

    // ========================================================================
    // TEST: Errors
    // ========================================================================

    /// Rejections carry status and body
    #[tokio::test]
    async fn test_rejection_carries_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(403).set_body_string("AccessDenied"))
            .mount(&server)
            .await;

        let file = temp_file_with(b"secret");
        let result = uploader(&server)
            .upload(
                UploadRequest::new(BUCKET).file(file.path()).remote_filename("s.txt"),
                &CancellationToken::new(),
            )
            .await;

        let err = result.err().expect("upload should fail");
        assert_eq!(err.status(), Some(403));
        assert!(err.to_string().contains("AccessDenied"));
    }

    /// A read-only client refuses to PUT
    #[tokio::test]
    async fn test_read_only_client_refuses_put() {
        let server = MockServer::start().await;
        let mut config = S3ClientConfig::new(server.uri());
        config.read_only = true;
        let up = Uploader::new(
            Arc::new(S3Client::new(config).unwrap()),
            UploadConfig::default(),
        );

        let result = up
            .upload(
                UploadRequest::new(BUCKET).metadata("title", "x"),
                &CancellationToken::new(),
            )
            .await;
        assert!(matches!(
            result,
            Err(UploadError::S3(S3ClientError::ReadOnly(_)))
        ));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    /// Credentials are never sent over plain http without opting in
    #[tokio::test]
    async fn test_insecure_endpoint_rejected() {
        let server = MockServer::start().await;
        let mut config = client_config(&server);
        config.allow_insecure = false;
        let up = Uploader::new(
            Arc::new(S3Client::new(config).unwrap()),
            UploadConfig::default(),
        );

        let result = up
            .upload(
                UploadRequest::new(BUCKET).metadata("title", "x"),
                &CancellationToken::new(),
            )
            .await;
        assert!(matches!(
            result,
            Err(UploadError::S3(S3ClientError::InsecureRequest(_)))
        ));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    // ========================================================================
    // TEST: Dry run
    // ========================================================================

    /// A suppressed PUT still reports the whole body as transferred
    #[tokio::test]
    async fn test_dry_run_single_put_reports_progress() {
        let server = MockServer::start().await;
        let mut config = client_config(&server);
        config.credentials = None;
        config.dry_run = true;
        config.allow_insecure = false;
        let up = Uploader::new(
            Arc::new(S3Client::new(config).unwrap()),
            UploadConfig::default(),
        );

        let (events, callback) = progress_sink();
        let file = temp_file_with(&random_payload(5000));
        let request = UploadRequest::new(BUCKET)
            .file(file.path())
            .remote_filename("dry.txt")
            .on_progress(callback);

        let outcome = up.upload(request, &CancellationToken::new()).await.unwrap();
        assert!(outcome
            .completed()
            .and_then(|r| r.etag.clone())
            .unwrap()
            .starts_with("\"dry-run-"));

        assert!(server.received_requests().await.unwrap().is_empty());

        let events = events.lock().unwrap();
        let last = events.last().expect("progress event");
        assert_eq!(last.bytes_transferred, 5000);
        assert_eq!(last.total_bytes, 5000);
    }
}
