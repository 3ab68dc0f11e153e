//! Archive client tests: delete, use-limit, retries and client setup

mod common;

#[cfg(test)]
mod tests {
    use super::common::*;
    use archive_uploadr::config::{CredentialsConfig, RetryConfig};
    use archive_uploadr::item::DeleteRequest;
    use archive_uploadr::s3::{S3Client, S3ClientError};
    use archive_uploadr::upload::UploadRequest;
    use archive_uploadr::{ArchiveClient, Config};
    use tokio_util::sync::CancellationToken;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> Config {
        let mut config = Config::default();
        config.endpoint = server.uri();
        config.allow_insecure = true;
        config.credentials = Some(CredentialsConfig {
            access_key: "test-access".into(),
            secret_key: "test-secret".into(),
        });
        config.http.retry = RetryConfig {
            max_attempts: 3,
            initial_backoff_millis: 1,
            max_backoff_millis: 5,
        };
        config
    }

    // ========================================================================
    // TEST: Delete
    // ========================================================================

    #[tokio::test]
    async fn test_delete_file_with_cascade() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path(format!("/{}/video.mp4", BUCKET)))
            .and(header("x-archive-cascade-delete", "1"))
            .and(header("authorization", "LOW test-access:test-secret"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = ArchiveClient::new(config_for(&server)).unwrap();
        let request = DeleteRequest::new(BUCKET)
            .remote_filename("video.mp4")
            .cascade_delete(true);

        client
            .delete(&request, &CancellationToken::new())
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        assert!(requests[0].headers.get("x-archive-keep-old-version").is_none());
    }

    #[tokio::test]
    async fn test_delete_item_keeps_old_version() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path(format!("/{}", BUCKET)))
            .and(header("x-archive-keep-old-version", "1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = ArchiveClient::new(config_for(&server)).unwrap();
        client
            .delete(
                &DeleteRequest::new(BUCKET).keep_old_version(true),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_delete_requires_bucket() {
        let server = MockServer::start().await;
        let client = ArchiveClient::new(config_for(&server)).unwrap();

        let result = client
            .delete(&DeleteRequest::new(" "), &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(S3ClientError::ConfigError(_))));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_read_only_client_cannot_delete() {
        let server = MockServer::start().await;
        let mut config = config_for(&server);
        config.read_only = true;
        let client = ArchiveClient::new(config).unwrap();

        let result = client
            .delete(&DeleteRequest::new(BUCKET), &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(S3ClientError::ReadOnly(_))));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    // ========================================================================
    // TEST: Use limit
    // ========================================================================

    #[tokio::test]
    async fn test_use_limit_query_and_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .and(query_param("check_limit", "1"))
            .and(query_param("accesskey", "test-access"))
            .and(query_param("bucket", BUCKET))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{
                    "bucket": "test-item",
                    "accesskey": "test-access",
                    "over_limit": 1,
                    "detail": {
                        "accesskey_ration": 200,
                        "accesskey_tasks_queued": 250,
                        "limit_reason": "accesskey",
                        "rationing_engaged": 1
                    }
                }"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let client = ArchiveClient::new(config_for(&server)).unwrap();
        let limits = client
            .use_limit(Some(BUCKET), &CancellationToken::new())
            .await
            .unwrap();

        assert!(limits.is_over_limit());
        assert_eq!(limits.bucket.as_deref(), Some(BUCKET));
        let detail = limits.detail.unwrap();
        assert_eq!(detail.accesskey_tasks_queued, Some(250));
        assert_eq!(detail.limit_reason.as_deref(), Some("accesskey"));
        assert_eq!(detail.bucket_ration, None);
    }

    #[tokio::test]
    async fn test_use_limit_rejects_malformed_json() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("check_limit", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>busy</html>"))
            .mount(&server)
            .await;

        let client = ArchiveClient::new(config_for(&server)).unwrap();
        let result = client.use_limit(None, &CancellationToken::new()).await;
        assert!(matches!(result, Err(S3ClientError::JsonError(_))));
    }

    // ========================================================================
    // TEST: Transport behaviour
    // ========================================================================

    /// A 503 is retried and the second attempt succeeds
    #[tokio::test]
    async fn test_service_unavailable_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(503).set_body_string("SlowDown"))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = ArchiveClient::new(config_for(&server)).unwrap();
        client
            .delete(&DeleteRequest::new(BUCKET), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    /// Client errors are final
    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(404).set_body_string("NoSuchBucket"))
            .expect(1)
            .mount(&server)
            .await;

        let client = ArchiveClient::new(config_for(&server)).unwrap();
        let err = client
            .delete(&DeleteRequest::new(BUCKET), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_interactive_priority_header() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(header("x-archive-interactive-priority", "1"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let mut config = config_for(&server);
        config.interactive_priority = true;
        let client = ArchiveClient::new(config).unwrap();

        let outcome = client
            .put(UploadRequest::new(BUCKET).metadata("title", "Priority"))
            .await
            .unwrap();
        assert!(outcome.is_complete());
    }

    // ========================================================================
    // TEST: Client setup
    // ========================================================================

    #[test]
    fn test_dry_run_client_needs_no_credentials() {
        let mut config = Config::default();
        config.credentials = None;
        config.dry_run = true;

        let client = ArchiveClient::new(config).unwrap();
        assert!(client.s3().is_dry_run());
    }

    #[test]
    fn test_client_exposes_configuration() {
        let config = Config {
            credentials: Some(CredentialsConfig {
                access_key: "a".into(),
                secret_key: "s".into(),
            }),
            ..Config::default()
        };

        let client = ArchiveClient::new(config).unwrap();
        assert_eq!(client.s3().access_key(), Some("a"));
        assert_eq!(client.s3().endpoint(), archive_uploadr::config::DEFAULT_ENDPOINT);
        assert_eq!(
            client.uploader().config().concurrent_parts,
            client.config().upload.concurrent_parts
        );
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        let mut config = client_config_with_endpoint("not a url");
        config.read_only = true;
        assert!(matches!(
            S3Client::new(config),
            Err(S3ClientError::ConfigError(_))
        ));
    }

    fn client_config_with_endpoint(endpoint: &str) -> archive_uploadr::s3::S3ClientConfig {
        archive_uploadr::s3::S3ClientConfig::new(endpoint)
    }
}
