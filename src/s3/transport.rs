//! Request transport
//!
//! Sends one request with read-only / dry-run gating, status-keyed retries
//! and cancellation. Everything above this layer sees either a successful
//! response, `None` for a suppressed dry-run call, or an [`S3ClientError`].

use super::S3ClientError;
use crate::config::RetryConfig;
use crate::metrics;
use reqwest::{Method, Request, Response, StatusCode};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Statuses worth another attempt
const RETRYABLE_STATUSES: [StatusCode; 5] = [
    StatusCode::TOO_MANY_REQUESTS,
    StatusCode::INTERNAL_SERVER_ERROR,
    StatusCode::BAD_GATEWAY,
    StatusCode::SERVICE_UNAVAILABLE,
    StatusCode::GATEWAY_TIMEOUT,
];

/// Exponential backoff derived from [`RetryConfig`]
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff_millis),
            max_backoff: Duration::from_millis(config.max_backoff_millis),
        }
    }

    /// A policy that never retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before attempt `attempt + 1` (attempts are 1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    pub fn is_retryable(status: StatusCode) -> bool {
        RETRYABLE_STATUSES.contains(&status)
    }
}

/// Gating flags applied before anything is sent
#[derive(Debug, Clone, Copy)]
pub(crate) struct Gate {
    pub read_only: bool,
    pub dry_run: bool,
    pub allow_insecure: bool,
}

fn is_read_only_method(method: &Method) -> bool {
    *method == Method::GET || *method == Method::HEAD
}

pub(crate) struct Transport {
    http: reqwest::Client,
    gate: Gate,
    retry: RetryPolicy,
}

impl Transport {
    pub fn new(http: reqwest::Client, gate: Gate, retry: RetryPolicy) -> Self {
        Self { http, gate, retry }
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Send a request.
    ///
    /// Returns `Ok(None)` when a mutating request was suppressed by dry-run.
    pub async fn send(
        &self,
        request: Request,
        cancel: &CancellationToken,
    ) -> Result<Option<Response>, S3ClientError> {
        tracing::debug!(method = %request.method(), url = %request.url(), "Sending request");

        if request.url().scheme() == "http"
            && !self.gate.read_only
            && !self.gate.dry_run
            && !self.gate.allow_insecure
        {
            return Err(S3ClientError::InsecureRequest(request.url().to_string()));
        }

        if !is_read_only_method(request.method()) {
            if self.gate.dry_run {
                tracing::info!(
                    method = %request.method(),
                    url = %request.url(),
                    "Dry run: request not sent"
                );
                return Ok(None);
            }
            if self.gate.read_only {
                return Err(S3ClientError::ReadOnly(request.method().to_string()));
            }
        }

        let mut attempt = 1;
        let mut pending = request;

        loop {
            if cancel.is_cancelled() {
                return Err(S3ClientError::Cancelled);
            }

            // Streamed bodies cannot be cloned; those get exactly one attempt.
            let retry_copy = if attempt < self.retry.max_attempts() {
                pending.try_clone()
            } else {
                None
            };

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(S3ClientError::Cancelled),
                result = self.http.execute(pending) => result,
            };

            let retry_reason = match result {
                Ok(response) if response.status().is_success() => {
                    tracing::debug!(status = response.status().as_u16(), "Request succeeded");
                    return Ok(Some(response));
                }
                Ok(response) => {
                    let status = response.status();
                    if !RetryPolicy::is_retryable(status) || retry_copy.is_none() {
                        let body = response.text().await.unwrap_or_default();
                        tracing::error!(
                            status = status.as_u16(),
                            body = %body,
                            attempt = attempt,
                            "Request failed"
                        );
                        return Err(S3ClientError::RequestFailed {
                            status: status.as_u16(),
                            body,
                        });
                    }
                    status.as_u16().to_string()
                }
                Err(e) => {
                    if !(e.is_connect() || e.is_timeout()) || retry_copy.is_none() {
                        return Err(S3ClientError::HttpError(e));
                    }
                    if e.is_timeout() {
                        "timeout".to_string()
                    } else {
                        "connect".to_string()
                    }
                }
            };

            let delay = self.retry.backoff(attempt);
            metrics::record_http_retry(&retry_reason);
            tracing::warn!(
                reason = %retry_reason,
                attempt = attempt,
                delay_ms = delay.as_millis() as u64,
                "Retrying request"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(S3ClientError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }

            match retry_copy {
                Some(next) => pending = next,
                None => return Err(S3ClientError::ResponseError("retry without request".into())),
            }
            attempt += 1;
        }
    }
}
