//! Configuration module for Archive Uploadr
//!
//! Handles loading and parsing of YAML configuration files with support for
//! environment variable expansion and validation. The resulting [`Config`]
//! is handed to [`crate::client::ArchiveClient::new`]; nothing here is global.

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

mod loader;

pub use loader::ConfigLoader;

/// Default S3-style endpoint of the archive
pub const DEFAULT_ENDPOINT: &str = "https://s3.us.archive.org";

// ============================================================================
// Environment Variable Expansion
// ============================================================================

lazy_static! {
    static ref ENV_VAR_PATTERN: regex_lite::Regex =
        regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}")
            .expect("env var pattern is valid");
}

/// Expand environment variables in a string.
///
/// Supports two syntaxes:
/// - `${VAR_NAME}` - Simple expansion, keeps placeholder if var not found
/// - `${VAR_NAME:-default}` - Expansion with default value
///
/// # Examples
///
/// ```ignore
/// std::env::set_var("MY_VAR", "value");
/// let result = expand_env_vars("prefix-${MY_VAR}-suffix");
/// assert_eq!(result, "prefix-value-suffix");
///
/// let result = expand_env_vars("${MISSING:-default}");
/// assert_eq!(result, "default");
/// ```
pub(crate) fn expand_env_vars(s: &str) -> String {
    let mut last_match = 0;
    let mut result = String::with_capacity(s.len());

    for cap in ENV_VAR_PATTERN.captures_iter(s) {
        let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
            continue;
        };

        result.push_str(&s[last_match..full_match.start()]);

        let value = match std::env::var(var_name.as_str()) {
            Ok(val) => val,
            Err(_) => match cap.get(2) {
                Some(default) => default.as_str().to_string(),
                // No env var and no default. Keep the original placeholder.
                None => full_match.as_str().to_string(),
            },
        };
        result.push_str(&value);

        last_match = full_match.end();
    }

    result.push_str(&s[last_match..]);
    result
}

/// Validate that a URL starts with http:// or https://
fn is_valid_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the S3-style endpoint
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Static credentials; `IA_ACCESS_KEY` / `IA_SECRET_KEY` are used when absent
    #[serde(default)]
    pub credentials: Option<CredentialsConfig>,

    /// Reject every mutating request
    #[serde(default)]
    pub read_only: bool,

    /// Suppress every mutating request and report synthetic success
    #[serde(default)]
    pub dry_run: bool,

    /// Permit plain-http endpoints while credentials are attached
    #[serde(default)]
    pub allow_insecure: bool,

    /// Ask the archive to schedule derived tasks with interactive priority
    #[serde(default)]
    pub interactive_priority: bool,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub upload: UploadConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            credentials: None,
            read_only: false,
            dry_run: false,
            allow_insecure: false,
            interactive_priority: false,
            http: HttpConfig::default(),
            upload: UploadConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        ConfigLoader::load(path)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_valid_http_url(&self.endpoint) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid endpoint '{}': must start with http:// or https://",
                self.endpoint
            )));
        }

        if let Some(ref credentials) = self.credentials {
            if credentials.access_key.trim().is_empty() || credentials.secret_key.trim().is_empty()
            {
                return Err(ConfigError::ValidationError(
                    "Credentials must have a non-empty access_key and secret_key".into(),
                ));
            }
        }

        if self.upload.concurrent_parts == 0 {
            return Err(ConfigError::ValidationError(
                "upload.concurrent_parts must be at least 1".into(),
            ));
        }

        if self.upload.part_size == 0 {
            return Err(ConfigError::ValidationError(
                "upload.part_size must be at least 1 byte".into(),
            ));
        }

        let retry = &self.http.retry;
        if retry.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "http.retry.max_attempts must be at least 1".into(),
            ));
        }

        if retry.initial_backoff_millis > retry.max_backoff_millis {
            return Err(ConfigError::ValidationError(format!(
                "http.retry.initial_backoff_millis ({}) exceeds max_backoff_millis ({})",
                retry.initial_backoff_millis, retry.max_backoff_millis
            )));
        }

        Ok(())
    }
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

/// Static archive credentials (the "LOW" S3 key pair)
#[derive(Clone, Serialize, Deserialize)]
pub struct CredentialsConfig {
    pub access_key: String,
    pub secret_key: String,
}

impl std::fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialsConfig")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// HTTP transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_connect_timeout_seconds")]
    pub connect_timeout_seconds: u64,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout_seconds(),
            connect_timeout_seconds: default_connect_timeout_seconds(),
            retry: RetryConfig::default(),
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }
}

fn default_timeout_seconds() -> u64 {
    300
}

fn default_connect_timeout_seconds() -> u64 {
    30
}

/// Retry policy for transient HTTP failures
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_millis")]
    pub initial_backoff_millis: u64,
    #[serde(default = "default_max_backoff_millis")]
    pub max_backoff_millis: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_millis: default_initial_backoff_millis(),
            max_backoff_millis: default_max_backoff_millis(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_millis() -> u64 {
    500
}

fn default_max_backoff_millis() -> u64 {
    10_000
}

/// Upload tuning
///
/// Every field can be overridden per request on
/// [`crate::upload::UploadRequest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Sources at or above this size are uploaded as multipart
    #[serde(default = "default_multipart_threshold")]
    pub multipart_threshold: u64,
    #[serde(default = "default_part_size")]
    pub part_size: u64,
    #[serde(default = "default_concurrent_parts")]
    pub concurrent_parts: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            multipart_threshold: default_multipart_threshold(),
            part_size: default_part_size(),
            concurrent_parts: default_concurrent_parts(),
        }
    }
}

fn default_multipart_threshold() -> u64 {
    52428800 // 50MB
}

fn default_part_size() -> u64 {
    16777216 // 16MB
}

fn default_concurrent_parts() -> usize {
    3
}
