//! Archive Credentials Module
//!
//! The archive's S3-style API authenticates with a static key pair sent as
//! `authorization: LOW <access>:<secret>`.
//!
//! # Sources
//!
//! - Configuration (`credentials.access_key` / `credentials.secret_key`)
//! - Environment variables (`IA_ACCESS_KEY` / `IA_SECRET_KEY`)
//!
//! # Example
//!
//! ```
//! use archive_uploadr::s3::Credentials;
//!
//! let creds = Credentials::new("access-key", "secret-key");
//! assert_eq!(creds.access_key(), "access-key");
//! assert_eq!(creds.authorization_value(), "LOW access-key:secret-key");
//! ```

use crate::config::CredentialsConfig;
use thiserror::Error;

/// Environment variable holding the access key
pub const ACCESS_KEY_ENV: &str = "IA_ACCESS_KEY";

/// Environment variable holding the secret key
pub const SECRET_KEY_ENV: &str = "IA_SECRET_KEY";

/// Credential loading errors
#[derive(Error, Debug)]
pub enum CredentialsError {
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),
}

/// Archive key pair
#[derive(Clone)]
pub struct Credentials {
    access_key: String,
    secret_key: String,
}

impl Credentials {
    /// Create new credentials
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
        }
    }

    /// Get the access key
    pub fn access_key(&self) -> &str {
        &self.access_key
    }

    /// Get the secret key
    pub fn secret_key(&self) -> &str {
        &self.secret_key
    }

    /// Value of the `authorization` header
    pub fn authorization_value(&self) -> String {
        format!("LOW {}:{}", self.access_key, self.secret_key)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// Factory methods for loading credentials
pub struct CredentialsProvider;

impl CredentialsProvider {
    /// Load credentials from `IA_ACCESS_KEY` and `IA_SECRET_KEY`
    pub fn from_env() -> Result<Credentials, CredentialsError> {
        let access_key = std::env::var(ACCESS_KEY_ENV).map_err(|_| {
            CredentialsError::MissingCredentials(format!("{} not set", ACCESS_KEY_ENV))
        })?;

        let secret_key = std::env::var(SECRET_KEY_ENV).map_err(|_| {
            CredentialsError::MissingCredentials(format!("{} not set", SECRET_KEY_ENV))
        })?;

        Self::validated(access_key, secret_key)
    }

    /// Load credentials from the configuration block
    pub fn from_config(config: &CredentialsConfig) -> Result<Credentials, CredentialsError> {
        Self::validated(config.access_key.clone(), config.secret_key.clone())
    }

    /// Configuration first, then the environment
    pub fn resolve(config: Option<&CredentialsConfig>) -> Result<Credentials, CredentialsError> {
        match config {
            Some(config) => Self::from_config(config),
            None => Self::from_env(),
        }
    }

    fn validated(access_key: String, secret_key: String) -> Result<Credentials, CredentialsError> {
        let access_key = access_key.trim().to_string();
        let secret_key = secret_key.trim().to_string();

        if access_key.is_empty() || secret_key.is_empty() {
            return Err(CredentialsError::InvalidCredentials(
                "access key and secret key must not be empty".into(),
            ));
        }
        if access_key.contains(':') {
            return Err(CredentialsError::InvalidCredentials(
                "access key must not contain ':'".into(),
            ));
        }

        Ok(Credentials::new(access_key, secret_key))
    }
}
