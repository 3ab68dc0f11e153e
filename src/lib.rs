//! Archive Uploadr Library
//!
//! Client for the Internet Archive's S3-style API, built around chunked,
//! resumable multipart uploads.
//!
//! # Features
//!
//! - **Single or multipart**: sources at or above a size threshold are split
//!   into parts uploaded concurrently on a bounded worker pool
//! - **Resumable**: parts the server already holds are never re-sent
//! - **Checksummed**: every PUT carries a `Content-MD5`
//! - **Cancellable**: a `CancellationToken` reaches every network call
//! - **Safe modes**: read-only and dry-run clients
//!
//! # Example
//!
//! ```no_run
//! use archive_uploadr::{ArchiveClient, Config};
//! use archive_uploadr::upload::UploadRequest;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let client = ArchiveClient::new(config)?;
//!     client
//!         .put(UploadRequest::new("my-item").file("movie.mp4").create_bucket(true))
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod item;
pub mod metrics;
pub mod s3;
pub mod upload;

// Re-export commonly used types
pub use client::ArchiveClient;
pub use config::Config;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
