//! Archive Uploadr - resumable multipart uploads to the Internet Archive
//!
//! Command-line front end over [`archive_uploadr::ArchiveClient`].

use anyhow::{anyhow, bail, Context};
use archive_uploadr::item::DeleteRequest;
use archive_uploadr::upload::{UploadOutcome, UploadRequest, UploadStatus};
use archive_uploadr::{metrics, ArchiveClient, Config};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Archive Uploadr - upload files and metadata to Internet Archive items
#[derive(Parser, Debug)]
#[command(name = "archive-uploadr")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (defaults apply when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json: bool,

    /// Print Prometheus metrics after the command finishes
    #[arg(long)]
    print_metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a file, or write item metadata when no file is given
    Put {
        bucket: String,
        file: Option<PathBuf>,
        /// Remote filename (defaults to the local file name)
        #[arg(long)]
        remote_name: Option<String>,
        /// Metadata as key=value; repeat for multiple values
        #[arg(long = "meta", value_parser = parse_key_value)]
        metadata: Vec<(String, String)>,
        #[arg(long)]
        create_bucket: bool,
        #[arg(long)]
        no_derive: bool,
        #[arg(long)]
        keep_old_version: bool,
        #[arg(long)]
        delete_existing_metadata: bool,
        /// Part size in bytes
        #[arg(long)]
        part_size: Option<u64>,
        /// Multipart threshold in bytes; 0 forces multipart
        #[arg(long)]
        threshold: Option<u64>,
        /// Concurrent part uploads
        #[arg(long)]
        workers: Option<usize>,
        /// Cancel the upload after this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
    /// Abort in-progress multipart uploads
    Abort {
        bucket: String,
        remote_name: Option<String>,
    },
    /// List in-progress multipart uploads
    Uploads {
        bucket: String,
        remote_name: Option<String>,
    },
    /// Delete an item or one of its files
    Delete {
        bucket: String,
        remote_name: Option<String>,
        /// Also delete derived files
        #[arg(long)]
        cascade: bool,
        #[arg(long)]
        keep_old_version: bool,
    },
    /// Show task-queue rationing state
    Limits { bucket: Option<String> },
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected key=value, got '{}'", s)),
    }
}

fn init_logging(level: &str, json: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .context("invalid log level")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    if json {
        builder
            .json()
            .try_init()
            .map_err(|e| anyhow!("failed to install subscriber: {}", e))?;
    } else {
        builder
            .try_init()
            .map_err(|e| anyhow!("failed to install subscriber: {}", e))?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level, args.json)?;

    info!("Starting Archive Uploadr v{}", archive_uploadr::VERSION);

    let config = match args.config {
        Some(ref path) => {
            let config = Config::load(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            info!("Loaded configuration from {:?}", path);
            config
        }
        None => Config::default(),
    };

    let client = ArchiveClient::new(config)?;
    let result = run(&client, args.command).await;

    if args.print_metrics {
        print!("{}", metrics::gather());
    }
    result
}

async fn run(client: &ArchiveClient, command: Command) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();

    match command {
        Command::Put {
            bucket,
            file,
            remote_name,
            metadata,
            create_bucket,
            no_derive,
            keep_old_version,
            delete_existing_metadata,
            part_size,
            threshold,
            workers,
            timeout_secs,
        } => {
            let mut request = UploadRequest::new(bucket)
                .create_bucket(create_bucket)
                .no_derive(no_derive)
                .keep_old_version(keep_old_version)
                .delete_existing_metadata(delete_existing_metadata)
                .on_progress(|status: &UploadStatus| match status.part_number {
                    Some(part) => info!(
                        part = part,
                        total_parts = status.total_parts.unwrap_or_default(),
                        "Part {:.0}% done",
                        status.percent()
                    ),
                    None => tracing::debug!("{:.1}% uploaded", status.percent()),
                });
            request.source = file.map(archive_uploadr::upload::UploadSource::File);
            request.remote_filename = remote_name;
            request.metadata = metadata;
            request.part_size = part_size;
            request.multipart_threshold = threshold;
            request.concurrent_parts = workers;

            if let Some(secs) = timeout_secs {
                let timer = cancel.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_secs(secs)).await;
                    timer.cancel();
                });
            }

            let ctrl_c = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    ctrl_c.cancel();
                }
            });

            match client.put_with_cancel(request, &cancel).await? {
                UploadOutcome::Completed(result) => {
                    println!(
                        "uploaded {} bytes to {}/{} etag={}",
                        result.bytes_written,
                        result.bucket,
                        result.key.as_deref().unwrap_or(""),
                        result.etag.as_deref().unwrap_or("-")
                    );
                    Ok(())
                }
                UploadOutcome::Incomplete(open) => {
                    bail!(
                        "upload {} left open with {}/{} parts stored; re-run to resume or abort it",
                        open.upload_id,
                        open.uploaded_parts.len(),
                        open.total_parts
                    )
                }
            }
        }
        Command::Abort {
            bucket,
            remote_name,
        } => {
            let aborted = client
                .abort_uploads(&bucket, remote_name.as_deref(), &cancel)
                .await?;
            println!("aborted {} upload(s)", aborted);
            Ok(())
        }
        Command::Uploads {
            bucket,
            remote_name,
        } => {
            let uploads = client
                .list_uploads(&bucket, remote_name.as_deref(), &cancel)
                .await?;
            for upload in uploads {
                println!(
                    "{}\t{}\t{}",
                    upload.key,
                    upload.upload_id,
                    upload.initiated.as_deref().unwrap_or("-")
                );
            }
            Ok(())
        }
        Command::Delete {
            bucket,
            remote_name,
            cascade,
            keep_old_version,
        } => {
            let mut request = DeleteRequest::new(bucket)
                .cascade_delete(cascade)
                .keep_old_version(keep_old_version);
            request.remote_filename = remote_name;
            client.delete(&request, &cancel).await?;
            println!("deleted");
            Ok(())
        }
        Command::Limits { bucket } => {
            let limits = client.use_limit(bucket.as_deref(), &cancel).await?;
            println!("{}", serde_json::to_string_pretty(&limits)?);
            Ok(())
        }
    }
}
