//! Metrics module
//!
//! Prometheus metrics for uploads, parts and HTTP retries. Metrics live in
//! the default registry; [`gather`] renders them in the text format.

use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_histogram, register_histogram_vec, Counter,
    CounterVec, Encoder, Histogram, HistogramVec, TextEncoder,
};

lazy_static! {
    // Upload metrics
    pub static ref UPLOADS_TOTAL: CounterVec = register_counter_vec!(
        "archive_uploadr_uploads_total",
        "Total number of uploads",
        &["bucket", "mode", "status"]
    ).unwrap();

    pub static ref UPLOAD_BYTES_TOTAL: Counter = register_counter!(
        "archive_uploadr_upload_bytes_total",
        "Total bytes uploaded"
    ).unwrap();

    pub static ref UPLOAD_DURATION: HistogramVec = register_histogram_vec!(
        "archive_uploadr_upload_duration_seconds",
        "Upload duration in seconds",
        &["bucket", "mode"],
        vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0, 1800.0]
    ).unwrap();

    // Part metrics
    pub static ref PARTS_TOTAL: CounterVec = register_counter_vec!(
        "archive_uploadr_parts_total",
        "Multipart parts by outcome",
        &["status"]  // "uploaded", "resumed", "skipped" or "failed"
    ).unwrap();

    pub static ref PART_BYTES_TOTAL: Counter = register_counter!(
        "archive_uploadr_part_bytes_total",
        "Bytes sent in multipart parts"
    ).unwrap();

    // Multipart metrics
    pub static ref MULTIPART_UPLOADS: CounterVec = register_counter_vec!(
        "archive_uploadr_multipart_uploads_total",
        "Total multipart uploads",
        &["bucket", "status"]
    ).unwrap();

    pub static ref MULTIPART_PARTS: Histogram = register_histogram!(
        "archive_uploadr_multipart_parts",
        "Number of parts per completed multipart upload",
        vec![1.0, 5.0, 10.0, 50.0, 100.0, 500.0, 1000.0, 10000.0]
    ).unwrap();

    // Transport metrics
    pub static ref HTTP_RETRIES: CounterVec = register_counter_vec!(
        "archive_uploadr_http_retries_total",
        "HTTP requests retried, by status or transport failure",
        &["status"]
    ).unwrap();

    // Error metrics
    pub static ref ERRORS_TOTAL: CounterVec = register_counter_vec!(
        "archive_uploadr_errors_total",
        "Total errors",
        &["type"]
    ).unwrap();
}

/// Record a successful upload
pub fn record_upload_success(bucket: &str, mode: &str, bytes: u64) {
    UPLOADS_TOTAL
        .with_label_values(&[bucket, mode, "success"])
        .inc();
    UPLOAD_BYTES_TOTAL.inc_by(bytes as f64);
}

/// Record a failed or cancelled upload
pub fn record_upload_failure(bucket: &str, mode: &str, status: &str) {
    UPLOADS_TOTAL.with_label_values(&[bucket, mode, status]).inc();
}

/// Record upload duration
pub fn record_upload_duration(bucket: &str, mode: &str, duration_secs: f64) {
    UPLOAD_DURATION
        .with_label_values(&[bucket, mode])
        .observe(duration_secs);
}

/// Record one part outcome. `bytes` is what went over the wire.
pub fn record_part(status: &str, bytes: u64) {
    PARTS_TOTAL.with_label_values(&[status]).inc();
    if bytes > 0 {
        PART_BYTES_TOTAL.inc_by(bytes as f64);
    }
}

/// Record the end of a multipart upload
///
/// # Arguments
/// * `status` - "completed", "incomplete", "failed" or "cancelled"
/// * `parts_count` - Parts in the completion manifest, when completed
pub fn record_multipart_upload(bucket: &str, status: &str, parts_count: Option<usize>) {
    MULTIPART_UPLOADS.with_label_values(&[bucket, status]).inc();
    if let Some(parts) = parts_count {
        MULTIPART_PARTS.observe(parts as f64);
    }
}

/// Record an HTTP retry
pub fn record_http_retry(reason: &str) {
    HTTP_RETRIES.with_label_values(&[reason]).inc();
}

/// Record an error
pub fn record_error(error_type: &str) {
    ERRORS_TOTAL.with_label_values(&[error_type]).inc();
}

/// Render all registered metrics in the Prometheus text format
pub fn gather() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
