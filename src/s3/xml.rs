//! XML bodies of the S3-style multipart API

use super::{CompletedPart, S3ClientError};
use serde::{Deserialize, Serialize};

/// `POST {bucket}/{key}?uploads` response
#[derive(Debug, Deserialize)]
pub(crate) struct InitiateMultipartUploadResult {
    #[serde(rename = "UploadId")]
    pub upload_id: String,
}

/// `GET {bucket}/?uploads` response
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ListMultipartUploadsResult {
    #[serde(rename = "IsTruncated", default)]
    pub is_truncated: Option<bool>,
    #[serde(rename = "NextKeyMarker", default)]
    pub next_key_marker: Option<String>,
    #[serde(rename = "NextUploadIdMarker", default)]
    pub next_upload_id_marker: Option<String>,
    #[serde(rename = "Upload", default)]
    pub uploads: Vec<UploadXml>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UploadXml {
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "UploadId")]
    pub upload_id: String,
    #[serde(rename = "Initiated", default)]
    pub initiated: Option<String>,
}

/// `GET {bucket}/{key}?uploadId=` response
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ListPartsResult {
    #[serde(rename = "IsTruncated", default)]
    pub is_truncated: Option<bool>,
    #[serde(rename = "NextPartNumberMarker", default)]
    pub next_part_number_marker: Option<String>,
    #[serde(rename = "Part", default)]
    pub parts: Vec<PartXml>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PartXml {
    #[serde(rename = "PartNumber")]
    pub part_number: u32,
    #[serde(rename = "ETag")]
    pub etag: String,
    #[serde(rename = "Size", default)]
    pub size: Option<u64>,
}

/// `POST {bucket}/{key}?uploadId=` response
#[derive(Debug, Deserialize)]
pub(crate) struct CompleteMultipartUploadResult {
    #[serde(rename = "ETag", default)]
    pub etag: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename = "CompleteMultipartUpload")]
struct CompleteMultipartUpload<'a> {
    #[serde(rename = "Part")]
    parts: Vec<CompletedPartXml<'a>>,
}

#[derive(Debug, Serialize)]
struct CompletedPartXml<'a> {
    #[serde(rename = "PartNumber")]
    part_number: u32,
    #[serde(rename = "ETag")]
    etag: &'a str,
}

/// Parse an XML response body
pub(crate) fn parse<T: for<'de> Deserialize<'de>>(body: &str) -> Result<T, S3ClientError> {
    quick_xml::de::from_str(body).map_err(|e| S3ClientError::XmlError(e.to_string()))
}

/// Render the completion manifest. Parts must already be ordered.
pub(crate) fn complete_manifest(parts: &[CompletedPart]) -> Result<String, S3ClientError> {
    let manifest = CompleteMultipartUpload {
        parts: parts
            .iter()
            .map(|part| CompletedPartXml {
                part_number: part.part_number,
                etag: &part.etag,
            })
            .collect(),
    };

    quick_xml::se::to_string(&manifest).map_err(|e| S3ClientError::XmlError(e.to_string()))
}

/// Treat empty marker elements as absent
pub(crate) fn non_empty(marker: Option<String>) -> Option<String> {
    marker.filter(|m| !m.trim().is_empty())
}
