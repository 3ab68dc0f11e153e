//! Item-level operations besides uploads
//!
//! Deleting items or files, and the task-queue rationing check.

use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};

/// Delete an item, or one file of it
#[derive(Debug, Clone, Default)]
pub struct DeleteRequest {
    pub bucket: String,
    /// File to delete; the whole item when `None`
    pub remote_filename: Option<String>,
    pub keep_old_version: bool,
    /// Also delete files derived from this one
    pub cascade_delete: bool,
}

impl DeleteRequest {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            ..Default::default()
        }
    }

    pub fn remote_filename(mut self, name: impl Into<String>) -> Self {
        self.remote_filename = Some(name.into());
        self
    }

    pub fn keep_old_version(mut self, enabled: bool) -> Self {
        self.keep_old_version = enabled;
        self
    }

    pub fn cascade_delete(mut self, enabled: bool) -> Self {
        self.cascade_delete = enabled;
        self
    }

    pub(crate) fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if self.keep_old_version {
            headers.insert("x-archive-keep-old-version", HeaderValue::from_static("1"));
        }
        if self.cascade_delete {
            headers.insert("x-archive-cascade-delete", HeaderValue::from_static("1"));
        }
        headers
    }
}

/// Response of the use-limit check
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UseLimitResponse {
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default)]
    pub accesskey: Option<String>,
    /// Non-zero when new tasks would be rationed
    #[serde(default)]
    pub over_limit: Option<i64>,
    #[serde(default)]
    pub detail: Option<UseLimitDetail>,
}

impl UseLimitResponse {
    pub fn is_over_limit(&self) -> bool {
        self.over_limit.unwrap_or(0) != 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UseLimitDetail {
    #[serde(default)]
    pub accesskey_ration: Option<i64>,
    #[serde(default)]
    pub accesskey_tasks_queued: Option<i64>,
    #[serde(default)]
    pub bucket_ration: Option<i64>,
    #[serde(default)]
    pub bucket_tasks_queued: Option<i64>,
    #[serde(default)]
    pub limit_reason: Option<String>,
    #[serde(default)]
    pub rationing_engaged: Option<i64>,
    #[serde(default)]
    pub rationing_level: Option<i64>,
    #[serde(default)]
    pub total_global_limit: Option<i64>,
    #[serde(default)]
    pub total_tasks_queued: Option<i64>,
}
