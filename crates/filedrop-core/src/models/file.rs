use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// A stored file as listed by `GET /files`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub id: String,
    pub filename: String,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub upload_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub owner_id: Option<String>,
}

impl FileMetadata {
    /// Size in megabytes with two decimals, e.g. "1.50 MB"
    pub fn display_size(&self) -> String {
        format_megabytes(self.size)
    }

    /// True for content the server can stream inline as video
    pub fn is_video(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| ct.starts_with("video/"))
            .unwrap_or(false)
    }
}

/// Total bytes stored by the user, from `GET /usage`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageUsage {
    pub usage: u64,
}

impl StorageUsage {
    pub fn display(&self) -> String {
        format_megabytes(self.usage)
    }
}

/// Body of a downloaded or viewed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    /// Name from the `Content-Disposition` header, when the server sends one
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

fn format_megabytes(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / BYTES_PER_MB)
}
