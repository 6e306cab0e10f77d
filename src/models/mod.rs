use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Reference to a file written by the storage backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StoredFile {
    /// Path relative to the storage root, e.g. `reports/blood-reports/report.pdf`
    pub key: String,
    /// Public URL: the retrieval route locally, the blob URL once mirrored
    pub url: String,
    pub filename: String,
    pub content_type: String,
    pub size: u64,
    /// Hex SHA-256 of the stored bytes
    pub hash: String,
    pub uploaded_at: DateTime<Utc>,
}

/// Which upload pipeline a file goes through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UploadKind {
    Report,
    Media,
}

impl UploadKind {
    /// Top-level subfolder under the storage root
    pub fn namespace(&self) -> &'static str {
        match self {
            UploadKind::Report => "reports",
            UploadKind::Media => "media",
        }
    }

    pub fn default_folder(&self) -> &'static str {
        match self {
            UploadKind::Report => "blood-reports",
            UploadKind::Media => "general",
        }
    }

    pub fn required_capability(&self) -> &'static str {
        crate::utils::auth::capabilities::DONOR_UPDATE
    }
}

/// Raw multipart submission, alive for one request
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub data: Bytes,
    pub filename: String,
    pub content_type: String,
    pub folder: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UploadResponse {
    pub success: bool,
    pub data: StoredFile,
}
