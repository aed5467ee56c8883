use std::path::PathBuf;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;

/// One staged file to hand to the destination.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Source library ID, sent as `deviceAssetId`.
    pub source_id: String,
    pub path: PathBuf,
    pub filename: String,
    pub created_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
}

/// Result of a single upload attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Created { asset_id: Option<String> },
    /// The destination already holds this asset. Counts as migrated.
    Duplicate { asset_id: Option<String> },
    Failed { detail: String },
}

impl UploadOutcome {
    /// Asset ID assigned by the destination, for either successful outcome.
    pub fn asset_id(&self) -> Option<&str> {
        match self {
            Self::Created { asset_id } | Self::Duplicate { asset_id } => asset_id.as_deref(),
            Self::Failed { .. } => None,
        }
    }
}

/// Body of `POST /api/assets`.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct AssetUploadResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub duplicate: Option<bool>,
}

impl AssetUploadResponse {
    pub fn is_duplicate(&self) -> bool {
        self.duplicate == Some(true) || self.status.as_deref() == Some("duplicate")
    }
}

/// Immich's timestamp format: UTC with millisecond precision and a `Z` suffix.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}
