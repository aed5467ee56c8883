//! Types for the migration ledger.

use std::ops::AddAssign;

use chrono::{DateTime, Utc};

/// Media type stored with each migration record.
///
/// The ledger only ever holds photos and videos; unclassifiable filenames
/// are resolved through the catalog's photo/video flag before recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaType {
    Photo,
    Video,
}

impl MediaType {
    /// Convert to the string stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Photo => "photo",
            Self::Video => "video",
        }
    }

    /// Parse from the string stored in the database.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "photo" => Some(Self::Photo),
            "video" => Some(Self::Video),
            _ => None,
        }
    }
}

/// A confirmed migration of one source asset.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationRecord {
    /// Source catalog identifier (Photos UUID).
    pub source_id: String,
    /// Identifier assigned by the destination, when it reported one.
    pub dest_id: Option<String>,
    /// Original filename.
    pub filename: String,
    /// Size of the uploaded file in bytes.
    pub size_bytes: u64,
    pub media_type: MediaType,
    /// When the upload was confirmed.
    pub migrated_at: DateTime<Utc>,
}

impl MigrationRecord {
    /// Build a record stamped with the current time.
    pub fn new(
        source_id: impl Into<String>,
        dest_id: Option<String>,
        filename: impl Into<String>,
        size_bytes: u64,
        media_type: MediaType,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            dest_id,
            filename: filename.into(),
            size_bytes,
            media_type,
            migrated_at: Utc::now(),
        }
    }
}

/// Counters for one run (or one batch, before aggregation).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Items materialized into the staging directory.
    pub exported: u64,
    /// Items freshly created on the destination.
    pub uploaded: u64,
    /// Items the destination already held.
    pub duplicates: u64,
    /// Items that failed export or upload.
    pub failed: u64,
    /// Items passed over by a dry run.
    pub skipped: u64,
    /// Batches started.
    pub batches: u64,
    /// Whether the run stopped early on a shutdown request.
    pub interrupted: bool,
}

impl AddAssign for RunStats {
    fn add_assign(&mut self, rhs: Self) {
        self.exported += rhs.exported;
        self.uploaded += rhs.uploaded;
        self.duplicates += rhs.duplicates;
        self.failed += rhs.failed;
        self.skipped += rhs.skipped;
        self.batches += rhs.batches;
        self.interrupted |= rhs.interrupted;
    }
}

/// The most recent run as stored in the `runs` table.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub stats: RunStats,
}

/// Aggregate view of the ledger.
#[derive(Debug, Clone, Default)]
pub struct LedgerStats {
    pub total: u64,
    pub photos: u64,
    pub videos: u64,
    pub total_size_bytes: u64,
    /// Time of the newest migration record (if any).
    pub last_migrated_at: Option<DateTime<Utc>>,
    pub last_run: Option<RunSummary>,
}

impl LedgerStats {
    pub fn total_size_gb(&self) -> f64 {
        self.total_size_bytes as f64 / (1024.0 * 1024.0 * 1024.0)
    }
}
