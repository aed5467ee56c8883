//! Error types for the migration ledger.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during ledger operations.
///
/// Every variant is fatal to a run: dropping a record after a confirmed
/// upload would misreport what is already on the destination.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Failed to open or create the database file.
    #[error("Failed to open ledger at {path}: {source}")]
    Open {
        path: PathBuf,
        source: rusqlite::Error,
    },

    /// Failed to apply the schema or a pragma.
    #[error("Ledger migration failed: {0}")]
    Migration(#[from] rusqlite::Error),

    /// A query failed.
    #[error("Ledger query failed: {0}")]
    Query(String),

    /// Failed to spawn a blocking task.
    #[error("Failed to spawn blocking task: {0}")]
    Spawn(#[from] tokio::task::JoinError),

    /// The database schema version is newer than supported.
    #[error("Ledger schema version {found} is newer than supported version {expected}")]
    UnsupportedSchemaVersion { found: i32, expected: i32 },
}

impl LedgerError {
    /// Create a Query error from a rusqlite error.
    pub fn query(source: rusqlite::Error) -> Self {
        Self::Query(source.to_string())
    }
}
