//! Ledger schema definitions and migrations.

use rusqlite::Connection;

use super::error::LedgerError;

/// Current schema version. Increment when making schema changes.
pub const SCHEMA_VERSION: i32 = 1;

/// Schema DDL for version 1.
const SCHEMA_V1: &str = r#"
CREATE TABLE IF NOT EXISTS migrated_assets (
    source_id TEXT PRIMARY KEY,
    dest_id TEXT,
    filename TEXT NOT NULL,
    size_bytes INTEGER NOT NULL,
    media_type TEXT NOT NULL,
    migrated_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_migrated_at ON migrated_assets(migrated_at);
CREATE INDEX IF NOT EXISTS idx_media_type ON migrated_assets(media_type);

CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at INTEGER NOT NULL,
    completed_at INTEGER,
    exported INTEGER DEFAULT 0,
    uploaded INTEGER DEFAULT 0,
    duplicates INTEGER DEFAULT 0,
    failed INTEGER DEFAULT 0,
    batches INTEGER DEFAULT 0,
    interrupted INTEGER DEFAULT 0
);
"#;

/// Get the current schema version from the database.
pub(crate) fn get_schema_version(conn: &Connection) -> Result<i32, LedgerError> {
    let version: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    Ok(version)
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<(), LedgerError> {
    conn.pragma_update(None, "user_version", version)?;
    Ok(())
}

/// Initialize or migrate the database schema.
///
/// Idempotent; safe on both new and existing databases. A database written
/// by a newer build is refused rather than silently reinterpreted.
pub(crate) fn migrate(conn: &Connection) -> Result<(), LedgerError> {
    let current_version = get_schema_version(conn)?;

    if current_version > SCHEMA_VERSION {
        return Err(LedgerError::UnsupportedSchemaVersion {
            found: current_version,
            expected: SCHEMA_VERSION,
        });
    }

    if current_version < SCHEMA_VERSION {
        conn.execute_batch(SCHEMA_V1)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
        tracing::debug!("Initialized ledger schema at version {}", SCHEMA_VERSION);
    }

    Ok(())
}
