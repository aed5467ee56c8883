//! Ledger trait and SQLite implementation.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{Connection, OptionalExtension};

use super::error::LedgerError;
use super::schema;
use super::types::{LedgerStats, MediaType, MigrationRecord, RunStats, RunSummary};

/// Trait for migration ledger operations.
///
/// Object-safe so the pipeline can hold an `Arc<dyn Ledger>`.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Whether a record exists for this source identifier.
    async fn is_migrated(&self, source_id: &str) -> Result<bool, LedgerError>;

    /// All migrated source identifiers.
    ///
    /// Loaded once per run so worklist filtering is a set lookup per candidate.
    async fn migrated_ids(&self) -> Result<HashSet<String>, LedgerError>;

    /// Insert or replace the record for `record.source_id`.
    ///
    /// The row is committed before this returns.
    async fn record(&self, record: &MigrationRecord) -> Result<(), LedgerError>;

    /// Aggregate counts, sizes and the most recent run.
    async fn stats(&self) -> Result<LedgerStats, LedgerError>;

    /// The `limit` most recently migrated records, newest first.
    async fn recent(&self, limit: usize) -> Result<Vec<MigrationRecord>, LedgerError>;

    /// Start a new run and return its ID.
    async fn start_run(&self) -> Result<i64, LedgerError>;

    /// Complete a run with its final counters.
    async fn complete_run(&self, run_id: i64, stats: &RunStats) -> Result<(), LedgerError>;
}

/// SQLite implementation of the ledger.
pub struct SqliteLedger {
    /// Wrapped in Mutex because rusqlite::Connection is not Sync.
    conn: Mutex<Connection>,
    /// Path to the database file (for error messages).
    path: PathBuf,
}

impl std::fmt::Debug for SqliteLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteLedger")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SqliteLedger {
    /// Open or create a ledger at the given path.
    pub async fn open(path: &Path) -> Result<Self, LedgerError> {
        let path = path.to_path_buf();
        let path_clone = path.clone();

        let conn = tokio::task::spawn_blocking(move || {
            let conn = Connection::open(&path_clone).map_err(|e| LedgerError::Open {
                path: path_clone.clone(),
                source: e,
            })?;

            conn.pragma_update(None, "journal_mode", "WAL")
                .map_err(LedgerError::Migration)?;

            // FULL syncs the WAL on every commit: a record must survive a
            // crash immediately after the upload it describes.
            conn.pragma_update(None, "synchronous", "FULL")
                .map_err(LedgerError::Migration)?;

            schema::migrate(&conn)?;

            Ok::<_, LedgerError>(conn)
        })
        .await??;

        tracing::debug!(path = %path.display(), "Ledger opened");

        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    /// Open an in-memory ledger (for testing).
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, LedgerError> {
        let conn = Connection::open_in_memory().map_err(|e| LedgerError::Open {
            path: PathBuf::from(":memory:"),
            source: e,
        })?;
        schema::migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: PathBuf::from(":memory:"),
        })
    }

    /// Get the path to the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, LedgerError> {
        self.conn
            .lock()
            .map_err(|e| LedgerError::Query(e.to_string()))
    }
}

#[async_trait]
impl Ledger for SqliteLedger {
    async fn is_migrated(&self, source_id: &str) -> Result<bool, LedgerError> {
        let conn = self.conn()?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM migrated_assets WHERE source_id = ?1",
                [source_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(LedgerError::query)?;
        Ok(found.is_some())
    }

    async fn migrated_ids(&self) -> Result<HashSet<String>, LedgerError> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare_cached("SELECT source_id FROM migrated_assets")
            .map_err(LedgerError::query)?;

        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(LedgerError::query)?
            .collect::<Result<HashSet<_>, _>>()
            .map_err(LedgerError::query)?;

        Ok(ids)
    }

    async fn record(&self, record: &MigrationRecord) -> Result<(), LedgerError> {
        let conn = self.conn()?;

        conn.execute(
            r#"
            INSERT INTO migrated_assets (source_id, dest_id, filename, size_bytes, media_type, migrated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(source_id) DO UPDATE SET
                dest_id = excluded.dest_id,
                filename = excluded.filename,
                size_bytes = excluded.size_bytes,
                media_type = excluded.media_type,
                migrated_at = excluded.migrated_at
            "#,
            rusqlite::params![
                &record.source_id,
                record.dest_id.as_deref(),
                &record.filename,
                record.size_bytes as i64,
                record.media_type.as_str(),
                record.migrated_at.timestamp_millis(),
            ],
        )
        .map_err(LedgerError::query)?;

        Ok(())
    }

    async fn stats(&self) -> Result<LedgerStats, LedgerError> {
        let conn = self.conn()?;

        let (total, photos, videos, total_size, last_ms): (i64, i64, i64, i64, Option<i64>) = conn
            .query_row(
                r#"
                SELECT
                    COUNT(*),
                    COALESCE(SUM(CASE WHEN media_type = 'photo' THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN media_type = 'video' THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(size_bytes), 0),
                    MAX(migrated_at)
                FROM migrated_assets
                "#,
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
            )
            .map_err(LedgerError::query)?;

        let last_run = conn
            .query_row(
                "SELECT started_at, completed_at, exported, uploaded, duplicates, failed, batches, interrupted FROM runs ORDER BY id DESC LIMIT 1",
                [],
                |row| {
                    let started_at: i64 = row.get(0)?;
                    let completed_at: Option<i64> = row.get(1)?;
                    Ok(RunSummary {
                        started_at: millis_to_datetime(started_at),
                        completed_at: completed_at.map(millis_to_datetime),
                        stats: RunStats {
                            exported: row.get::<_, i64>(2)? as u64,
                            uploaded: row.get::<_, i64>(3)? as u64,
                            duplicates: row.get::<_, i64>(4)? as u64,
                            failed: row.get::<_, i64>(5)? as u64,
                            skipped: 0,
                            batches: row.get::<_, i64>(6)? as u64,
                            interrupted: row.get::<_, i64>(7)? != 0,
                        },
                    })
                },
            )
            .optional()
            .map_err(LedgerError::query)?;

        Ok(LedgerStats {
            total: total as u64,
            photos: photos as u64,
            videos: videos as u64,
            total_size_bytes: total_size as u64,
            last_migrated_at: last_ms.map(millis_to_datetime),
            last_run,
        })
    }

    async fn recent(&self, limit: usize) -> Result<Vec<MigrationRecord>, LedgerError> {
        let conn = self.conn()?;

        // rowid breaks ties between records written in the same millisecond.
        let mut stmt = conn
            .prepare_cached(
                "SELECT source_id, dest_id, filename, size_bytes, media_type, migrated_at FROM migrated_assets ORDER BY migrated_at DESC, rowid DESC LIMIT ?1",
            )
            .map_err(LedgerError::query)?;

        let records = stmt
            .query_map([limit as i64], row_to_record)
            .map_err(LedgerError::query)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(LedgerError::query)?;

        Ok(records)
    }

    async fn start_run(&self) -> Result<i64, LedgerError> {
        let started_at = Utc::now().timestamp_millis();
        let conn = self.conn()?;

        conn.execute("INSERT INTO runs (started_at) VALUES (?1)", [started_at])
            .map_err(LedgerError::query)?;

        Ok(conn.last_insert_rowid())
    }

    async fn complete_run(&self, run_id: i64, stats: &RunStats) -> Result<(), LedgerError> {
        let completed_at = Utc::now().timestamp_millis();
        let conn = self.conn()?;

        conn.execute(
            "UPDATE runs SET completed_at = ?1, exported = ?2, uploaded = ?3, duplicates = ?4, failed = ?5, batches = ?6, interrupted = ?7 WHERE id = ?8",
            rusqlite::params![
                completed_at,
                stats.exported as i64,
                stats.uploaded as i64,
                stats.duplicates as i64,
                stats.failed as i64,
                stats.batches as i64,
                i64::from(stats.interrupted),
                run_id,
            ],
        )
        .map_err(LedgerError::query)?;

        Ok(())
    }
}

fn millis_to_datetime(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .unwrap_or(DateTime::UNIX_EPOCH)
}

/// Convert a database row to a MigrationRecord.
fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<MigrationRecord> {
    let media_type_str: String = row.get(4)?;
    Ok(MigrationRecord {
        source_id: row.get(0)?,
        dest_id: row.get(1)?,
        filename: row.get(2)?,
        size_bytes: row.get::<_, i64>(3)? as u64,
        media_type: MediaType::from_str(&media_type_str).unwrap_or(MediaType::Photo),
        migrated_at: millis_to_datetime(row.get(5)?),
    })
}
