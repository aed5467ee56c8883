//! Migration ledger.
//!
//! SQLite-backed record of every asset confirmed present on the destination.
//! A row here is the only thing that makes a later run skip an asset:
//! - Worklist filtering loads all migrated IDs once for O(1) membership tests
//! - Each confirmed upload (fresh or duplicate) is committed before the next
//!   item starts, so a crash never loses an acknowledged upload
//! - Run history and aggregate stats back the `stats` command

pub mod db;
pub mod error;
pub mod schema;
pub mod types;

pub use db::{Ledger, SqliteLedger};
pub use error::LedgerError;
pub use types::{MediaType, MigrationRecord, RunStats};
