use std::path::PathBuf;

use thiserror::Error;

use crate::catalog::CatalogError;
use crate::ledger::LedgerError;

/// Conditions that stop a run. Per-item failures are counted, not raised.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Destination is unreachable or rejected the API key")]
    DestinationUnreachable,

    #[error("Could not read the photo library: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Could not create staging directory {path}: {source}")]
    Staging {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
}
