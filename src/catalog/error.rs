use thiserror::Error;

/// Failure to enumerate the source library. Fatal to a run.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to launch {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("Catalog query exited with status {code:?}: {stderr}")]
    ExitStatus { code: Option<i32>, stderr: String },

    #[error("Unreadable catalog output: {0}")]
    Parse(String),
}

/// Failure to fetch one remote original. Only ever fails the current item.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Failed to launch {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("Export exited with status {code:?}: {stderr}")]
    ExitStatus { code: Option<i32>, stderr: String },

    #[error("Export succeeded but produced no file")]
    NoOutput,

    #[error("Disk error: {0}")]
    Disk(#[from] std::io::Error),
}
