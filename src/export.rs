//! Export stage: materialize one candidate's original in the staging area.
//!
//! Locally available originals are copied. Everything else goes through the
//! [`RemoteFetcher`] into a per-item scratch directory, bounded by a timeout.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::catalog::{Candidate, FetchError, RemoteFetcher};

/// Default bound on a single remote fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Failed to copy {from} into staging: {source}")]
    Copy {
        from: PathBuf,
        source: std::io::Error,
    },

    #[error("Remote fetch failed: {0}")]
    Fetch(FetchError),

    #[error("Remote fetch timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("Remote fetch produced no file")]
    NoOutput,
}

impl From<FetchError> for ExportError {
    fn from(e: FetchError) -> Self {
        match e {
            FetchError::NoOutput => Self::NoOutput,
            other => Self::Fetch(other),
        }
    }
}

/// Name prefix of the per-item scratch directories created for iCloud fetches.
pub const SCRATCH_DIR_PREFIX: &str = "fetch-";

/// Which path produced an exported file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportPath {
    Local,
    Remote,
}

/// An original sitting in the staging area.
#[derive(Debug)]
pub struct ExportedFile {
    pub path: PathBuf,
    pub source: ExportPath,
    scratch_dir: Option<PathBuf>,
}

impl ExportedFile {
    /// Delete the staged file and any scratch directory holding it.
    pub async fn remove(self) -> std::io::Result<()> {
        match self.scratch_dir {
            Some(dir) => tokio::fs::remove_dir_all(dir).await,
            None => tokio::fs::remove_file(self.path).await,
        }
    }
}

/// Strip characters that are unsafe in a filename.
///
/// An empty result falls back to `fallback`.
pub fn sanitize_filename(filename: &str, fallback: &str) -> String {
    let cleaned: String = filename
        .chars()
        .filter(|c| !matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0'))
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        fallback.to_string()
    } else {
        cleaned.to_string()
    }
}

pub struct Exporter {
    fetcher: Arc<dyn RemoteFetcher>,
    fetch_timeout: Duration,
}

impl Exporter {
    pub fn new(fetcher: Arc<dyn RemoteFetcher>, fetch_timeout: Duration) -> Self {
        Self {
            fetcher,
            fetch_timeout,
        }
    }

    /// Export `candidate` into `staging_dir`.
    ///
    /// Failures only ever concern this candidate; nothing is retried.
    pub async fn export(
        &self,
        candidate: &Candidate,
        staging_dir: &Path,
    ) -> Result<ExportedFile, ExportError> {
        match candidate.local_path() {
            Some(local) => self.copy_local(candidate, local, staging_dir).await,
            None => self.fetch_remote(candidate, staging_dir).await,
        }
    }

    async fn copy_local(
        &self,
        candidate: &Candidate,
        local: &Path,
        staging_dir: &Path,
    ) -> Result<ExportedFile, ExportError> {
        let name = sanitize_filename(&candidate.filename, &candidate.id);
        let dest = staging_dir.join(name);
        tracing::debug!(id = %candidate.id, from = %local.display(), "Copying local original");
        tokio::fs::copy(local, &dest)
            .await
            .map_err(|e| ExportError::Copy {
                from: local.to_path_buf(),
                source: e,
            })?;
        Ok(ExportedFile {
            path: dest,
            source: ExportPath::Local,
            scratch_dir: None,
        })
    }

    async fn fetch_remote(
        &self,
        candidate: &Candidate,
        staging_dir: &Path,
    ) -> Result<ExportedFile, ExportError> {
        let scratch = staging_dir.join(format!(
            "{}{}",
            SCRATCH_DIR_PREFIX,
            sanitize_filename(&candidate.id, "item")
        ));
        tokio::fs::create_dir_all(&scratch)
            .await
            .map_err(|e| ExportError::Fetch(FetchError::Disk(e)))?;

        tracing::debug!(id = %candidate.id, "Fetching original from iCloud");
        let result =
            tokio::time::timeout(self.fetch_timeout, self.fetcher.fetch(&candidate.id, &scratch))
                .await;

        let err = match result {
            Ok(Ok(path)) => {
                return Ok(ExportedFile {
                    path,
                    source: ExportPath::Remote,
                    scratch_dir: Some(scratch),
                })
            }
            Ok(Err(e)) => ExportError::from(e),
            Err(_) => ExportError::Timeout(self.fetch_timeout),
        };

        if let Err(e) = tokio::fs::remove_dir_all(&scratch).await {
            tracing::warn!(path = %scratch.display(), error = %e, "Could not remove scratch directory");
        }
        Err(err)
    }
}
