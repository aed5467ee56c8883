//! Source catalog: what can be migrated, and how to pull it out.
//!
//! The pipeline only sees two capabilities: [`Catalog`] enumerates every
//! candidate once per run, and [`RemoteFetcher`] materializes a single
//! iCloud-only original into a directory. Both are implemented on top of the
//! `osxphotos` CLI in [`osxphotos`]; tests substitute in-memory fakes.

pub mod error;
pub mod osxphotos;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use error::{CatalogError, FetchError};
pub use osxphotos::{OsxPhotosCatalog, OsxPhotosFetcher};

/// One media item in the source library.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Stable library identifier (Photos UUID).
    pub id: String,
    /// Original filename, or `unknown_<id>` when the library has none.
    pub filename: String,
    /// Path of the original inside the library, when it has been downloaded.
    pub path: Option<PathBuf>,
    /// Declared size of the original.
    pub size: Option<u64>,
    pub created_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
    pub is_photo: bool,
}

impl Candidate {
    /// The on-disk original, if the catalog reports one and it currently exists.
    pub fn local_path(&self) -> Option<&Path> {
        self.path.as_deref().filter(|p| p.exists())
    }

    pub fn is_local(&self) -> bool {
        self.local_path().is_some()
    }

    /// Declared size, treating a reported size of zero as unknown.
    pub fn declared_size(&self) -> Option<u64> {
        self.size.filter(|&s| s > 0)
    }
}

/// Enumerates the full candidate set.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn candidates(&self) -> Result<Vec<Candidate>, CatalogError>;
}

/// Downloads one original that is not available locally.
///
/// Implementations write the file somewhere under `dest_dir` and return its
/// path. Timeouts are applied by the caller; dropping the future must abandon
/// the fetch.
#[async_trait]
pub trait RemoteFetcher: Send + Sync {
    async fn fetch(&self, source_id: &str, dest_dir: &Path) -> Result<PathBuf, FetchError>;
}

#[cfg(test)]
pub(crate) mod fake {
    //! In-memory catalog and fetcher used by pipeline and export tests.

    use std::collections::HashSet;
    use std::sync::Mutex;

    use super::*;

    pub(crate) struct FakeCatalog {
        pub candidates: Vec<Candidate>,
    }

    #[async_trait]
    impl Catalog for FakeCatalog {
        async fn candidates(&self) -> Result<Vec<Candidate>, CatalogError> {
            Ok(self.candidates.clone())
        }
    }

    pub(crate) struct BrokenCatalog;

    #[async_trait]
    impl Catalog for BrokenCatalog {
        async fn candidates(&self) -> Result<Vec<Candidate>, CatalogError> {
            Err(CatalogError::Parse("library is locked".to_string()))
        }
    }

    /// Writes `<id>.bin` into the destination unless the ID is listed in
    /// `fail_ids`; `hang_ids` never complete.
    #[derive(Default)]
    pub(crate) struct FakeFetcher {
        pub fail_ids: HashSet<String>,
        pub hang_ids: HashSet<String>,
        pub calls: Mutex<Vec<String>>,
    }

    impl FakeFetcher {
        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl RemoteFetcher for FakeFetcher {
        async fn fetch(&self, source_id: &str, dest_dir: &Path) -> Result<PathBuf, FetchError> {
            self.calls.lock().unwrap().push(source_id.to_string());
            if self.hang_ids.contains(source_id) {
                std::future::pending::<()>().await;
            }
            if self.fail_ids.contains(source_id) {
                return Err(FetchError::ExitStatus {
                    code: Some(1),
                    stderr: "asset unavailable".to_string(),
                });
            }
            let path = dest_dir.join(format!("{}.bin", source_id));
            std::fs::write(&path, b"fetched from icloud")?;
            Ok(path)
        }
    }

    pub(crate) fn remote(id: &str, filename: &str, size: Option<u64>, is_photo: bool) -> Candidate {
        Candidate {
            id: id.to_string(),
            filename: filename.to_string(),
            path: None,
            size,
            created_at: None,
            modified_at: None,
            is_photo,
        }
    }

    pub(crate) fn local(id: &str, path: &Path, size: Option<u64>) -> Candidate {
        Candidate {
            id: id.to_string(),
            filename: path
                .file_name()
                .and_then(|f| f.to_str())
                .unwrap_or("file.jpg")
                .to_string(),
            path: Some(path.to_path_buf()),
            size,
            created_at: None,
            modified_at: None,
            is_photo: true,
        }
    }
}
