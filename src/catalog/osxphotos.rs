//! `osxphotos`-backed catalog and fetcher.
//!
//! Enumeration runs `osxphotos query --json` once and parses the array it
//! prints. Remote originals are pulled with `osxphotos export --uuid <id>
//! --download-missing`, which drives Photos.app to download from iCloud; it
//! is the only reliable way to get at iCloud-only originals.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use tokio::process::Command;

use super::error::{CatalogError, FetchError};
use super::{Candidate, Catalog, RemoteFetcher};

/// Subset of the `osxphotos query --json` record we rely on.
#[derive(Debug, Deserialize)]
struct QueryRecord {
    uuid: String,
    #[serde(default)]
    original_filename: Option<String>,
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    path: Option<PathBuf>,
    #[serde(default)]
    original_filesize: Option<u64>,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    date_modified: Option<String>,
    #[serde(default)]
    isphoto: Option<bool>,
    #[serde(default)]
    ismovie: Option<bool>,
}

impl From<QueryRecord> for Candidate {
    fn from(r: QueryRecord) -> Self {
        let filename = r
            .original_filename
            .or(r.filename)
            .filter(|f| !f.is_empty())
            .unwrap_or_else(|| format!("unknown_{}", r.uuid));
        let is_photo = r.isphoto.unwrap_or_else(|| !r.ismovie.unwrap_or(false));
        Candidate {
            filename,
            path: r.path,
            size: r.original_filesize,
            created_at: r.date.as_deref().and_then(parse_date),
            modified_at: r.date_modified.as_deref().and_then(parse_date),
            is_photo,
            id: r.uuid,
        }
    }
}

/// Parse an osxphotos timestamp.
///
/// Offsets are honoured; naive timestamps are taken as UTC.
fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    tracing::debug!("Unparseable catalog date: {}", s);
    None
}

/// Parse the JSON array printed by `osxphotos query --json`.
pub fn parse_query_output(stdout: &[u8]) -> Result<Vec<Candidate>, CatalogError> {
    let records: Vec<QueryRecord> =
        serde_json::from_slice(stdout).map_err(|e| CatalogError::Parse(e.to_string()))?;
    Ok(records.into_iter().map(Candidate::from).collect())
}

fn library_args(cmd: &mut Command, library: Option<&Path>) {
    if let Some(lib) = library {
        cmd.arg("--library").arg(lib);
    }
}

/// Photos library enumerated through `osxphotos query`.
#[derive(Debug, Clone)]
pub struct OsxPhotosCatalog {
    binary: PathBuf,
    library: Option<PathBuf>,
}

impl OsxPhotosCatalog {
    /// `library` of `None` means the system photo library.
    pub fn new(binary: PathBuf, library: Option<PathBuf>) -> Self {
        Self { binary, library }
    }
}

#[async_trait]
impl Catalog for OsxPhotosCatalog {
    async fn candidates(&self) -> Result<Vec<Candidate>, CatalogError> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(["query", "--json"]);
        library_args(&mut cmd, self.library.as_deref());

        tracing::debug!(binary = %self.binary.display(), "Querying photo library");
        let output = cmd.output().await.map_err(|e| CatalogError::Spawn {
            program: self.binary.display().to_string(),
            source: e,
        })?;

        if !output.status.success() {
            return Err(CatalogError::ExitStatus {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        parse_query_output(&output.stdout)
    }
}

/// Downloads iCloud-only originals through `osxphotos export`.
#[derive(Debug, Clone)]
pub struct OsxPhotosFetcher {
    binary: PathBuf,
    library: Option<PathBuf>,
}

impl OsxPhotosFetcher {
    pub fn new(binary: PathBuf, library: Option<PathBuf>) -> Self {
        Self { binary, library }
    }
}

#[async_trait]
impl RemoteFetcher for OsxPhotosFetcher {
    async fn fetch(&self, source_id: &str, dest_dir: &Path) -> Result<PathBuf, FetchError> {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("export")
            .arg(dest_dir)
            .args([
                "--uuid",
                source_id,
                "--download-missing",
                "--overwrite",
                "--skip-edited",
                "--skip-live",
                "--no-progress",
            ])
            .stdin(Stdio::null())
            // A timed-out fetch is abandoned by dropping this future; the
            // child must not outlive it.
            .kill_on_drop(true);
        library_args(&mut cmd, self.library.as_deref());

        let output = cmd.output().await.map_err(|e| FetchError::Spawn {
            program: self.binary.display().to_string(),
            source: e,
        })?;

        if !output.status.success() {
            return Err(FetchError::ExitStatus {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        first_file_in(dest_dir).await?.ok_or(FetchError::NoOutput)
    }
}

/// First regular file in `dir` by name, if any.
pub(crate) async fn first_file_in(dir: &Path) -> std::io::Result<Option<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files.into_iter().next())
}
