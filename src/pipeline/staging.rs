//! Staging directory housekeeping.

use std::path::Path;

use crate::export::SCRATCH_DIR_PREFIX;

/// Remove leftover staged files and fetch scratch directories from `dir`.
///
/// Top-level files are unlinked. Subdirectories are only removed when they
/// carry the exporter's scratch prefix; anything else is left in place.
/// Returns the number of entries removed. Failures are logged and skipped.
pub async fn sweep(dir: &Path) -> usize {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(e) => e,
        Err(e) => {
            tracing::warn!("Could not read staging directory {}: {}", dir.display(), e);
            return 0;
        }
    };

    let mut removed = 0;
    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("Error listing {}: {}", dir.display(), e);
                break;
            }
        };
        let path = entry.path();
        let result = match entry.file_type().await {
            Ok(ft) if ft.is_dir() => {
                let is_scratch = entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| name.starts_with(SCRATCH_DIR_PREFIX));
                if !is_scratch {
                    tracing::debug!("Leaving unrelated directory {}", path.display());
                    continue;
                }
                tokio::fs::remove_dir_all(&path).await
            }
            _ => tokio::fs::remove_file(&path).await,
        };
        match result {
            Ok(()) => removed += 1,
            Err(e) => tracing::warn!("Could not remove {}: {}", path.display(), e),
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sweep_removes_files_and_scratch_dirs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.jpg"), b"x").unwrap();
        std::fs::create_dir_all(dir.path().join("fetch-1/nested")).unwrap();
        std::fs::write(dir.path().join("fetch-1/nested/b.mov"), b"x").unwrap();

        assert_eq!(sweep(dir.path()).await, 2);
        assert!(dir.path().exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_sweep_keeps_unrelated_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let album = dir.path().join("user_album/2019");
        std::fs::create_dir_all(&album).unwrap();
        std::fs::write(album.join("keep.jpg"), b"x").unwrap();
        std::fs::write(dir.path().join("leftover.jpg"), b"x").unwrap();

        assert_eq!(sweep(dir.path()).await, 1);
        assert!(album.join("keep.jpg").exists());
        assert!(!dir.path().join("leftover.jpg").exists());
    }

    #[tokio::test]
    async fn test_sweep_missing_dir() {
        assert_eq!(sweep(Path::new("/nonexistent/staging")).await, 0);
    }
}
