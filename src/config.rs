use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};

use crate::cli::{LibraryArgs, RunArgs};
use crate::pipeline::{PipelineConfig, RunOptions};

/// `deviceId` reported to Immich for every upload.
pub const DEVICE_ID: &str = "icloud-drain";

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Settings for a `run`, validated once at startup and then handed out in
/// pieces to the components that need them.
pub struct Config {
    pub immich_url: String,
    pub immich_api_key: String,
    pub staging_dir: PathBuf,
    pub data_dir: PathBuf,
    pub library: Option<PathBuf>,
    pub osxphotos: PathBuf,

    pub fetch_pause: Duration,
    pub fetch_timeout: Duration,
    pub batch_size_bytes: u64,
    pub max_batches: Option<usize>,
    pub max_items: Option<usize>,

    pub dry_run: bool,
    pub local_only: bool,
    pub no_progress_bar: bool,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("immich_url", &self.immich_url)
            .field("immich_api_key", &"<redacted>")
            .field("staging_dir", &self.staging_dir)
            .field("data_dir", &self.data_dir)
            .field("library", &self.library)
            .field("batch_size_bytes", &self.batch_size_bytes)
            .field("dry_run", &self.dry_run)
            .finish_non_exhaustive()
    }
}

pub(crate) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

/// Ledger location inside the data directory.
pub fn tracker_db_path(data_dir: &Path) -> PathBuf {
    data_dir.join("tracker.db")
}

/// Library path from CLI/env, tilde-expanded. Empty means the system library.
pub fn library_path(args: &LibraryArgs) -> Option<PathBuf> {
    args.library
        .as_deref()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(expand_tilde)
}

fn required(value: Option<String>, name: &str, env: &str) -> anyhow::Result<String> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => bail!("{} is required (set --{} or {})", env, name, env),
    }
}

impl Config {
    pub fn from_run_args(data_dir: &str, args: RunArgs) -> anyhow::Result<Self> {
        let immich_url = required(args.immich_url, "immich-url", "IMMICH_URL")?;
        let immich_api_key = required(args.immich_api_key, "immich-api-key", "IMMICH_API_KEY")?;

        if !args.batch_size_gb.is_finite() || args.batch_size_gb <= 0.0 {
            bail!(
                "Batch size must be a positive number of GB, got {}",
                args.batch_size_gb
            );
        }
        let batch_size_bytes = (args.batch_size_gb * BYTES_PER_GB) as u64;
        if args.max_batches == Some(0) {
            bail!("--max-batches must be at least 1");
        }

        let fetch_timeout = Duration::from_secs(args.fetch_timeout);
        if fetch_timeout.is_zero() {
            bail!("--fetch-timeout must be at least 1 second");
        }

        Ok(Self {
            immich_url,
            immich_api_key,
            staging_dir: expand_tilde(&args.staging_dir),
            data_dir: expand_tilde(data_dir),
            library: library_path(&args.library),
            osxphotos: args.library.osxphotos,
            fetch_pause: Duration::from_secs(args.fetch_pause),
            fetch_timeout,
            batch_size_bytes,
            max_batches: args.max_batches,
            max_items: (args.max_items > 0).then_some(args.max_items),
            dry_run: args.dry_run,
            local_only: args.local_only,
            no_progress_bar: args.no_progress_bar,
        })
    }

    pub fn tracker_db_path(&self) -> PathBuf {
        tracker_db_path(&self.data_dir)
    }

    /// Ensure the data directory exists before the ledger is opened.
    pub fn prepare_data_dir(&self) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.data_dir).with_context(|| {
            format!(
                "Failed to create data directory {}",
                self.data_dir.display()
            )
        })
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            staging_dir: self.staging_dir.clone(),
            fetch_pause: self.fetch_pause,
        }
    }

    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            dry_run: self.dry_run,
            batch_size_bytes: self.batch_size_bytes,
            max_batches: self.max_batches,
            max_items: self.max_items,
            local_only: self.local_only,
            no_progress_bar: self.no_progress_bar,
        }
    }
}
