use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::types::LogLevel;

#[derive(Parser, Debug)]
#[command(
    name = "icloud-drain-rs",
    version,
    about = "Drain an iCloud Photos library into Immich in disk-bounded batches"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, value_enum, default_value = "info", global = true)]
    pub log_level: LogLevel,

    /// Directory holding the migration ledger
    #[arg(long, env = "DATA_DIR", default_value = "./data", global = true)]
    pub data_dir: String,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Export, upload and record pending items
    Run(RunArgs),
    /// Show what has been migrated so far
    Stats(StatsArgs),
    /// Compare the photo library against the ledger
    Progress(LibraryArgs),
}

/// Where to find the Photos library and the tool that reads it.
#[derive(Args, Debug, Clone)]
pub struct LibraryArgs {
    /// Path to a .photoslibrary bundle (default: system library)
    #[arg(long, env = "PHOTOS_LIBRARY")]
    pub library: Option<String>,

    /// osxphotos executable
    #[arg(long, env = "OSXPHOTOS_BIN", default_value = "osxphotos")]
    pub osxphotos: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub library: LibraryArgs,

    /// Immich server URL
    #[arg(long, env = "IMMICH_URL")]
    pub immich_url: Option<String>,

    /// Immich API key.
    /// WARNING: passing via --immich-api-key is visible in process listings.
    /// Prefer the IMMICH_API_KEY environment variable instead.
    #[arg(long, env = "IMMICH_API_KEY", hide_env_values = true)]
    pub immich_api_key: Option<String>,

    /// Scratch directory for exported originals
    #[arg(long, env = "STAGING_DIR", default_value = "/tmp/icloud-drain-staging")]
    pub staging_dir: String,

    /// Preview what would be migrated without exporting or uploading
    #[arg(long, env = "DRY_RUN")]
    pub dry_run: bool,

    /// Maximum batch size in GB
    #[arg(long = "batch-size", env = "BATCH_SIZE_GB", default_value_t = 10.0)]
    pub batch_size_gb: f64,

    /// Stop after this many batches
    #[arg(long)]
    pub max_batches: Option<usize>,

    /// Only migrate items already downloaded to this Mac
    #[arg(long)]
    pub local_only: bool,

    /// Maximum items per batch (0 = unlimited)
    #[arg(long, default_value_t = 0)]
    pub max_items: usize,

    /// Seconds to wait before an iCloud download that follows another
    #[arg(long, default_value_t = 30)]
    pub fetch_pause: u64,

    /// Seconds before an iCloud download is abandoned
    #[arg(long, default_value_t = 300)]
    pub fetch_timeout: u64,

    /// Disable progress bar
    #[arg(long)]
    pub no_progress_bar: bool,
}

#[derive(Args, Debug, Clone)]
pub struct StatsArgs {
    /// Also list the N most recently migrated items
    #[arg(long)]
    pub recent: Option<usize>,
}
