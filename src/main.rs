//! icloud-drain-rs: move an Apple Photos / iCloud library into Immich.
//!
//! Works through the library in disk-bounded batches so a Mac with little free
//! space can migrate a library far larger than its disk. Each item is exported
//! (downloading from iCloud if needed), uploaded, recorded in a local SQLite
//! ledger and deleted from staging before the next one starts. Re-running
//! picks up exactly where the last run stopped.

#![warn(clippy::all)]

mod catalog;
mod classify;
mod cli;
mod config;
mod export;
mod immich;
mod ledger;
mod pipeline;
mod planner;
mod shutdown;
mod types;

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use catalog::{Catalog, OsxPhotosCatalog, OsxPhotosFetcher};
use cli::Command;
use config::Config;
use export::Exporter;
use immich::ImmichClient;
use ledger::{Ledger, SqliteLedger};
use pipeline::{Orchestrator, PipelineDeps};

/// Run the migration.
async fn run_migration(data_dir: &str, args: cli::RunArgs) -> anyhow::Result<()> {
    let config = Config::from_run_args(data_dir, args)?;
    tracing::debug!(?config, "Loaded configuration");

    config.prepare_data_dir()?;
    let db_path = config.tracker_db_path();
    let ledger = SqliteLedger::open(&db_path)
        .await
        .with_context(|| format!("Failed to open ledger at {}", db_path.display()))?;

    let target = ImmichClient::new(&config.immich_url, &config.immich_api_key, config::DEVICE_ID)
        .context("Invalid Immich configuration")?;
    let fetcher = OsxPhotosFetcher::new(config.osxphotos.clone(), config.library.clone());

    let orchestrator = Orchestrator::new(
        PipelineDeps {
            catalog: Arc::new(OsxPhotosCatalog::new(
                config.osxphotos.clone(),
                config.library.clone(),
            )),
            exporter: Exporter::new(Arc::new(fetcher), config.fetch_timeout),
            target: Arc::new(target),
            ledger: Arc::new(ledger),
        },
        config.pipeline_config(),
    );

    tracing::info!(
        dry_run = config.dry_run,
        batch_gb = config.batch_size_bytes as f64 / (1024.0 * 1024.0 * 1024.0),
        "Starting iCloud drain to {}",
        config.immich_url
    );

    let shutdown_token = shutdown::install_signal_handler();
    orchestrator
        .run(&config.run_options(), shutdown_token)
        .await?;
    Ok(())
}

/// Run the stats command.
async fn run_stats(data_dir: &str, args: cli::StatsArgs) -> anyhow::Result<()> {
    let db_path = config::tracker_db_path(&config::expand_tilde(data_dir));

    if !db_path.exists() {
        println!("No ledger found at {}", db_path.display());
        println!("Run a migration first to create it.");
        return Ok(());
    }

    let db = SqliteLedger::open(&db_path).await?;
    let stats = db.stats().await?;

    println!("Ledger: {}", db.path().display());
    println!();
    println!("Migrated:");
    println!("  Total:  {}", stats.total);
    println!("  Photos: {}", stats.photos);
    println!("  Videos: {}", stats.videos);
    println!("  Size:   {:.2} GB", stats.total_size_gb());

    if let Some(last) = &stats.last_migrated_at {
        println!();
        println!("Last migrated: {}", last.format("%Y-%m-%d %H:%M:%S UTC"));
    }

    if let Some(run) = &stats.last_run {
        println!();
        println!("Last run started:   {}", run.started_at.format("%Y-%m-%d %H:%M:%S UTC"));
        match &run.completed_at {
            Some(done) => println!("Last run completed: {}", done.format("%Y-%m-%d %H:%M:%S UTC")),
            None => println!("Last run completed: never (aborted)"),
        }
        println!(
            "  {} exported, {} uploaded, {} duplicates, {} failed{}",
            run.stats.exported,
            run.stats.uploaded,
            run.stats.duplicates,
            run.stats.failed,
            if run.stats.interrupted { " (interrupted)" } else { "" }
        );
    }

    if let Some(n) = args.recent {
        let recent = db.recent(n).await?;
        println!();
        println!("Recent ({}):", recent.len());
        for r in recent {
            println!(
                "  {}  {} ({}, {}) -> {}",
                r.migrated_at.format("%Y-%m-%d %H:%M:%S"),
                r.filename,
                r.media_type.as_str(),
                format_size(r.size_bytes),
                r.dest_id.as_deref().unwrap_or("-")
            );
        }
    }

    Ok(())
}

/// Run the progress command: survey the library against the ledger.
async fn run_progress(data_dir: &str, args: cli::LibraryArgs) -> anyhow::Result<()> {
    let db_path = config::tracker_db_path(&config::expand_tilde(data_dir));
    let migrated = load_migrated(&db_path).await?;

    let catalog = OsxPhotosCatalog::new(args.osxphotos.clone(), config::library_path(&args));
    tracing::info!("Reading photo library (this can take a few minutes)...");
    let candidates = catalog
        .candidates()
        .await
        .context("Could not read the photo library")?;
    let survey = planner::survey(&candidates, &migrated);

    println!("Library: {} items", survey.total);
    println!(
        "  Migrated:      {} ({:.1}%)",
        survey.already_migrated,
        survey.percent_migrated()
    );
    println!("  Local, ready:  {}", survey.local);
    println!("  Still remote:  {}", survey.remote);
    println!("  Skipped junk:  {}", survey.junk);
    println!();
    println!("Remaining: {}", survey.pending());

    Ok(())
}

async fn load_migrated(db_path: &Path) -> anyhow::Result<HashSet<String>> {
    if !db_path.exists() {
        return Ok(HashSet::new());
    }
    let db = SqliteLedger::open(db_path).await?;
    Ok(db.migrated_ids().await?)
}

fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine; real environment variables still apply.
    let _ = dotenvy::dotenv();
    let cli::Cli {
        command,
        log_level,
        data_dir,
    } = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(log_level.as_filter())),
        )
        .init();

    match command {
        Command::Run(args) => run_migration(&data_dir, args).await,
        Command::Stats(args) => run_stats(&data_dir, args).await,
        Command::Progress(args) => run_progress(&data_dir, args).await,
    }
}
