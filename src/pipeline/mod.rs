//! Migration pipeline: plan the worklist, then drain it batch by batch.
//!
//! Every item goes through export, upload, record and cleanup before the next
//! one starts, so at most one original occupies the staging area at a time
//! and the ledger is always current. A run can be killed at any point: items
//! that were not recorded are simply offered again next time.

pub mod error;
pub mod staging;

use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;

use crate::catalog::{Candidate, Catalog};
use crate::classify::MediaKind;
use crate::export::{ExportPath, Exporter};
use crate::immich::{UploadOutcome, UploadRequest, UploadTarget};
use crate::ledger::{Ledger, MigrationRecord, RunStats};
use crate::planner::{build_batch, estimated_size, plan};

pub use error::PipelineError;

/// Default pause before an iCloud fetch that follows another one.
pub const DEFAULT_FETCH_PAUSE: Duration = Duration::from_secs(30);

/// Fixed settings for the orchestrator, independent of a single run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub staging_dir: PathBuf,
    pub fetch_pause: Duration,
}

/// Per-invocation knobs from the `run` command.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub dry_run: bool,
    pub batch_size_bytes: u64,
    pub max_batches: Option<usize>,
    pub max_items: Option<usize>,
    pub local_only: bool,
    pub no_progress_bar: bool,
}

/// Collaborators the orchestrator drives.
pub struct PipelineDeps {
    pub catalog: Arc<dyn Catalog>,
    pub exporter: Exporter,
    pub target: Arc<dyn UploadTarget>,
    pub ledger: Arc<dyn Ledger>,
}

pub struct Orchestrator {
    deps: PipelineDeps,
    config: PipelineConfig,
}

impl Orchestrator {
    pub fn new(deps: PipelineDeps, config: PipelineConfig) -> Self {
        Self { deps, config }
    }

    /// Execute one run to completion, shutdown, or a fatal error.
    pub async fn run(
        &self,
        opts: &RunOptions,
        shutdown: CancellationToken,
    ) -> Result<RunStats, PipelineError> {
        let started = Instant::now();

        if !self.deps.target.ping().await {
            return Err(PipelineError::DestinationUnreachable);
        }
        tracing::debug!("Destination is reachable");

        let candidates = self.deps.catalog.candidates().await?;
        let total = candidates.len();
        let migrated = self.deps.ledger.migrated_ids().await?;
        let mut worklist = plan(candidates, &migrated, opts.local_only);

        let local = worklist.iter().filter(|c| c.is_local()).count();
        tracing::info!(
            "Library has {} items, {} already migrated; {} to process ({} local, {} in iCloud)",
            total,
            migrated.len(),
            worklist.len(),
            local,
            worklist.len() - local
        );

        if worklist.is_empty() {
            tracing::info!("Nothing to migrate");
            return Ok(RunStats::default());
        }

        let run_id = if opts.dry_run {
            None
        } else {
            tokio::fs::create_dir_all(&self.config.staging_dir)
                .await
                .map_err(|e| PipelineError::Staging {
                    path: self.config.staging_dir.clone(),
                    source: e,
                })?;
            Some(self.deps.ledger.start_run().await?)
        };

        let mut stats = RunStats::default();
        // Set after a successful iCloud fetch; the next fetch must wait.
        let mut pause_pending = false;
        let mut batch_num = 0;

        while !worklist.is_empty() {
            if opts.max_batches.is_some_and(|max| batch_num >= max) {
                tracing::info!("Reached batch limit ({}), stopping", batch_num);
                break;
            }
            if shutdown.is_cancelled() {
                stats.interrupted = true;
                break;
            }

            let (batch, rest) = build_batch(worklist, opts.batch_size_bytes, opts.max_items);
            worklist = rest;
            if batch.is_empty() {
                break;
            }
            batch_num += 1;

            let batch_bytes: u64 = batch.iter().map(estimated_size).sum();
            tracing::info!(
                "── Batch {} ── {} items, ~{:.2} GB, {} remaining after",
                batch_num,
                batch.len(),
                batch_bytes as f64 / GIB,
                worklist.len()
            );

            let result = self
                .run_batch(batch, opts, &shutdown, &mut pause_pending)
                .await;
            if !opts.dry_run {
                let swept = staging::sweep(&self.config.staging_dir).await;
                if swept > 0 {
                    tracing::debug!("Swept {} leftover staging entries", swept);
                }
            }
            let batch_stats = result?;
            if !opts.dry_run {
                tracing::info!(
                    "Batch {} done: {} uploaded, {} duplicates, {} failed",
                    batch_num,
                    batch_stats.uploaded,
                    batch_stats.duplicates,
                    batch_stats.failed
                );
            }
            stats += batch_stats;

            if stats.interrupted {
                break;
            }
        }

        if stats.interrupted {
            tracing::info!("Shutdown requested, stopped between items");
        }

        if let Some(id) = run_id {
            self.deps.ledger.complete_run(id, &stats).await?;
        }

        log_summary(&stats, opts.dry_run, started.elapsed());
        Ok(stats)
    }

    async fn run_batch(
        &self,
        batch: Vec<Candidate>,
        opts: &RunOptions,
        shutdown: &CancellationToken,
        pause_pending: &mut bool,
    ) -> Result<RunStats, PipelineError> {
        let mut stats = RunStats {
            batches: 1,
            ..RunStats::default()
        };
        let pb = create_progress_bar(opts.no_progress_bar, batch.len() as u64);
        let batch_len = batch.len();

        for (i, candidate) in batch.into_iter().enumerate() {
            if shutdown.is_cancelled() {
                stats.interrupted = true;
                break;
            }
            pb.set_message(candidate.filename.clone());

            if opts.dry_run {
                pb.suspend(|| {
                    tracing::info!(
                        "[{}/{}] Would migrate {} ({})",
                        i + 1,
                        batch_len,
                        candidate.filename,
                        if candidate.is_local() { "local" } else { "iCloud" }
                    )
                });
                stats.skipped += 1;
                pb.inc(1);
                continue;
            }

            let result = self
                .process_item(&candidate, &pb, shutdown, pause_pending, &mut stats)
                .await;
            pb.inc(1);
            result?;
        }

        pb.finish_and_clear();
        Ok(stats)
    }

    /// Export, upload, record and clean up one candidate.
    ///
    /// Only ledger errors propagate; everything else is counted as a failure.
    async fn process_item(
        &self,
        candidate: &Candidate,
        pb: &ProgressBar,
        shutdown: &CancellationToken,
        pause_pending: &mut bool,
        stats: &mut RunStats,
    ) -> Result<(), PipelineError> {
        if !candidate.is_local() && *pause_pending {
            pb.suspend(|| {
                tracing::debug!(
                    "Pausing {}s before next iCloud fetch",
                    self.config.fetch_pause.as_secs()
                )
            });
            tokio::select! {
                _ = tokio::time::sleep(self.config.fetch_pause) => {}
                _ = shutdown.cancelled() => {
                    stats.interrupted = true;
                    return Ok(());
                }
            }
            *pause_pending = false;
        }

        let exported = match self
            .deps
            .exporter
            .export(candidate, &self.config.staging_dir)
            .await
        {
            Ok(f) => f,
            Err(e) => {
                pb.suspend(|| {
                    tracing::error!(
                        id = %candidate.id,
                        filename = %candidate.filename,
                        "Export failed: {}",
                        e
                    )
                });
                stats.failed += 1;
                return Ok(());
            }
        };
        stats.exported += 1;
        if exported.source == ExportPath::Remote {
            *pause_pending = true;
        }

        let size = match tokio::fs::metadata(&exported.path).await {
            Ok(m) => m.len(),
            Err(_) => candidate.declared_size().unwrap_or(0),
        };

        let request = UploadRequest {
            source_id: candidate.id.clone(),
            path: exported.path.clone(),
            filename: candidate.filename.clone(),
            created_at: candidate.created_at,
            modified_at: candidate.modified_at,
        };
        let outcome = self.deps.target.upload(&request).await;

        let recorded = match &outcome {
            UploadOutcome::Created { asset_id } => {
                stats.uploaded += 1;
                pb.suspend(|| {
                    tracing::info!(
                        id = %candidate.id,
                        "Uploaded {} ({})",
                        candidate.filename,
                        asset_id.as_deref().unwrap_or("no asset id")
                    )
                });
                true
            }
            UploadOutcome::Duplicate { .. } => {
                stats.duplicates += 1;
                pb.suspend(|| {
                    tracing::info!(
                        id = %candidate.id,
                        "Already in Immich: {}",
                        candidate.filename
                    )
                });
                true
            }
            UploadOutcome::Failed { detail } => {
                stats.failed += 1;
                pb.suspend(|| {
                    tracing::error!(
                        id = %candidate.id,
                        filename = %candidate.filename,
                        "{}",
                        detail
                    )
                });
                false
            }
        };

        if recorded {
            let record = MigrationRecord::new(
                candidate.id.clone(),
                outcome.asset_id().map(str::to_string),
                candidate.filename.clone(),
                size,
                MediaKind::for_record(&candidate.filename, candidate.is_photo),
            );
            self.deps.ledger.record(&record).await?;
        }

        let staged_path = exported.path.clone();
        if let Err(e) = exported.remove().await {
            pb.suspend(|| {
                tracing::warn!(
                    "Could not delete staging file {}: {}",
                    staged_path.display(),
                    e
                )
            });
        }

        Ok(())
    }
}

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

fn create_progress_bar(no_progress_bar: bool, total: u64) -> ProgressBar {
    if no_progress_bar || !std::io::stdout().is_terminal() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::with_template(
            "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> "),
    );
    pb
}

pub(crate) fn format_duration(d: Duration) -> String {
    let total_secs = d.as_secs();
    let hours = total_secs / 3600;
    let mins = (total_secs % 3600) / 60;
    let secs = total_secs % 60;

    if hours > 0 {
        format!("{}h {:02}m {:02}s", hours, mins, secs)
    } else if mins > 0 {
        format!("{}m {:02}s", mins, secs)
    } else {
        format!("{}s", secs)
    }
}

fn log_summary(stats: &RunStats, dry_run: bool, elapsed: Duration) {
    if dry_run {
        tracing::info!("── Dry Run Summary ──");
        tracing::info!("  {} items would be migrated", stats.skipped);
    } else {
        tracing::info!("── Summary ──");
        tracing::info!(
            "  {} exported, {} uploaded, {} duplicates, {} failed across {} batches",
            stats.exported,
            stats.uploaded,
            stats.duplicates,
            stats.failed,
            stats.batches
        );
        if stats.failed > 0 {
            tracing::warn!("  {} items failed; run again to retry them", stats.failed);
        }
    }
    if stats.interrupted {
        tracing::info!("  interrupted by shutdown");
    }
    tracing::info!("  elapsed: {}", format_duration(elapsed));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::fake::{local, remote, BrokenCatalog, FakeCatalog, FakeFetcher};
    use crate::catalog::RemoteFetcher;
    use crate::export::DEFAULT_FETCH_TIMEOUT;
    use crate::immich::fake::FakeTarget;
    use crate::ledger::types::LedgerStats;
    use crate::ledger::{LedgerError, SqliteLedger};
    use std::collections::{HashMap, HashSet};
    use std::path::Path;

    const GB: u64 = 1024 * 1024 * 1024;

    struct Harness {
        orchestrator: Orchestrator,
        ledger: Arc<SqliteLedger>,
        fetcher: Arc<FakeFetcher>,
        target: Arc<FakeTarget>,
        staging: PathBuf,
        _root: tempfile::TempDir,
    }

    impl Harness {
        fn new(candidates: Vec<Candidate>, fetcher: FakeFetcher, target: FakeTarget) -> Self {
            Self::with_catalog(Arc::new(FakeCatalog { candidates }), fetcher, target)
        }

        fn with_catalog(catalog: Arc<dyn Catalog>, fetcher: FakeFetcher, target: FakeTarget) -> Self {
            let root = tempfile::tempdir().unwrap();
            let staging = root.path().join("staging");
            let ledger = Arc::new(SqliteLedger::open_in_memory().unwrap());
            let fetcher = Arc::new(fetcher);
            let target = Arc::new(target);
            let orchestrator = Orchestrator::new(
                PipelineDeps {
                    catalog,
                    exporter: Exporter::new(
                        fetcher.clone() as Arc<dyn RemoteFetcher>,
                        DEFAULT_FETCH_TIMEOUT,
                    ),
                    target: target.clone(),
                    ledger: ledger.clone(),
                },
                PipelineConfig {
                    staging_dir: staging.clone(),
                    fetch_pause: DEFAULT_FETCH_PAUSE,
                },
            );
            Self {
                orchestrator,
                ledger,
                fetcher,
                target,
                staging,
                _root: root,
            }
        }

        async fn run(&self, opts: &RunOptions) -> Result<RunStats, PipelineError> {
            self.orchestrator.run(opts, CancellationToken::new()).await
        }

        fn staging_is_empty(&self) -> bool {
            !self.staging.exists() || std::fs::read_dir(&self.staging).unwrap().count() == 0
        }
    }

    fn opts() -> RunOptions {
        RunOptions {
            dry_run: false,
            batch_size_bytes: 10 * GB,
            max_batches: None,
            max_items: None,
            local_only: false,
            no_progress_bar: true,
        }
    }

    fn local_file(dir: &Path, name: &str) -> PathBuf {
        let p = dir.join(name);
        std::fs::write(&p, b"local original").unwrap();
        p
    }

    #[tokio::test]
    async fn test_migrates_local_and_remote() {
        let library = tempfile::tempdir().unwrap();
        let a = local_file(library.path(), "A.jpg");
        let h = Harness::new(
            vec![remote("B", "B.mov", None, false), local("A", &a, Some(2 * GB))],
            FakeFetcher::default(),
            FakeTarget::default(),
        );

        let mut o = opts();
        o.batch_size_bytes = 5 * GB;
        let stats = h.run(&o).await.unwrap();

        assert_eq!(stats.exported, 2);
        assert_eq!(stats.uploaded, 2);
        assert_eq!(stats.failed, 0);
        assert!(!stats.interrupted);
        assert_eq!(h.target.uploaded_ids(), ["A", "B"]);

        let ids = h.ledger.migrated_ids().await.unwrap();
        assert!(ids.contains("A") && ids.contains("B"));
        let recent = h.ledger.recent(10).await.unwrap();
        let a_rec = recent.iter().find(|r| r.source_id == "A").unwrap();
        assert_eq!(a_rec.dest_id.as_deref(), Some("asset-A"));
        assert_eq!(a_rec.size_bytes, b"local original".len() as u64);
        let b_rec = recent.iter().find(|r| r.source_id == "B").unwrap();
        assert_eq!(b_rec.media_type, crate::ledger::MediaType::Video);

        assert!(h.staging_is_empty());
        assert!(a.exists(), "library original must be left alone");

        let last = h.ledger.stats().await.unwrap().last_run.unwrap();
        assert!(last.completed_at.is_some());
        assert_eq!(last.stats.uploaded, 2);
    }

    #[tokio::test]
    async fn test_second_run_skips_migrated() {
        let h = Harness::new(
            vec![remote("A", "a.jpg", Some(10), true)],
            FakeFetcher::default(),
            FakeTarget::default(),
        );

        h.run(&opts()).await.unwrap();
        let stats = h.run(&opts()).await.unwrap();

        assert_eq!(stats, RunStats::default());
        assert_eq!(h.fetcher.call_count(), 1);
        assert_eq!(h.target.uploaded_ids(), ["A"]);
    }

    #[tokio::test]
    async fn test_duplicate_is_recorded() {
        let target = FakeTarget {
            outcomes: HashMap::from([(
                "D".to_string(),
                UploadOutcome::Duplicate {
                    asset_id: Some("existing".to_string()),
                },
            )]),
            ..Default::default()
        };
        let h = Harness::new(vec![remote("D", "d.jpg", None, true)], FakeFetcher::default(), target);

        let stats = h.run(&opts()).await.unwrap();

        assert_eq!(stats.duplicates, 1);
        assert_eq!(stats.uploaded, 0);
        assert!(h.ledger.is_migrated("D").await.unwrap());
        assert!(h.staging_is_empty());
    }

    #[tokio::test]
    async fn test_export_failure_is_retried_next_run() {
        let fetcher = FakeFetcher {
            fail_ids: ["X".to_string()].into(),
            ..Default::default()
        };
        let h = Harness::new(vec![remote("X", "x.jpg", None, true)], fetcher, FakeTarget::default());

        let stats = h.run(&opts()).await.unwrap();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.exported, 0);
        assert!(!h.ledger.is_migrated("X").await.unwrap());
        assert!(h.staging_is_empty());
        assert!(h.target.uploaded_ids().is_empty());

        h.run(&opts()).await.unwrap();
        assert_eq!(h.fetcher.call_count(), 2);
    }

    #[tokio::test]
    async fn test_upload_failure_not_recorded() {
        let target = FakeTarget {
            outcomes: HashMap::from([(
                "F".to_string(),
                UploadOutcome::Failed {
                    detail: "Upload failed: 500 - boom".to_string(),
                },
            )]),
            ..Default::default()
        };
        let h = Harness::new(vec![remote("F", "f.jpg", None, true)], FakeFetcher::default(), target);

        let stats = h.run(&opts()).await.unwrap();
        assert_eq!(stats.exported, 1);
        assert_eq!(stats.failed, 1);
        assert!(!h.ledger.is_migrated("F").await.unwrap());
        assert!(h.staging_is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_touches_nothing() {
        let library = tempfile::tempdir().unwrap();
        let a = local_file(library.path(), "A.jpg");
        let h = Harness::new(
            vec![local("A", &a, None), remote("B", "b.jpg", None, true)],
            FakeFetcher::default(),
            FakeTarget::default(),
        );

        let mut o = opts();
        o.dry_run = true;
        let stats = h.run(&o).await.unwrap();

        assert_eq!(stats.skipped, 2);
        assert_eq!(stats.exported, 0);
        assert_eq!(stats.uploaded, 0);
        assert!(!h.staging.exists());
        assert_eq!(h.fetcher.call_count(), 0);
        assert!(h.target.uploaded_ids().is_empty());
        let ledger_stats = h.ledger.stats().await.unwrap();
        assert_eq!(ledger_stats.total, 0);
        assert!(ledger_stats.last_run.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_destination_is_fatal() {
        let target = FakeTarget {
            unreachable: true,
            ..Default::default()
        };
        let h = Harness::new(vec![remote("A", "a.jpg", None, true)], FakeFetcher::default(), target);

        let err = h.run(&opts()).await.unwrap_err();
        assert!(matches!(err, PipelineError::DestinationUnreachable));
        assert_eq!(h.fetcher.call_count(), 0);
        assert!(!h.staging.exists());
        assert!(h.ledger.stats().await.unwrap().last_run.is_none());
    }

    #[tokio::test]
    async fn test_catalog_failure_is_fatal() {
        let h = Harness::with_catalog(
            Arc::new(BrokenCatalog),
            FakeFetcher::default(),
            FakeTarget::default(),
        );
        let err = h.run(&opts()).await.unwrap_err();
        assert!(matches!(err, PipelineError::Catalog(_)));
    }

    #[tokio::test]
    async fn test_staging_creation_failure_is_fatal() {
        let mut h = Harness::new(
            vec![remote("A", "a.jpg", None, true)],
            FakeFetcher::default(),
            FakeTarget::default(),
        );
        // A regular file where the staging directory should go.
        std::fs::write(&h.staging, b"in the way").unwrap();
        h.orchestrator.config.staging_dir = h.staging.join("sub");

        let err = h.run(&opts()).await.unwrap_err();
        assert!(matches!(err, PipelineError::Staging { .. }));
        assert_eq!(h.fetcher.call_count(), 0);
    }

    #[tokio::test]
    async fn test_max_batches_and_items() {
        let candidates = (0..5)
            .map(|i| remote(&format!("R{}", i), "r.jpg", Some(1), true))
            .collect();
        let h = Harness::new(candidates, FakeFetcher::default(), FakeTarget::default());

        let mut o = opts();
        o.max_items = Some(1);
        o.max_batches = Some(1);
        // Fetch pause is irrelevant: a one-item batch never pauses.
        let stats = h.run(&o).await.unwrap();

        assert_eq!(stats.uploaded, 1);
        assert_eq!(stats.batches, 1);
        assert_eq!(h.target.uploaded_ids(), ["R0"]);
    }

    #[tokio::test]
    async fn test_zero_item_cap_drains_everything() {
        let candidates = (0..3)
            .map(|i| remote(&format!("R{}", i), "r.jpg", Some(1), true))
            .collect();
        let mut h = Harness::new(candidates, FakeFetcher::default(), FakeTarget::default());
        h.orchestrator.config.fetch_pause = Duration::ZERO;

        let mut o = opts();
        o.max_items = Some(0);
        let stats = tokio::time::timeout(Duration::from_secs(10), h.run(&o))
            .await
            .expect("run must terminate")
            .unwrap();

        assert_eq!(stats.uploaded, 3);
        assert_eq!(stats.batches, 1);
        assert_eq!(h.target.uploaded_ids(), ["R0", "R1", "R2"]);
    }

    /// Delegates to an in-memory ledger but refuses every `record`.
    struct RecordFailsLedger(SqliteLedger);

    #[async_trait::async_trait]
    impl Ledger for RecordFailsLedger {
        async fn is_migrated(&self, source_id: &str) -> Result<bool, LedgerError> {
            self.0.is_migrated(source_id).await
        }
        async fn migrated_ids(&self) -> Result<HashSet<String>, LedgerError> {
            self.0.migrated_ids().await
        }
        async fn record(&self, _record: &MigrationRecord) -> Result<(), LedgerError> {
            Err(LedgerError::Query("disk I/O error".to_string()))
        }
        async fn stats(&self) -> Result<LedgerStats, LedgerError> {
            self.0.stats().await
        }
        async fn recent(&self, limit: usize) -> Result<Vec<MigrationRecord>, LedgerError> {
            self.0.recent(limit).await
        }
        async fn start_run(&self) -> Result<i64, LedgerError> {
            self.0.start_run().await
        }
        async fn complete_run(&self, run_id: i64, stats: &RunStats) -> Result<(), LedgerError> {
            self.0.complete_run(run_id, stats).await
        }
    }

    #[tokio::test]
    async fn test_ledger_failure_aborts_run() {
        let root = tempfile::tempdir().unwrap();
        let staging = root.path().join("staging");
        let fetcher = Arc::new(FakeFetcher::default());
        let target = Arc::new(FakeTarget::default());
        let orchestrator = Orchestrator::new(
            PipelineDeps {
                catalog: Arc::new(FakeCatalog {
                    candidates: vec![
                        remote("R1", "a.jpg", None, true),
                        remote("R2", "b.jpg", None, true),
                    ],
                }),
                exporter: Exporter::new(
                    fetcher.clone() as Arc<dyn RemoteFetcher>,
                    DEFAULT_FETCH_TIMEOUT,
                ),
                target: target.clone(),
                ledger: Arc::new(RecordFailsLedger(SqliteLedger::open_in_memory().unwrap())),
            },
            PipelineConfig {
                staging_dir: staging.clone(),
                fetch_pause: Duration::ZERO,
            },
        );

        let err = orchestrator
            .run(&opts(), CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Ledger(_)));
        assert_eq!(fetcher.call_count(), 1);
        assert_eq!(target.uploaded_ids(), ["R1"]);
        assert_eq!(std::fs::read_dir(&staging).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_local_only_ignores_remote() {
        let library = tempfile::tempdir().unwrap();
        let a = local_file(library.path(), "A.jpg");
        let h = Harness::new(
            vec![remote("B", "b.jpg", None, true), local("A", &a, None)],
            FakeFetcher::default(),
            FakeTarget::default(),
        );

        let mut o = opts();
        o.local_only = true;
        let stats = h.run(&o).await.unwrap();

        assert_eq!(stats.uploaded, 1);
        assert_eq!(h.fetcher.call_count(), 0);
        assert!(!h.ledger.is_migrated("B").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_between_remote_fetches() {
        let h = Harness::new(
            vec![
                remote("R1", "a.jpg", None, true),
                remote("R2", "b.jpg", None, true),
            ],
            FakeFetcher::default(),
            FakeTarget::default(),
        );

        let start = tokio::time::Instant::now();
        let stats = h.run(&opts()).await.unwrap();

        assert_eq!(stats.uploaded, 2);
        assert!(start.elapsed() >= DEFAULT_FETCH_PAUSE);
        assert!(start.elapsed() < DEFAULT_FETCH_PAUSE * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_pause_after_failed_fetch() {
        let fetcher = FakeFetcher {
            fail_ids: ["R1".to_string()].into(),
            ..Default::default()
        };
        let h = Harness::new(
            vec![
                remote("R1", "a.jpg", None, true),
                remote("R2", "b.jpg", None, true),
            ],
            fetcher,
            FakeTarget::default(),
        );

        let start = tokio::time::Instant::now();
        h.run(&opts()).await.unwrap();
        assert!(start.elapsed() < DEFAULT_FETCH_PAUSE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_pause_for_local_copies() {
        let library = tempfile::tempdir().unwrap();
        let a = local_file(library.path(), "A.jpg");
        let b = local_file(library.path(), "B.jpg");
        let h = Harness::new(
            vec![local("A", &a, None), local("B", &b, None)],
            FakeFetcher::default(),
            FakeTarget::default(),
        );

        let start = tokio::time::Instant::now();
        let stats = h.run(&opts()).await.unwrap();
        assert_eq!(stats.uploaded, 2);
        assert!(start.elapsed() < DEFAULT_FETCH_PAUSE);
    }

    #[tokio::test]
    async fn test_shutdown_before_first_item() {
        let h = Harness::new(
            vec![remote("A", "a.jpg", None, true)],
            FakeFetcher::default(),
            FakeTarget::default(),
        );
        let token = CancellationToken::new();
        token.cancel();

        let stats = h.orchestrator.run(&opts(), token).await.unwrap();
        assert!(stats.interrupted);
        assert_eq!(h.fetcher.call_count(), 0);
        let last = h.ledger.stats().await.unwrap().last_run.unwrap();
        assert!(last.stats.interrupted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_interrupts_pause() {
        let h = Harness::new(
            vec![
                remote("R1", "a.jpg", None, true),
                remote("R2", "b.jpg", None, true),
            ],
            FakeFetcher::default(),
            FakeTarget::default(),
        );
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(10)).await;
            canceller.cancel();
        });

        let stats = h.orchestrator.run(&opts(), token).await.unwrap();
        assert!(stats.interrupted);
        assert_eq!(stats.uploaded, 1);
        assert_eq!(h.fetcher.call_count(), 1);
        assert!(!h.ledger.is_migrated("R2").await.unwrap());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(0)), "0s");
        assert_eq!(format_duration(Duration::from_secs(75)), "1m 15s");
        assert_eq!(format_duration(Duration::from_secs(5025)), "1h 23m 45s");
    }

    #[test]
    fn test_create_progress_bar_hidden_when_disabled() {
        let pb = create_progress_bar(true, 100);
        assert!(pb.is_hidden());
    }
}
