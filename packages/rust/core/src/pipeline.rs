//! End-to-end batch run: sample → download → extract → join → manifest.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};
use url::Url;

use ccjoin_extract::{CancelFlag, ExtractStats, Extraction};
use ccjoin_fetch::Fetcher;
use ccjoin_join::JoinStats;
use ccjoin_shared::{
    ArchiveKind, CcJoinError, ExtractedRecord, Result, RunConfig, RunId, RunMode,
};

use crate::layout::Layout;
use crate::manifest::{
    DownloadReport, DownloadStatus, FileReport, FileStatus, PairReport, RunManifest,
};
use crate::persist::{read_records, write_json_atomic};
use crate::sampling::{Sample, archive_url, file_name, sample_listing};

/// Result of [`run`].
#[derive(Debug)]
pub struct RunResult {
    pub manifest: RunManifest,
    pub manifest_path: PathBuf,
    pub elapsed: Duration,
}

impl RunResult {
    pub fn run_id(&self) -> &RunId {
        &self.manifest.run_id
    }

    /// Pages written across all joined outputs.
    pub fn joined_records(&self) -> usize {
        self.manifest.joins.iter().map(|p| p.stats.joined).sum()
    }
}

/// Progress callback for reporting run status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each download attempt.
    fn file_downloaded(&self, report: &DownloadReport, current: usize, total: usize);
    /// Called after each archive is extracted (or fails).
    fn file_extracted(&self, report: &FileReport, current: usize, total: usize);
    /// Called after each raw/derived pair is joined.
    fn pair_joined(&self, base: &str, stats: &JoinStats);
    /// Called when the run completes.
    fn done(&self, result: &RunResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn file_downloaded(&self, _report: &DownloadReport, _current: usize, _total: usize) {}
    fn file_extracted(&self, _report: &FileReport, _current: usize, _total: usize) {}
    fn pair_joined(&self, _base: &str, _stats: &JoinStats) {}
    fn done(&self, _result: &RunResult) {}
}

/// Archive kinds a mode touches, in processing order.
pub fn kinds_for(mode: RunMode) -> &'static [ArchiveKind] {
    match mode {
        RunMode::Both => &ArchiveKind::ALL,
        RunMode::WarcOnly => &[ArchiveKind::Warc],
        RunMode::WetOnly => &[ArchiveKind::Wet],
    }
}

/// Run the full batch.
///
/// 1. Sample each paths listing (all listings are validated before any download)
/// 2. Download the sampled archives
/// 3. Extract every archive in the index directories
/// 4. Join raw/derived output pairs (both-kinds mode only)
/// 5. Optionally remove the downloaded archives
/// 6. Write `run-manifest.json`
#[instrument(skip_all, fields(root = %config.root.display(), mode = ?config.mode))]
pub async fn run<F: Fetcher>(
    config: &RunConfig,
    fetcher: &F,
    progress: &dyn ProgressReporter,
) -> Result<RunResult> {
    let start = Instant::now();
    let layout = Layout::new(&config.root);
    let run_id = RunId::new();
    let mut manifest = RunManifest::new(run_id.clone(), config.mode, config.max_files, config.offset);

    info!(%run_id, max_files = config.max_files, offset = config.offset, "starting run");

    // --- Phase 1: Sampling ---
    progress.phase("Sampling path listings");
    let mut plans: Vec<(ArchiveKind, Sample)> = Vec::new();
    for &kind in kinds_for(config.mode) {
        let listing = layout.paths_listing(kind);
        if !listing.is_file() {
            return Err(CcJoinError::validation(format!(
                "paths listing not found: {}",
                listing.display()
            )));
        }
        let sample = sample_listing(&listing, config.max_files, config.offset)?;
        info!(%kind, total = sample.total, selected = sample.paths.len(), "sampled listing");
        plans.push((kind, sample));
    }

    // --- Phase 2: Download ---
    for (kind, sample) in &plans {
        progress.phase(&format!("Downloading {kind} archives"));
        let reports =
            download_sample(&layout, *kind, sample, &config.base_url, fetcher, progress).await?;
        manifest.downloads.extend(reports);
    }

    // --- Phase 3: Extract ---
    for &kind in kinds_for(config.mode) {
        progress.phase(&format!("Extracting {kind} archives"));
        let reports =
            extract_archives(&layout, kind, config.concurrency, config.file_timeout, progress)
                .await?;
        manifest.files.extend(reports);
    }

    // --- Phase 4: Join ---
    if config.mode == RunMode::Both {
        progress.phase("Joining raw and derived records");
        manifest.joins = join_pairs(&layout, progress).await?;
    }

    // --- Phase 5: Cleanup ---
    if config.delete_after {
        progress.phase("Removing downloaded archives");
        remove_scratch_dirs(&layout);
    }

    // --- Phase 6: Manifest ---
    let manifest_path = layout.manifest_path();
    manifest.finish(&manifest_path)?;

    let result = RunResult {
        manifest,
        manifest_path,
        elapsed: start.elapsed(),
    };

    info!(
        %run_id,
        files = result.manifest.files.len(),
        pairs = result.manifest.joins.len(),
        joined = result.joined_records(),
        elapsed_ms = result.elapsed.as_millis() as u64,
        "run complete"
    );

    progress.done(&result);
    Ok(result)
}

// ---------------------------------------------------------------------------
// Download
// ---------------------------------------------------------------------------

/// Fetch each sampled path into the kind's index directory.
///
/// Files already present are kept. A failed download is recorded and the
/// rest of the sample continues.
pub async fn download_sample<F: Fetcher>(
    layout: &Layout,
    kind: ArchiveKind,
    sample: &Sample,
    base_url: &Url,
    fetcher: &F,
    progress: &dyn ProgressReporter,
) -> Result<Vec<DownloadReport>> {
    let dir = layout.index_dir(kind);
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| CcJoinError::io(&dir, e))?;

    let total = sample.paths.len();
    let mut reports = Vec::with_capacity(total);

    for (i, path) in sample.paths.iter().enumerate() {
        let name = file_name(path).to_string();
        let dest = dir.join(&name);

        let (url, status) = match archive_url(base_url, path) {
            Err(e) => (path.clone(), DownloadStatus::Failed { error: e.to_string() }),
            Ok(url) if dest.exists() => {
                debug!(file = %name, "already downloaded");
                (url.to_string(), DownloadStatus::AlreadyPresent)
            }
            Ok(url) => match ccjoin_fetch::download(fetcher, &url, &dest).await {
                Ok(bytes) => (url.to_string(), DownloadStatus::Downloaded { bytes }),
                Err(e) => {
                    warn!(%url, error = %e, "download failed, skipping archive");
                    (url.to_string(), DownloadStatus::Failed { error: e.to_string() })
                }
            },
        };

        let report = DownloadReport {
            kind,
            url,
            file_name: name,
            status,
        };
        progress.file_downloaded(&report, i + 1, total);
        reports.push(report);
    }

    Ok(reports)
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Extract every archive of `kind` found in its index directory.
///
/// Each file runs on a blocking worker; at most `concurrency` run at once.
/// A file that fails or exceeds `file_timeout` leaves no output behind.
#[instrument(skip_all, fields(kind = %kind))]
pub async fn extract_archives(
    layout: &Layout,
    kind: ArchiveKind,
    concurrency: usize,
    file_timeout: Option<Duration>,
    progress: &dyn ProgressReporter,
) -> Result<Vec<FileReport>> {
    let archives = layout.list_archives(kind)?;
    let total = archives.len();
    info!(total, concurrency, "extracting archives");

    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut handles = Vec::with_capacity(total);

    for archive in archives {
        let name = display_name(&archive);
        let output = layout.json_output(kind, &name);
        let sem = semaphore.clone();

        let handle = tokio::spawn(async move {
            let Ok(_permit) = sem.acquire_owned().await else {
                return FileReport::failed(kind, display_name(&archive), "worker pool closed");
            };
            extract_archive(kind, &archive, &output, file_timeout).await
        });
        handles.push((name, handle));
    }

    let mut reports = Vec::with_capacity(total);
    for (i, (name, handle)) in handles.into_iter().enumerate() {
        let report = match handle.await {
            Ok(report) => report,
            Err(e) => {
                warn!(file = %name, error = %e, "extraction task panicked");
                FileReport::failed(kind, name, format!("worker failed: {e}"))
            }
        };
        progress.file_extracted(&report, i + 1, total);
        reports.push(report);
    }

    Ok(reports)
}

/// Extract one archive and write its records to `output`.
///
/// Never returns an error: every failure is described in the report.
pub async fn extract_archive(
    kind: ArchiveKind,
    archive: &Path,
    output: &Path,
    file_timeout: Option<Duration>,
) -> FileReport {
    let name = display_name(archive);
    let cancel = CancelFlag::new();

    let mut task = tokio::task::spawn_blocking({
        let archive = archive.to_path_buf();
        let cancel = cancel.clone();
        move || ccjoin_extract::extract_file_until(kind, &archive, &cancel)
    });

    let joined = match file_timeout {
        Some(limit) => match tokio::time::timeout(limit, &mut task).await {
            Ok(joined) => joined,
            Err(_) => {
                cancel.cancel();
                // The worker stops at the next record boundary; wait so it
                // never outlives its concurrency slot.
                let _ = task.await;
                let after_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX);
                warn!(file = %name, after_ms, "extraction timed out, discarding");
                return FileReport {
                    kind,
                    file_name: name,
                    status: FileStatus::TimedOut { after_ms },
                    stats: None,
                    output: None,
                };
            }
        },
        None => task.await,
    };

    let Extraction { records, stats, .. } = match joined {
        Ok(Ok(extraction)) => extraction,
        Ok(Err(e)) => {
            warn!(file = %name, error = %e, "extraction failed");
            return FileReport::failed(kind, name, e.to_string());
        }
        Err(e) => {
            warn!(file = %name, error = %e, "extraction worker failed");
            return FileReport::failed(kind, name, format!("worker failed: {e}"));
        }
    };

    if stats.truncated {
        warn!(file = %name, emitted = stats.emitted, "archive truncated, keeping partial output");
    }

    let written = tokio::task::spawn_blocking({
        let output = output.to_path_buf();
        move || write_json_atomic(&output, &records)
    })
    .await;

    match written {
        Ok(Ok(meta)) => {
            info!(file = %name, emitted = stats.emitted, skipped = stats.skipped(), "archive extracted");
            FileReport {
                kind,
                file_name: name,
                status: FileStatus::Extracted,
                stats: Some(stats),
                output: Some(meta),
            }
        }
        Ok(Err(e)) => FileReport::failed_with_stats(kind, name, e.to_string(), stats),
        Err(e) => FileReport::failed_with_stats(kind, name, format!("worker failed: {e}"), stats),
    }
}

impl FileReport {
    fn failed(kind: ArchiveKind, file_name: String, error: impl Into<String>) -> Self {
        Self {
            kind,
            file_name,
            status: FileStatus::Failed {
                error: error.into(),
            },
            stats: None,
            output: None,
        }
    }

    fn failed_with_stats(
        kind: ArchiveKind,
        file_name: String,
        error: String,
        stats: ExtractStats,
    ) -> Self {
        warn!(file = %file_name, %error, "could not write extraction output");
        Self {
            stats: Some(stats),
            ..Self::failed(kind, file_name, error)
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

// ---------------------------------------------------------------------------
// Join
// ---------------------------------------------------------------------------

/// Join every base name with output for both kinds into `combined_json_data`.
///
/// A pair whose inputs cannot be read is logged and skipped.
#[instrument(skip_all, fields(root = %layout.root().display()))]
pub async fn join_pairs(layout: &Layout, progress: &dyn ProgressReporter) -> Result<Vec<PairReport>> {
    let bases = layout.paired_bases()?;
    info!(pairs = bases.len(), "joining extraction outputs");

    let mut reports = Vec::with_capacity(bases.len());
    for base in bases {
        let joined = tokio::task::spawn_blocking({
            let layout = layout.clone();
            let base = base.clone();
            move || join_pair(&layout, &base)
        })
        .await;

        match joined {
            Ok(Ok(report)) => {
                progress.pair_joined(&report.base, &report.stats);
                reports.push(report);
            }
            Ok(Err(e)) => warn!(%base, error = %e, "join failed, skipping pair"),
            Err(e) => warn!(%base, error = %e, "join worker failed, skipping pair"),
        }
    }

    Ok(reports)
}

/// Join one raw/derived output pair.
pub fn join_pair(layout: &Layout, base: &str) -> Result<PairReport> {
    let file = format!("{base}.json");
    let raw: Vec<ExtractedRecord> = read_records(&layout.json_dir(ArchiveKind::Warc).join(&file))?;
    let derived: Vec<ExtractedRecord> =
        read_records(&layout.json_dir(ArchiveKind::Wet).join(&file))?;

    let join = ccjoin_join::join_records(&raw, &derived);
    let output = write_json_atomic(&layout.combined_output(base), &join.records)?;

    info!(
        %base,
        raw = join.stats.raw_records,
        derived = join.stats.derived_records,
        joined = join.stats.joined,
        "pair joined"
    );
    if join.stats.duplicate_derived_keys > 0 {
        warn!(%base, duplicates = join.stats.duplicate_derived_keys, "derived output repeats keys; last entry kept");
    }

    Ok(PairReport {
        base: base.to_string(),
        stats: join.stats,
        output,
    })
}

/// Join outputs already on disk under `root`, without downloading or extracting.
pub async fn join_existing(root: &Path, progress: &dyn ProgressReporter) -> Result<Vec<PairReport>> {
    progress.phase("Joining raw and derived records");
    join_pairs(&Layout::new(root), progress).await
}

// ---------------------------------------------------------------------------
// Cleanup
// ---------------------------------------------------------------------------

fn remove_scratch_dirs(layout: &Layout) {
    for dir in layout.scratch_dirs() {
        if !dir.exists() {
            continue;
        }
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => info!(dir = %dir.display(), "removed download directory"),
            Err(e) => warn!(dir = %dir.display(), error = %e, "could not remove download directory"),
        }
    }
}
