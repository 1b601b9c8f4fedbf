//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use url::Url;

use ccjoin_core::pipeline::{self, ProgressReporter, RunResult};
use ccjoin_core::{DownloadReport, DownloadStatus, FileReport, FileStatus, JoinStats};
use ccjoin_fetch::{FetchOptions, HttpFetcher};
use ccjoin_shared::{AppConfig, ArchiveKind, RunConfig, RunMode, init_config, load_config};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// ccjoin: English raw/derived page pairs from Common Crawl.
#[derive(Parser)]
#[command(
    name = "ccjoin",
    version,
    about = "Sample Common Crawl archives and join English raw HTML with its extracted text.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Sample, download, extract and join archives under a data root.
    Run(RunArgs),

    /// Extract English pages from a single local archive.
    Extract {
        /// Archive file (`*.warc.gz` or `*.warc.wet.gz`).
        archive: PathBuf,

        /// Archive kind; inferred from the file name when omitted.
        #[arg(long)]
        kind: Option<ArchiveKind>,

        /// Output JSON file (defaults to `<base>.json` next to the archive).
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Join extraction outputs already present under a data root.
    Join {
        /// Data root holding `warc_json_data/` and `wet_json_data/`.
        #[arg(long)]
        path: PathBuf,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Flags for `ccjoin run`. Unset values fall back to the config file.
#[derive(clap::Args, Debug)]
pub(crate) struct RunArgs {
    /// Data root containing `warc.paths.gz` / `wet.paths.gz`.
    #[arg(long)]
    pub path: PathBuf,

    /// Maximum number of archives to sample per kind.
    #[arg(long)]
    pub max_files: Option<usize>,

    /// Offset within each sampling interval.
    #[arg(long)]
    pub offset: Option<usize>,

    /// Only process raw-capture (WARC) archives.
    #[arg(long, conflicts_with = "wet")]
    pub warc: bool,

    /// Only process derived-text (WET) archives.
    #[arg(long)]
    pub wet: bool,

    /// Remove downloaded archives after processing.
    #[arg(long)]
    pub delete_after: bool,

    /// Archives extracted in parallel.
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Download prefix (overrides `download.base_url`).
    #[arg(long)]
    pub base_url: Option<String>,
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "ccjoin=info",
        1 => "ccjoin=debug",
        _ => "ccjoin=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run(args) => cmd_run(&args).await,
        Command::Extract { archive, kind, out } => cmd_extract(&archive, kind, out).await,
        Command::Join { path } => cmd_join(&path).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(args: &RunArgs) -> Result<()> {
    let config = load_config()?;
    let run_config = resolve_run_config(&config, args)?;

    let fetcher = HttpFetcher::new(&FetchOptions::from(&config.download))?;

    info!(
        root = %run_config.root.display(),
        mode = ?run_config.mode,
        max_files = run_config.max_files,
        offset = run_config.offset,
        "starting batch run"
    );

    let reporter = CliProgress::new();
    let result = pipeline::run(&run_config, &fetcher, &reporter).await?;

    let manifest = &result.manifest;
    let failed_downloads = manifest
        .downloads
        .iter()
        .filter(|d| matches!(d.status, DownloadStatus::Failed { .. }))
        .count();
    let extracted = manifest.files.iter().filter(|f| f.is_extracted()).count();
    let truncated = manifest
        .files
        .iter()
        .filter(|f| f.stats.as_ref().is_some_and(|s| s.truncated))
        .count();

    println!();
    println!("  Run complete");
    println!("  ID:         {}", result.run_id());
    println!(
        "  Downloads:  {} ({} failed)",
        manifest.downloads.len(),
        failed_downloads
    );
    println!(
        "  Archives:   {extracted}/{} extracted ({truncated} truncated)",
        manifest.files.len()
    );
    println!("  Pairs:      {}", manifest.joins.len());
    println!("  Joined:     {}", result.joined_records());
    println!("  Manifest:   {}", result.manifest_path.display());
    println!("  Time:       {:.1}s", result.elapsed.as_secs_f64());
    println!();

    Ok(())
}

/// Merge config file values with CLI flags (flags win).
fn resolve_run_config(config: &AppConfig, args: &RunArgs) -> Result<RunConfig> {
    let mut run_config = RunConfig::from_app(config, &args.path)?;

    if let Some(max_files) = args.max_files {
        run_config.max_files = max_files;
    }
    if let Some(offset) = args.offset {
        run_config.offset = offset;
    }
    if let Some(concurrency) = args.concurrency {
        run_config.concurrency = concurrency.max(1);
    }
    if let Some(base_url) = &args.base_url {
        run_config.base_url =
            Url::parse(base_url).map_err(|e| eyre!("invalid --base-url '{base_url}': {e}"))?;
    }
    run_config.mode = match (args.warc, args.wet) {
        (true, _) => RunMode::WarcOnly,
        (_, true) => RunMode::WetOnly,
        _ => RunMode::Both,
    };
    run_config.delete_after = args.delete_after;

    Ok(run_config)
}

async fn cmd_extract(archive: &Path, kind: Option<ArchiveKind>, out: Option<PathBuf>) -> Result<()> {
    let file_name = archive
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| eyre!("'{}' is not a file path", archive.display()))?;

    let kind = match kind {
        Some(kind) => kind,
        None => infer_kind(file_name)?,
    };
    let out = out.unwrap_or_else(|| default_output(archive, file_name));

    info!(archive = %archive.display(), %kind, out = %out.display(), "extracting archive");

    let report = pipeline::extract_archive(kind, archive, &out, None).await;
    match &report.status {
        FileStatus::Extracted => {}
        FileStatus::Failed { error } => return Err(eyre!("extraction failed: {error}")),
        FileStatus::TimedOut { after_ms } => {
            return Err(eyre!("extraction timed out after {after_ms}ms"));
        }
    }

    if let Some(stats) = &report.stats {
        println!("{}", serde_json::to_string_pretty(stats)?);
    }
    println!("Wrote {}", out.display());
    Ok(())
}

fn infer_kind(file_name: &str) -> Result<ArchiveKind> {
    ArchiveKind::ALL
        .into_iter()
        .find(|kind| kind.matches_file_name(file_name))
        .ok_or_else(|| eyre!("cannot tell the archive kind of '{file_name}'; pass --kind"))
}

fn default_output(archive: &Path, file_name: &str) -> PathBuf {
    let base = ccjoin_shared::archive_base_name(file_name);
    archive.with_file_name(format!("{base}.json"))
}

async fn cmd_join(path: &Path) -> Result<()> {
    if !path.is_dir() {
        return Err(eyre!("data root '{}' is not a directory", path.display()));
    }

    let reporter = CliProgress::new();
    let reports = pipeline::join_existing(path, &reporter).await?;
    reporter.spinner.finish_and_clear();

    if reports.is_empty() {
        println!("No raw/derived output pairs found under {}", path.display());
        return Ok(());
    }

    println!();
    for report in &reports {
        println!(
            "  {}: {} joined ({} raw, {} derived, {} without text)",
            report.base,
            report.stats.joined,
            report.stats.raw_records,
            report.stats.derived_records,
            report.stats.missing_correlates
        );
    }
    println!();

    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn file_downloaded(&self, report: &DownloadReport, current: usize, total: usize) {
        let note = match report.status {
            DownloadStatus::Downloaded { .. } => "",
            DownloadStatus::AlreadyPresent => " (cached)",
            DownloadStatus::Failed { .. } => " (failed)",
        };
        self.spinner.set_message(format!(
            "Downloading [{current}/{total}] {}{note}",
            report.file_name
        ));
    }

    fn file_extracted(&self, report: &FileReport, current: usize, total: usize) {
        let emitted = report.stats.as_ref().map_or(0, |s| s.emitted);
        self.spinner.set_message(format!(
            "Extracting [{current}/{total}] {} ({emitted} pages)",
            report.file_name
        ));
    }

    fn pair_joined(&self, base: &str, stats: &JoinStats) {
        self.spinner
            .set_message(format!("Joined {base}: {} pages", stats.joined));
    }

    fn done(&self, _result: &RunResult) {
        self.spinner.finish_and_clear();
    }
}
