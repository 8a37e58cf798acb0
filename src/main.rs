//! Wayback-Archiver main entry point
//!
//! This is the command-line interface for the Wayback-Archiver snapshot crawler.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use wayback_archiver::config::{load_config_with_hash, rate_from_delay, validate, Config};
use wayback_archiver::crawler::{
    build_http_client, load_records, parse_batch_date, parse_target_date, BatchDownloader,
    SiteCrawler, SnapshotFinder,
};
use wayback_archiver::output::{print_batch_summary, print_run_summary};
use wayback_archiver::storage::open_storage;
use wayback_archiver::ArchiveError;

/// Wayback-Archiver: historical snapshot crawler for political websites
///
/// Finds the archived capture of a site nearest a date and archives the
/// pages of that snapshot, or downloads a prepared list of captures.
#[derive(Parser, Debug)]
#[command(name = "wayback-archiver")]
#[command(version)]
#[command(about = "Archive historical snapshots of political websites", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (defaults are used when omitted)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List archived captures of a domain
    Snapshots {
        /// Domain or URL to look up
        domain: String,

        /// Number of captures to show
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Check that the archive index is reachable
    Test,

    /// Crawl the snapshot of a site nearest a target date
    Crawl {
        /// Live URL of the site
        site_url: String,

        /// Target date (YYYY-MM-DD)
        #[arg(long)]
        target_date: Option<String>,

        /// Output directory
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Maximum number of pages
        #[arg(long)]
        max_pages: Option<usize>,

        /// Maximum link depth
        #[arg(long)]
        max_depth: Option<u32>,

        /// Seconds between requests
        #[arg(long, value_name = "SECONDS")]
        rate_limit: Option<f64>,

        /// Ignore saved state and pages already on disk
        #[arg(long)]
        fresh: bool,
    },

    /// Download a prepared list of captures for one domain and date
    Download {
        /// JSON file with capture records
        input: PathBuf,

        /// Domain directory to save into
        #[arg(long)]
        domain: String,

        /// Target date (YYYYMMDD)
        #[arg(long)]
        date: String,

        /// Output directory
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Seconds between requests
        #[arg(long, value_name = "SECONDS")]
        rate_limit: Option<f64>,

        /// Maximum concurrent downloads
        #[arg(long)]
        max_concurrent: Option<usize>,

        /// Download records even if already saved
        #[arg(long)]
        no_resume: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let config = load_configuration(cli.config.as_deref())?;

    let result = match cli.command {
        Command::Snapshots { domain, limit } => handle_snapshots(&config, &domain, limit).await,
        Command::Test => handle_test(&config).await,
        Command::Crawl {
            site_url,
            target_date,
            output_dir,
            max_pages,
            max_depth,
            rate_limit,
            fresh,
        } => {
            let mut config = config;
            if let Some(dir) = output_dir {
                config.output.base_dir = dir;
            }
            if let Some(pages) = max_pages {
                config.crawler.max_pages = pages;
            }
            if let Some(depth) = max_depth {
                config.crawler.max_depth = depth;
            }
            if let Some(delay) = rate_limit {
                config.crawler.requests_per_second = rate_from_delay(delay)?;
            }
            if fresh {
                config.crawler.resume = false;
            }
            handle_crawl(config, &site_url, target_date.as_deref()).await
        }
        Command::Download {
            input,
            domain,
            date,
            output_dir,
            rate_limit,
            max_concurrent,
            no_resume,
        } => {
            let mut config = config;
            if let Some(dir) = output_dir {
                config.output.base_dir = dir;
            }
            if let Some(delay) = rate_limit {
                config.downloader.requests_per_second = rate_from_delay(delay)?;
            }
            if let Some(n) = max_concurrent {
                config.downloader.max_concurrent = n;
            }
            if no_resume {
                config.downloader.resume = false;
            }
            handle_download(config, &input, &domain, &date).await
        }
    };

    match result {
        Err(e) if matches!(e.downcast_ref::<ArchiveError>(), Some(ArchiveError::Interrupted)) => {
            tracing::warn!("Aborted by user");
            eprintln!("Aborted");
            std::process::exit(130);
        }
        other => other,
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("wayback_archiver=info,warn"),
            1 => EnvFilter::new("wayback_archiver=debug,info"),
            2 => EnvFilter::new("wayback_archiver=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn load_configuration(path: Option<&Path>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        tracing::debug!("No configuration file given, using defaults");
        return Ok(Config::default());
    };

    tracing::info!("Loading configuration from: {}", path.display());
    let (config, hash) = load_config_with_hash(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);
    Ok(config)
}

fn finder(config: &Config) -> anyhow::Result<SnapshotFinder> {
    let client = build_http_client(&config.user_agent, config.crawler.request_timeout())?;
    Ok(SnapshotFinder::from_config(client, config)?)
}

/// Handles `snapshots`: lists the first captures of a domain
async fn handle_snapshots(config: &Config, domain: &str, limit: usize) -> anyhow::Result<()> {
    let snapshots = finder(config)?.list_snapshots(domain, limit).await?;

    if snapshots.is_empty() {
        println!("No snapshots found for {}", domain);
        return Ok(());
    }

    println!("Snapshots of {} ({}):", domain, snapshots.len());
    for url in &snapshots {
        println!("  {}", url);
    }
    Ok(())
}

/// Handles `test`: probes the archive index
async fn handle_test(config: &Config) -> anyhow::Result<()> {
    println!("Testing connection to {}...", config.archive.root);

    if finder(config)?.test_connection().await {
        println!("✓ Archive is reachable");
        Ok(())
    } else {
        anyhow::bail!("archive at {} is not reachable", config.archive.root)
    }
}

/// Tracks which progress milestones were already reported
///
/// The crawl callback fires before every fetch, so the found count repeats
/// while pages fail or are skipped.
struct ProgressMilestones {
    every: usize,
    last: usize,
}

impl ProgressMilestones {
    fn new(every: usize) -> Self {
        Self { every: every.max(1), last: 0 }
    }

    /// Returns true the first time `found` lands on a new multiple of `every`
    fn reached(&mut self, found: usize) -> bool {
        if found == 0 || found % self.every != 0 || found == self.last {
            return false;
        }
        self.last = found;
        true
    }
}

/// Handles `crawl`: archives the snapshot nearest the target date
async fn handle_crawl(config: Config, site_url: &str, target_date: Option<&str>) -> anyhow::Result<()> {
    validate(&config)?;
    let target = target_date.map(parse_target_date).transpose()?;

    let storage = Arc::new(open_storage(&config.output.base_dir)?);
    tracing::info!(
        "Max pages: {}, max depth: {}, output: {}",
        config.crawler.max_pages,
        config.crawler.max_depth,
        config.output.base_dir.display()
    );

    let mut progress = ProgressMilestones::new(10);
    let mut crawler = SiteCrawler::new(&config, storage)?.with_progress(move |found, max| {
        if progress.reached(found) {
            tracing::info!("Progress: {}/{} pages", found, max);
        }
    });

    let summary = tokio::select! {
        result = crawler.crawl(site_url, target) => result?,
        _ = tokio::signal::ctrl_c() => return Err(ArchiveError::Interrupted.into()),
    };

    print_run_summary(&summary);
    Ok(())
}

/// Handles `download`: fetches a prepared capture list
async fn handle_download(config: Config, input: &Path, domain: &str, date: &str) -> anyhow::Result<()> {
    validate(&config)?;
    parse_batch_date(date)?;

    let records = load_records(input)
        .with_context(|| format!("Failed to read capture list {}", input.display()))?;
    tracing::info!("Loaded {} records from {}", records.len(), input.display());

    let storage = Arc::new(open_storage(&config.output.base_dir)?);
    let downloader = BatchDownloader::new(&config, storage)?;

    let summary = downloader.download(domain, date, records).await?;
    print_batch_summary(&summary);
    Ok(())
}
