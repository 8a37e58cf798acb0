use crate::url::{DEFAULT_ARCHIVE_ROOT, DEFAULT_EXCLUDE_PATHS, DEFAULT_PRIORITY_PATHS};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for Wayback-Archiver
///
/// Every section is optional; missing sections fall back to defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub archive: ArchiveConfig,
    pub crawler: CrawlerConfig,
    pub downloader: DownloaderConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    pub paths: PathsConfig,
}

/// Archive endpoints
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Archive root, e.g. `https://web.archive.org`
    pub root: String,

    /// Capture index endpoint; derived from `root` when absent
    #[serde(rename = "cdx-endpoint")]
    pub cdx_endpoint: Option<String>,

    /// Rows requested per index page
    #[serde(rename = "cdx-page-size")]
    pub cdx_page_size: u32,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            root: DEFAULT_ARCHIVE_ROOT.to_string(),
            cdx_endpoint: None,
            cdx_page_size: 1000,
        }
    }
}

impl ArchiveConfig {
    /// Returns the capture index endpoint
    pub fn cdx_endpoint(&self) -> String {
        self.cdx_endpoint
            .clone()
            .unwrap_or_else(|| format!("{}/cdx/search/cdx", self.root.trim_end_matches('/')))
    }
}

/// Recursive crawler behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Maximum traversal depth (0 = start page only)
    #[serde(rename = "max-depth")]
    pub max_depth: u32,

    /// Maximum number of pages collected in one run
    #[serde(rename = "max-pages")]
    pub max_pages: usize,

    /// Steady-state request rate
    #[serde(rename = "requests-per-second")]
    pub requests_per_second: f64,

    /// Requests allowed inside one burst window before the penalty delay
    #[serde(rename = "burst-limit")]
    pub burst_limit: u32,

    /// Per-request timeout in seconds
    #[serde(rename = "request-timeout-secs")]
    pub request_timeout_secs: u64,

    /// Save resumable state every N newly found pages (0 disables)
    #[serde(rename = "checkpoint-interval")]
    pub checkpoint_interval: usize,

    /// Load prior state and skip pages already on disk
    pub resume: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_depth: 4,
            max_pages: 500,
            requests_per_second: 0.5,
            burst_limit: 3,
            request_timeout_secs: 30,
            checkpoint_interval: 50,
            resume: true,
        }
    }
}

impl CrawlerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Batch downloader behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DownloaderConfig {
    /// Maximum requests in flight
    #[serde(rename = "max-concurrent")]
    pub max_concurrent: usize,

    /// Steady-state request rate shared by all workers
    #[serde(rename = "requests-per-second")]
    pub requests_per_second: f64,

    /// Skip records whose destination file already exists
    pub resume: bool,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 3,
            requests_per_second: 0.5,
            resume: true,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "UkrainePoliticalAnalyzer".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: "https://github.com/wayback-archiver".to_string(),
        }
    }
}

impl UserAgentConfig {
    /// Formats the header value: `Mozilla/5.0 (compatible; Name/Version; +url)`
    pub fn header_value(&self) -> String {
        format!(
            "Mozilla/5.0 (compatible; {}/{}; +{})",
            self.crawler_name, self.crawler_version, self.contact_url
        )
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Root of the on-disk archive tree
    #[serde(rename = "base-dir")]
    pub base_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("./archive_data"),
        }
    }
}

/// Priority and exclusion path lists
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Substrings marking sections visited first
    pub priority: Vec<String>,

    /// Substrings marking URLs never fetched
    pub exclude: Vec<String>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            priority: DEFAULT_PRIORITY_PATHS.iter().map(|s| s.to_string()).collect(),
            exclude: DEFAULT_EXCLUDE_PATHS.iter().map(|s| s.to_string()).collect(),
        }
    }
}
