//! Batch download of a prepared capture list
//!
//! Unlike the site crawler, the downloader does no link discovery: it takes
//! a flat list of captures for one `(domain, date)` pair and fetches them
//! concurrently. Failed captures are retried once, at half the rate.

use crate::config::Config;
use crate::crawler::limiter::RateLimiter;
use crate::crawler::parser::parse_html;
use crate::crawler::{build_http_client, fetch_url, FetchResult};
use crate::output::{bytes_to_mb, round_to, BatchCounters, BatchManifest, BatchSummary};
use crate::storage::{Storage, StorageResult};
use crate::{ArchiveError, Result};
use chrono::{NaiveDate, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::hash::Hash;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Log a progress line every this many records
const PROGRESS_EVERY: usize = 10;

/// One capture of a prepared batch
///
/// Fields other than the three required ones are kept as given and copied
/// into page metadata and the manifest sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub archive_url: String,
    pub original_url: String,
    pub timestamp: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SnapshotRecord {
    pub fn new(archive_url: &str, original_url: &str, timestamp: &str) -> Self {
        Self {
            archive_url: archive_url.to_string(),
            original_url: original_url.to_string(),
            timestamp: timestamp.to_string(),
            extra: Map::new(),
        }
    }

    fn extra_or(&self, key: &str, default: Value) -> Value {
        self.extra.get(key).cloned().unwrap_or(default)
    }

    /// Sidecar metadata for a downloaded page
    fn page_metadata(&self, content: &str) -> Value {
        let parsed = parse_html(content);

        json!({
            "archive_url": self.archive_url,
            "original_url": self.original_url,
            "timestamp": self.timestamp,
            "title": parsed.title,
            "content_length": content.len(),
            "content_length_mb": round_to(bytes_to_mb(content.len()), 3),
            "statuscode": self.extra_or("statuscode", Value::from("200")),
            "size": self.extra_or("size", Value::from(0)),
            "days_diff": self.extra_or("days_diff", Value::from(0)),
            "downloaded_at": Utc::now().to_rfc3339(),
            "extracted_links": parsed.links_found,
            "extracted_images": parsed.images_found,
        })
    }
}

/// Loads a JSON array of capture records
pub fn load_records(path: &Path) -> Result<Vec<SnapshotRecord>> {
    let content = std::fs::read_to_string(path)?;
    let records = serde_json::from_str(&content)?;
    Ok(records)
}

/// Validates a `YYYYMMDD` batch date
pub fn parse_batch_date(value: &str) -> Result<NaiveDate> {
    let invalid = || ArchiveError::InvalidDate {
        value: value.to_string(),
        expected: "YYYYMMDD",
    };

    if value.len() != 8 || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    NaiveDate::parse_from_str(value, "%Y%m%d").map_err(|_| invalid())
}

/// Drops records that map to a key already seen, keeping the first
///
/// The key is the file a record would be saved to, so originals that differ
/// only in ways the filename drops (scheme, `/` against `_`) count as one page.
fn dedupe<K, F>(records: Vec<SnapshotRecord>, mut key: F) -> StorageResult<Vec<SnapshotRecord>>
where
    K: Eq + Hash,
    F: FnMut(&SnapshotRecord) -> StorageResult<K>,
{
    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(records.len());

    for record in records {
        if seen.insert(key(&record)?) {
            unique.push(record);
        } else {
            tracing::warn!(
                "Skipping {}: same destination as an earlier record",
                record.original_url
            );
        }
    }
    Ok(unique)
}

/// Outcome of one batch pass
#[derive(Debug, Default)]
struct PassResult {
    successful: usize,
    bytes: usize,
    failed: Vec<SnapshotRecord>,
    lost: usize,
}

/// Concurrent downloader for prepared capture lists
pub struct BatchDownloader {
    client: Client,
    limiter: RateLimiter,
    storage: Arc<dyn Storage>,
    max_concurrent: usize,
    resume: bool,
}

impl BatchDownloader {
    /// Creates a downloader from configuration
    pub fn new(config: &Config, storage: Arc<dyn Storage>) -> Result<Self> {
        let client = build_http_client(&config.user_agent, config.crawler.request_timeout())?;
        let limiter = RateLimiter::new(
            config.downloader.requests_per_second,
            config.crawler.burst_limit,
        );

        Ok(Self {
            client,
            limiter,
            storage,
            max_concurrent: config.downloader.max_concurrent.max(1),
            resume: config.downloader.resume,
        })
    }

    /// Replaces the rate limiter shared by all workers
    pub fn with_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    /// Downloads a batch, aborting with [`ArchiveError::Interrupted`] on Ctrl-C
    ///
    /// Requests already in flight are cancelled when the batch is dropped.
    pub async fn download(
        &self,
        domain: &str,
        date: &str,
        records: Vec<SnapshotRecord>,
    ) -> Result<BatchSummary> {
        tokio::select! {
            result = self.download_batch(domain, date, records) => result,
            _ = tokio::signal::ctrl_c() => {
                tracing::warn!("Interrupted, abandoning batch for {} on {}", domain, date);
                Err(ArchiveError::Interrupted)
            }
        }
    }

    /// Downloads every record of a `(domain, date)` batch
    ///
    /// # Flow
    ///
    /// 1. Drop records sharing a destination file and, when resuming, records already on disk
    /// 2. Fetch the rest with at most `max_concurrent` requests in flight
    /// 3. Retry failures once with the limiter delay doubled
    /// 4. Write the manifest and return the summary
    pub async fn download_batch(
        &self,
        domain: &str,
        date: &str,
        records: Vec<SnapshotRecord>,
    ) -> Result<BatchSummary> {
        let started = Instant::now();

        // Rejects unsafe directory keys before any request is sent
        self.storage.batch_page_path(domain, date, domain)?;

        let records = dedupe(records, |r| {
            self.storage.batch_page_path(domain, date, &r.original_url)
        })?;
        tracing::info!(
            "Downloading {} snapshots for {} on {}",
            records.len(),
            domain,
            date
        );

        let mut counters = BatchCounters::default();
        let pending: Vec<SnapshotRecord> = if self.resume {
            let (existing, pending): (Vec<_>, Vec<_>) = records
                .iter()
                .cloned()
                .partition(|r| self.storage.batch_page_exists(domain, date, &r.original_url));
            counters.skipped = existing.len();
            tracing::info!("Resume: {} already saved, {} to download", existing.len(), pending.len());
            pending
        } else {
            records.clone()
        };

        let total_attempted = pending.len();
        if pending.is_empty() {
            tracing::info!("All pages already downloaded");
        } else {
            let main = self.run_pass(domain, date, pending).await;
            counters.successful = main.successful;
            counters.total_bytes = main.bytes;
            counters.failed = main.failed.len() + main.lost;

            if !main.failed.is_empty() {
                let retry = self.retry_pass(domain, date, main.failed).await;
                counters.successful += retry.successful;
                counters.total_bytes += retry.bytes;
                counters.failed = retry.failed.len() + retry.lost + main.lost;
            }
        }

        let summary = BatchSummary::build(domain, date, total_attempted, &counters, started.elapsed());

        let sample = records.iter().filter_map(|r| serde_json::to_value(r).ok());
        let manifest = BatchManifest::build(&summary, records.len(), sample);
        if let Err(e) = self.storage.save_manifest(domain, date, &manifest) {
            tracing::error!("Failed to save manifest: {}", e);
        }

        tracing::info!(
            "Batch finished: {} successful, {} failed, {} skipped",
            summary.successful,
            summary.failed,
            summary.skipped
        );
        Ok(summary)
    }

    /// The single retry generation: doubled delay, no further retries
    async fn retry_pass(&self, domain: &str, date: &str, failed: Vec<SnapshotRecord>) -> PassResult {
        tracing::info!("Retrying {} failed downloads", failed.len());

        let original = self.limiter.delay().await;
        self.limiter.set_delay(original.saturating_mul(2)).await;
        self.limiter.reset().await;
        let result = self.run_pass(domain, date, failed).await;
        self.limiter.set_delay(original).await;

        tracing::info!("Retry pass: {} successful", result.successful);
        result
    }

    async fn run_pass(&self, domain: &str, date: &str, records: Vec<SnapshotRecord>) -> PassResult {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let total = records.len();
        let mut tasks = JoinSet::new();

        for (index, record) in records.into_iter().enumerate() {
            let worker = Worker {
                client: self.client.clone(),
                limiter: self.limiter.clone(),
                storage: Arc::clone(&self.storage),
                semaphore: Arc::clone(&semaphore),
                domain: domain.to_string(),
                date: date.to_string(),
            };
            let position = index + 1;

            tasks.spawn(async move {
                if position == 1 || position % PROGRESS_EVERY == 0 {
                    tracing::info!("[{}/{}] Downloading {}", position, total, record.original_url);
                }
                let outcome = worker.download(&record).await;
                (record, outcome)
            });
        }

        let mut result = PassResult::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Some(bytes))) => {
                    result.successful += 1;
                    result.bytes += bytes;
                }
                Ok((record, None)) => result.failed.push(record),
                Err(e) => {
                    tracing::error!("Download task failed: {}", e);
                    result.lost += 1;
                }
            }
        }

        result
    }
}

/// Per-task handles of one download
struct Worker {
    client: Client,
    limiter: RateLimiter,
    storage: Arc<dyn Storage>,
    semaphore: Arc<Semaphore>,
    domain: String,
    date: String,
}

impl Worker {
    /// Returns the saved byte count, or `None` if the record should be retried
    async fn download(&self, record: &SnapshotRecord) -> Option<usize> {
        let _permit = self.semaphore.acquire().await.ok()?;
        self.limiter.wait_if_needed().await;

        let body = match fetch_url(&self.client, &record.archive_url).await {
            FetchResult::Success { body, .. } => body,
            FetchResult::HttpError { status_code } => {
                tracing::warn!("HTTP {} for {}", status_code, record.archive_url);
                return None;
            }
            FetchResult::NetworkError { error, .. } => {
                tracing::warn!("Request failed for {}: {}", record.archive_url, error);
                return None;
            }
        };

        let metadata = record.page_metadata(&body);
        match self.storage.save_batch_page(
            &self.domain,
            &self.date,
            &record.original_url,
            &body,
            &metadata,
        ) {
            Ok(_) => Some(body.len()),
            Err(e) => {
                tracing::error!("Failed to save {}: {}", record.original_url, e);
                None
            }
        }
    }
}
