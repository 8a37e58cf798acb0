//! Run summaries and batch manifests
//!
//! These are derived once at the end of a run from the run's records and
//! written as pretty-printed JSON.

use crate::state::{FailureRecord, PageRecord};
use crate::url::ArchivedPageRef;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Number of skipped URLs kept in a crawl summary
pub const SKIPPED_SAMPLE: usize = 50;

/// Number of input records copied into a batch manifest
pub const MANIFEST_SAMPLE: usize = 10;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Rounds to `places` decimal places
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Bytes to megabytes
pub fn bytes_to_mb(bytes: usize) -> f64 {
    bytes as f64 / BYTES_PER_MB
}

/// Items per minute over `elapsed`, 0 for an empty interval
pub fn per_minute(count: usize, elapsed: Duration) -> f64 {
    let minutes = elapsed.as_secs_f64() / 60.0;
    if minutes > 0.0 {
        count as f64 / minutes
    } else {
        0.0
    }
}

/// Aggregate result of one recursive crawl
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub start_url: String,
    pub original_url: String,
    pub timestamp: String,
    pub target_domain: String,
    pub total_pages_found: usize,
    pub total_pages_failed: usize,
    pub total_pages_skipped: usize,

    /// Pages already on disk that a resumed run did not fetch again
    pub pages_already_saved: usize,
    pub crawl_duration_seconds: f64,
    pub crawl_duration_minutes: f64,
    pub max_depth_reached: u32,
    pub avg_page_size_kb: f64,
    pub total_size_mb: f64,
    pub pages_per_minute: f64,
    pub pages: Vec<PageRecord>,
    pub failed_urls: Vec<FailureRecord>,

    /// First [`SKIPPED_SAMPLE`] skipped archive URLs
    pub skipped_urls: Vec<String>,
}

impl RunSummary {
    /// Builds the summary of a finished crawl
    ///
    /// Depth, size and rate figures are computed from `pages` alone.
    pub fn build(
        start: &ArchivedPageRef,
        target_domain: &str,
        pages: Vec<PageRecord>,
        failed_urls: Vec<FailureRecord>,
        skipped_urls: &[String],
        pages_already_saved: usize,
        elapsed: Duration,
    ) -> Self {
        let total_bytes: usize = pages.iter().map(|p| p.content_length).sum();
        let avg_page_size_kb = if pages.is_empty() {
            0.0
        } else {
            total_bytes as f64 / pages.len() as f64 / 1024.0
        };
        let seconds = elapsed.as_secs_f64();

        Self {
            start_url: start.archive_url().to_string(),
            original_url: start.original_url().to_string(),
            timestamp: start.timestamp().to_string(),
            target_domain: target_domain.to_string(),
            total_pages_found: pages.len(),
            total_pages_failed: failed_urls.len(),
            total_pages_skipped: skipped_urls.len(),
            pages_already_saved,
            crawl_duration_seconds: round_to(seconds, 2),
            crawl_duration_minutes: round_to(seconds / 60.0, 2),
            max_depth_reached: pages.iter().map(|p| p.depth).max().unwrap_or(0),
            avg_page_size_kb: round_to(avg_page_size_kb, 2),
            total_size_mb: round_to(bytes_to_mb(total_bytes), 2),
            pages_per_minute: round_to(per_minute(pages.len(), elapsed), 2),
            pages,
            failed_urls,
            skipped_urls: skipped_urls.iter().take(SKIPPED_SAMPLE).cloned().collect(),
        }
    }
}

/// Counters of one batch download
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchCounters {
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
    pub total_bytes: usize,
}

/// Aggregate result of one batch download
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    pub domain: String,
    pub date: String,
    pub total_attempted: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_seconds: f64,
    pub duration_minutes: f64,
    pub total_size_mb: f64,
    pub pages_per_minute: f64,
    pub average_page_size_kb: f64,
}

impl BatchSummary {
    pub fn build(
        domain: &str,
        date: &str,
        total_attempted: usize,
        counters: &BatchCounters,
        elapsed: Duration,
    ) -> Self {
        let size_mb = bytes_to_mb(counters.total_bytes);
        let seconds = elapsed.as_secs_f64();

        Self {
            domain: domain.to_string(),
            date: date.to_string(),
            total_attempted,
            successful: counters.successful,
            failed: counters.failed,
            skipped: counters.skipped,
            duration_seconds: round_to(seconds, 2),
            duration_minutes: round_to(seconds / 60.0, 2),
            total_size_mb: round_to(size_mb, 2),
            pages_per_minute: round_to(per_minute(counters.successful, elapsed), 1),
            average_page_size_kb: round_to(size_mb * 1024.0 / counters.successful.max(1) as f64, 1),
        }
    }
}

/// `snapshot_manifest.json` of one `(domain, date)` batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchManifest {
    pub domain: String,
    pub target_date: String,
    pub created_at: DateTime<Utc>,
    pub total_snapshots: usize,
    pub successful_downloads: usize,
    pub failed_downloads: usize,
    pub skipped_existing: usize,
    pub total_size_mb: f64,
    pub duration_seconds: f64,

    /// First [`MANIFEST_SAMPLE`] input records, as given
    pub snapshots_metadata: Vec<Value>,
}

impl BatchManifest {
    pub fn build(
        summary: &BatchSummary,
        total_snapshots: usize,
        input_sample: impl IntoIterator<Item = Value>,
    ) -> Self {
        Self {
            domain: summary.domain.clone(),
            target_date: summary.date.clone(),
            created_at: Utc::now(),
            total_snapshots,
            successful_downloads: summary.successful,
            failed_downloads: summary.failed,
            skipped_existing: summary.skipped,
            total_size_mb: summary.total_size_mb,
            duration_seconds: summary.duration_seconds,
            snapshots_metadata: input_sample.into_iter().take(MANIFEST_SAMPLE).collect(),
        }
    }
}
