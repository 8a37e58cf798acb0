//! Crawler module for archived page fetching and processing
//!
//! This module contains the core archiving logic, including:
//! - Capture index lookups to find the snapshot nearest a date
//! - HTTP fetching and HTML parsing
//! - Shared request rate limiting
//! - Recursive snapshot traversal and concurrent batch download

mod coordinator;
mod downloader;
mod fetcher;
mod finder;
mod limiter;
mod parser;

pub use coordinator::{ProgressFn, SiteCrawler};
pub use downloader::{load_records, parse_batch_date, BatchDownloader, SnapshotRecord};
pub use fetcher::{build_http_client, fetch_url, FetchResult};
pub use finder::{day_distance, parse_target_date, Capture, CapturePages, SnapshotFinder};
pub use limiter::RateLimiter;
pub use parser::{parse_html, ParsedPage, UNTITLED};
