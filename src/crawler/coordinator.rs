//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the traversal of one archived snapshot, including:
//! - Resolving the start capture through the capture index
//! - Seeding the traversal with the start page and priority sections
//! - Depth-first fetching, parsing and link extraction
//! - Resume from saved state and periodic checkpoints
//! - Building and persisting the run summary

use crate::config::{Config, CrawlerConfig};
use crate::crawler::finder::SnapshotFinder;
use crate::crawler::limiter::RateLimiter;
use crate::crawler::parser::{parse_html, ParsedPage};
use crate::crawler::{build_http_client, fetch_url, FetchResult};
use crate::output::{bytes_to_mb, round_to, RunSummary};
use crate::state::{CrawlState, FailureKind, FailureRecord, PageRecord};
use crate::storage::Storage;
use crate::url::{ArchiveUrls, ArchivedPageRef, PathRules};
use crate::{ArchiveError, Result, UrlError};
use chrono::{NaiveDate, Utc};
use reqwest::Client;
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

/// Progress callback: `(pages found, page budget)`
pub type ProgressFn = Box<dyn FnMut(usize, usize) + Send>;

/// Mutable bookkeeping of one crawl
#[derive(Debug, Default)]
struct CrawlRun {
    state: CrawlState,
    skipped: Vec<String>,
    already_saved: usize,
    since_checkpoint: usize,
}

/// Depth-first crawler for one archived snapshot of a site
pub struct SiteCrawler {
    config: CrawlerConfig,
    urls: ArchiveUrls,
    client: Client,
    finder: SnapshotFinder,
    limiter: RateLimiter,
    storage: Arc<dyn Storage>,
    priority_paths: Vec<String>,
    priority: PathRules,
    exclude: PathRules,
    progress: Option<ProgressFn>,
}

impl SiteCrawler {
    /// Creates a crawler from configuration
    ///
    /// # Arguments
    ///
    /// * `config` - Full configuration; crawler limits, archive endpoints,
    ///   user agent and path lists are taken from it
    /// * `storage` - Where pages, summaries and state are written
    ///
    /// # Returns
    ///
    /// * `Ok(SiteCrawler)` - Ready to crawl
    /// * `Err(ArchiveError)` - Invalid archive root or HTTP client setup failure
    pub fn new(config: &Config, storage: Arc<dyn Storage>) -> Result<Self> {
        let client = build_http_client(&config.user_agent, config.crawler.request_timeout())?;
        let urls = ArchiveUrls::new(&config.archive.root)?;
        let finder = SnapshotFinder::from_config(client.clone(), config)?;
        let limiter = RateLimiter::new(
            config.crawler.requests_per_second,
            config.crawler.burst_limit,
        );

        let priority = PathRules::new(&config.paths.priority);
        let exclude = PathRules::new(&config.paths.exclude);
        tracing::debug!(
            "{} priority paths, {} exclusion rules",
            priority.len(),
            exclude.len()
        );

        Ok(Self {
            config: config.crawler.clone(),
            urls,
            client,
            finder,
            limiter,
            storage,
            priority_paths: config.paths.priority.clone(),
            priority,
            exclude,
            progress: None,
        })
    }

    /// Replaces the rate limiter
    pub fn with_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    /// Installs a callback invoked before each fetch
    pub fn with_progress(mut self, progress: impl FnMut(usize, usize) + Send + 'static) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    /// Crawls the capture of `site_url` nearest to `target_date`
    ///
    /// Without a target date the first successful capture in index order
    /// is used. Fails with [`ArchiveError::SnapshotNotFound`] when the index
    /// has no usable capture.
    pub async fn crawl(&mut self, site_url: &str, target_date: Option<NaiveDate>) -> Result<RunSummary> {
        tracing::info!("Starting crawl of {}", site_url);

        let start = self
            .finder
            .find_nearest(site_url, target_date)
            .await
            .ok_or_else(|| ArchiveError::SnapshotNotFound {
                site: site_url.to_string(),
            })?;

        self.crawl_snapshot(&start).await
    }

    /// Crawls the snapshot that `start_archive_url` belongs to
    ///
    /// Per-page failures are recorded in the summary. Only a malformed
    /// start URL or an unmappable page identity aborts the run.
    pub async fn crawl_snapshot(&mut self, start_archive_url: &str) -> Result<RunSummary> {
        let started = Instant::now();

        let start = self.urls.page_ref(start_archive_url)?;
        let target_domain = start
            .domain()
            .ok_or_else(|| UrlError::MissingDomain(start.original_url().to_string()))?;

        tracing::info!("Snapshot: {}", start.timestamp());
        tracing::info!("Target domain: {}", target_domain);

        let mut run = CrawlRun {
            state: self.initial_state(&start),
            ..CrawlRun::default()
        };

        let mut stack: Vec<(String, u32)> = self
            .seeds(&start)
            .into_iter()
            .rev()
            .map(|url| (url, 0))
            .collect();

        while let Some((url, depth)) = stack.pop() {
            let children = self.visit(&mut run, &start, &target_domain, url, depth).await?;
            stack.extend(children.into_iter().rev().map(|link| (link, depth + 1)));
        }

        Ok(self.finish(&start, &target_domain, run, started.elapsed()))
    }

    fn initial_state(&self, start: &ArchivedPageRef) -> CrawlState {
        if !self.config.resume {
            return CrawlState::new();
        }

        match self.storage.load_state(start) {
            Ok(Some(state)) if !state.is_empty() => {
                tracing::info!(
                    "Resuming: {} visited URLs, {} pages already found",
                    state.visited_urls.len(),
                    state.found_pages.len()
                );
                state
            }
            Ok(_) => CrawlState::new(),
            Err(e) => {
                tracing::warn!("Could not load previous crawl state: {}", e);
                CrawlState::new()
            }
        }
    }

    /// Start page followed by each priority section of the same snapshot
    fn seeds(&self, start: &ArchivedPageRef) -> Vec<String> {
        let mut seeds = vec![start.archive_url().to_string()];

        let Ok(base) = Url::parse(start.original_url()) else {
            return seeds;
        };

        for path in &self.priority_paths {
            match base.join(path) {
                Ok(section) => seeds.push(self.urls.compose(start.timestamp(), section.as_str())),
                Err(e) => tracing::debug!("Skipping priority path {}: {}", path, e),
            }
        }

        seeds
    }

    /// Visits one URL and returns the links to descend into, in visit order
    async fn visit(
        &mut self,
        run: &mut CrawlRun,
        start: &ArchivedPageRef,
        target_domain: &str,
        url: String,
        depth: u32,
    ) -> Result<Vec<String>> {
        let max_pages = self.config.max_pages;

        if depth > self.config.max_depth
            || run.state.found_pages.len() >= max_pages
            || run.state.visited_urls.contains(&url)
        {
            return Ok(Vec::new());
        }
        run.state.visited_urls.insert(url.clone());

        if self.exclude.matches(&url) {
            tracing::debug!("Skipped (excluded): {}", url);
            run.skipped.push(url);
            return Ok(Vec::new());
        }

        let page = self.urls.page_ref(&url)?;

        if let Some(progress) = self.progress.as_mut() {
            progress(run.state.found_pages.len(), max_pages);
        }
        tracing::debug!("Processing (depth {}): {}", depth, url);

        self.limiter.wait_if_needed().await;

        if self.config.resume && self.storage.page_exists(&page) {
            tracing::debug!("Already saved: {}", url);
            run.already_saved += 1;
            return Ok(Vec::new());
        }

        let (body, elapsed) = match fetch_url(&self.client, &url).await {
            FetchResult::Success { body, elapsed } => (body, elapsed),
            failed => {
                if let Some(record) = failed.failure(&url, depth) {
                    log_failure(&record);
                    run.state.failed_urls.push(record);
                }
                return Ok(Vec::new());
            }
        };

        let parsed = parse_html(&body);
        let record = match self.save(&page, &body, &parsed, depth, elapsed) {
            Ok(record) => record,
            Err(ArchiveError::Storage(e)) if !e.is_input_error() => {
                tracing::error!("Failed to save {}: {}", url, e);
                run.state
                    .failed_urls
                    .push(FailureRecord::error(&url, FailureKind::Storage, e.to_string(), depth));
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        tracing::info!(
            "[{}/{}] {} ({} MB)",
            run.state.found_pages.len() + 1,
            max_pages,
            truncate_title(&record.title),
            record.content_length_mb
        );
        run.state.found_pages.push(record);
        self.checkpoint(run, start);

        if depth < self.config.max_depth && run.state.found_pages.len() < max_pages {
            Ok(self.internal_links(&parsed, &page, target_domain, &run.state.visited_urls))
        } else {
            Ok(Vec::new())
        }
    }

    fn save(
        &self,
        page: &ArchivedPageRef,
        body: &str,
        parsed: &ParsedPage,
        depth: u32,
        elapsed: Duration,
    ) -> Result<PageRecord> {
        let content_length_mb = round_to(bytes_to_mb(body.len()), 3);
        let response_time_ms = round_to(elapsed.as_secs_f64() * 1000.0, 2);
        let processed_at = Utc::now();

        let mut metadata = Map::new();
        metadata.insert("title".into(), Value::from(parsed.title.as_str()));
        metadata.insert("content_length_mb".into(), Value::from(content_length_mb));
        metadata.insert("depth".into(), Value::from(depth));
        metadata.insert("links_found".into(), Value::from(parsed.links_found));
        metadata.insert("images_found".into(), Value::from(parsed.images_found));
        metadata.insert("response_time_ms".into(), Value::from(response_time_ms));
        metadata.insert("processed_at".into(), Value::from(processed_at.to_rfc3339()));

        let saved_to = self.storage.save_page(page, body, metadata)?;

        Ok(PageRecord {
            page: page.clone(),
            title: parsed.title.clone(),
            content_length: body.len(),
            content_length_mb,
            depth,
            links_found: parsed.links_found,
            images_found: parsed.images_found,
            response_time_ms,
            saved_to,
            processed_at,
        })
    }

    /// Same-domain archive links of a page: priority sections first, then
    /// the rest, each group in document order without duplicates
    fn internal_links(
        &self,
        parsed: &ParsedPage,
        page: &ArchivedPageRef,
        target_domain: &str,
        visited: &BTreeSet<String>,
    ) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut priority = Vec::new();
        let mut regular = Vec::new();

        for href in &parsed.hrefs {
            if self.exclude.matches(href) {
                continue;
            }

            let Some(link) = self.resolve_href(href, page, target_domain) else {
                continue;
            };

            if self.urls.decompose(&link).is_none()
                || visited.contains(&link)
                || !self.urls.same_domain(&link, page.archive_url())
                || !seen.insert(link.clone())
            {
                continue;
            }

            if self.priority.matches(&link) {
                priority.push(link);
            } else {
                regular.push(link);
            }
        }

        priority.extend(regular);
        priority
    }

    fn resolve_href(&self, href: &str, page: &ArchivedPageRef, target_domain: &str) -> Option<String> {
        if href.starts_with('/') {
            return self
                .urls
                .resolve_archive_path(href)
                .or_else(|| self.urls.resolve_relative(href, page.archive_url()));
        }

        if href.to_lowercase().contains(target_domain) {
            if self.urls.is_archive_url(href) {
                return Some(href.to_string());
            }
            return Some(self.urls.compose(page.timestamp(), href));
        }

        None
    }

    fn checkpoint(&self, run: &mut CrawlRun, start: &ArchivedPageRef) {
        let interval = self.config.checkpoint_interval;
        run.since_checkpoint += 1;
        if interval == 0 || run.since_checkpoint < interval {
            return;
        }
        run.since_checkpoint = 0;

        run.state.saved_at = Some(Utc::now());
        match self.storage.save_state(start, &run.state) {
            Ok(_) => tracing::info!(
                "Checkpoint: {} pages found, {} failed",
                run.state.found_pages.len(),
                run.state.failed_urls.len()
            ),
            Err(e) => tracing::warn!("Failed to save checkpoint: {}", e),
        }
    }

    fn finish(
        &self,
        start: &ArchivedPageRef,
        target_domain: &str,
        mut run: CrawlRun,
        elapsed: Duration,
    ) -> RunSummary {
        run.state.saved_at = Some(Utc::now());
        if let Err(e) = self.storage.save_state(start, &run.state) {
            tracing::error!("Failed to save crawl state: {}", e);
        }

        let summary = RunSummary::build(
            start,
            target_domain,
            std::mem::take(&mut run.state.found_pages),
            std::mem::take(&mut run.state.failed_urls),
            &run.skipped,
            run.already_saved,
            elapsed,
        );

        if let Err(e) = self.storage.save_summary(start, &summary) {
            tracing::error!("Failed to save run summary: {}", e);
        }

        tracing::info!(
            "Crawl finished: {} pages, {} failed, {} skipped in {:.1} min ({:.1} MB)",
            summary.total_pages_found,
            summary.total_pages_failed,
            summary.total_pages_skipped,
            summary.crawl_duration_minutes,
            summary.total_size_mb
        );

        summary
    }
}

fn log_failure(record: &FailureRecord) {
    match record.kind {
        FailureKind::NotFound => tracing::debug!("Not in archive: {}", record.url),
        FailureKind::HttpStatus => tracing::warn!("{} for {}", record.error, record.url),
        _ => tracing::error!("Request failed for {}: {}", record.url, record.error),
    }
}

fn truncate_title(title: &str) -> String {
    const SHOWN: usize = 50;
    if title.chars().count() <= SHOWN {
        title.to_string()
    } else {
        format!("{}...", title.chars().take(SHOWN).collect::<String>())
    }
}
