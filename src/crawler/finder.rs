//! Snapshot discovery through the archive's capture index
//!
//! The index is queried in pages; each page ends with a resume key that
//! fetches the next one. Callers walk pages lazily and stop as soon as they
//! have what they need.

use crate::config::Config;
use crate::url::ArchiveUrls;
use crate::{ArchiveError, Result};
use chrono::{NaiveDate, NaiveDateTime};
use reqwest::Client;

/// Capture timestamp format (`YYYYMMDDhhmmss`)
const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Site probed by [`SnapshotFinder::test_connection`]
const PROBE_SITE: &str = "http://example.com";

const SECONDS_PER_DAY: i64 = 86_400;

/// One row of the capture index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    pub timestamp: String,
    pub original: String,
    pub status_code: String,
    pub archive_url: String,
}

impl Capture {
    /// Returns true for captures the archive recorded with HTTP 200
    pub fn is_successful(&self) -> bool {
        self.status_code == "200"
    }
}

/// Parses a `YYYY-MM-DD` target date
pub fn parse_target_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| ArchiveError::InvalidDate {
        value: value.to_string(),
        expected: "YYYY-MM-DD",
    })
}

/// Whole days between a capture and midnight of `target`, as an absolute value
///
/// Days are floored before the absolute value is taken, so a capture at
/// noon on the day before the target is one day away.
pub fn day_distance(timestamp: &str, target: NaiveDate) -> Option<i64> {
    let captured = NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT).ok()?;
    let midnight = target.and_hms_opt(0, 0, 0)?;
    let seconds = (captured - midnight).num_seconds();
    Some(seconds.div_euclid(SECONDS_PER_DAY).abs())
}

/// Client for the capture index
#[derive(Debug, Clone)]
pub struct SnapshotFinder {
    client: Client,
    urls: ArchiveUrls,
    endpoint: String,
    page_size: u32,
}

impl SnapshotFinder {
    pub fn new(client: Client, urls: ArchiveUrls, endpoint: impl Into<String>, page_size: u32) -> Self {
        Self {
            client,
            urls,
            endpoint: endpoint.into(),
            page_size: page_size.max(1),
        }
    }

    /// Builds a finder for the archive named in `config`
    pub fn from_config(client: Client, config: &Config) -> Result<Self> {
        let urls = ArchiveUrls::new(&config.archive.root)?;
        Ok(Self::new(
            client,
            urls,
            config.archive.cdx_endpoint(),
            config.archive.cdx_page_size,
        ))
    }

    /// Starts a lazy walk over every capture of `site`
    pub fn captures<'a>(&'a self, site: &'a str) -> CapturePages<'a> {
        CapturePages {
            finder: self,
            site,
            resume_key: None,
            exhausted: false,
        }
    }

    /// Finds the archive URL of the best capture of `site`
    ///
    /// With a target date, returns the successful capture closest to it,
    /// stopping early on a successful capture from the target day itself.
    /// Without one, returns the first successful capture in index order.
    /// Index and connectivity failures are logged and yield `None`.
    pub async fn find_nearest(&self, site: &str, target: Option<NaiveDate>) -> Option<String> {
        match self.try_find_nearest(site, target).await {
            Ok(found) => found,
            Err(e) => {
                tracing::error!("Failed to query capture index for {}: {}", site, e);
                None
            }
        }
    }

    async fn try_find_nearest(&self, site: &str, target: Option<NaiveDate>) -> Result<Option<String>> {
        let mut pages = self.captures(site);

        let Some(target) = target else {
            while let Some(page) = pages.next_page().await? {
                if let Some(capture) = page.into_iter().find(Capture::is_successful) {
                    return Ok(Some(capture.archive_url));
                }
            }
            return Ok(None);
        };

        let mut best: Option<(i64, Capture)> = None;

        'pages: while let Some(page) = pages.next_page().await? {
            for capture in page {
                let Some(distance) = day_distance(&capture.timestamp, target) else {
                    tracing::trace!("Skipping capture with bad timestamp {}", capture.timestamp);
                    continue;
                };
                if !capture.is_successful() {
                    continue;
                }

                let closer = best.as_ref().map_or(true, |(d, _)| distance < *d);
                if closer {
                    best = Some((distance, capture));
                }
                if distance == 0 {
                    break 'pages;
                }
            }
        }

        Ok(best.map(|(distance, capture)| {
            tracing::info!(
                "Found snapshot {} ({} days from target date {})",
                capture.timestamp,
                distance,
                target
            );
            capture.archive_url
        }))
    }

    /// Lists up to `limit` archive URLs for `site`, in index order
    pub async fn list_snapshots(&self, site: &str, limit: usize) -> Result<Vec<String>> {
        let mut found = Vec::new();
        let mut pages = self.captures(site);

        while found.len() < limit {
            let Some(page) = pages.next_page().await? else {
                break;
            };
            found.extend(
                page.into_iter()
                    .take(limit - found.len())
                    .map(|c| c.archive_url),
            );
        }

        Ok(found)
    }

    /// Returns true if the index answers with at least one capture of a probe site
    pub async fn test_connection(&self) -> bool {
        match self.list_snapshots(PROBE_SITE, 1).await {
            Ok(found) => !found.is_empty(),
            Err(e) => {
                tracing::warn!("Archive connection test failed: {}", e);
                false
            }
        }
    }

    async fn fetch_page(&self, site: &str, resume_key: Option<&str>) -> Result<(Vec<Capture>, Option<String>)> {
        let mut query = vec![
            ("url", site.to_string()),
            ("output", "json".to_string()),
            ("fl", "timestamp,original,statuscode".to_string()),
            ("limit", self.page_size.to_string()),
            ("showResumeKey", "true".to_string()),
        ];
        if let Some(key) = resume_key {
            query.push(("resumeKey", key.to_string()));
        }

        tracing::debug!("Querying capture index for {} (resume key: {:?})", site, resume_key);

        let response = self
            .client
            .get(&self.endpoint)
            .query(&query)
            .send()
            .await
            .map_err(|source| ArchiveError::Http {
                url: self.endpoint.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ArchiveError::Index(format!(
                "HTTP {} from {}",
                status.as_u16(),
                self.endpoint
            )));
        }

        let body = response.text().await.map_err(|source| ArchiveError::Http {
            url: self.endpoint.clone(),
            source,
        })?;

        parse_index_page(&body, &self.urls)
    }
}

/// Lazy, page-at-a-time walk over the captures of one site
pub struct CapturePages<'a> {
    finder: &'a SnapshotFinder,
    site: &'a str,
    resume_key: Option<String>,
    exhausted: bool,
}

impl CapturePages<'_> {
    /// Fetches the next page, or `None` once the index has no more rows
    pub async fn next_page(&mut self) -> Result<Option<Vec<Capture>>> {
        if self.exhausted {
            return Ok(None);
        }

        let (captures, resume_key) = self
            .finder
            .fetch_page(self.site, self.resume_key.as_deref())
            .await?;

        self.exhausted = resume_key.is_none();
        self.resume_key = resume_key;

        if captures.is_empty() && self.exhausted {
            return Ok(None);
        }
        Ok(Some(captures))
    }
}

/// Parses one JSON page of the capture index
///
/// The page is a table: a header row, capture rows, then optionally an
/// empty row followed by a single-cell row holding the resume key.
fn parse_index_page(body: &str, urls: &ArchiveUrls) -> Result<(Vec<Capture>, Option<String>)> {
    let body = body.trim();
    if body.is_empty() {
        return Ok((Vec::new(), None));
    }

    let rows: Vec<Vec<String>> = serde_json::from_str(body)
        .map_err(|e| ArchiveError::Index(format!("malformed index response: {}", e)))?;

    let mut captures = Vec::new();
    let mut resume_key = None;
    let mut rows = rows.into_iter().peekable();

    if rows
        .peek()
        .and_then(|row| row.first())
        .is_some_and(|first| first == "timestamp")
    {
        rows.next();
    }

    while let Some(row) = rows.next() {
        if row.is_empty() {
            resume_key = rows
                .next()
                .and_then(|r| r.into_iter().next())
                .filter(|k| !k.is_empty());
            break;
        }

        let mut fields = row.into_iter();
        let (Some(timestamp), Some(original), Some(status_code)) =
            (fields.next(), fields.next(), fields.next())
        else {
            continue;
        };

        let archive_url = urls.compose(&timestamp, &original);
        captures.push(Capture {
            timestamp,
            original,
            status_code,
            archive_url,
        });
    }

    Ok((captures, resume_key))
}
