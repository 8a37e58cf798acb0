//! Page and failure records produced by a crawl or batch download
//!
//! Records are appended to a run's result lists and never mutated afterward.

use crate::url::ArchivedPageRef;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Result of a successful fetch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    /// Identity of the archived page
    #[serde(flatten)]
    pub page: ArchivedPageRef,

    /// First `<title>`, else first `<h1>`, else a placeholder
    pub title: String,

    /// Body length in bytes
    pub content_length: usize,

    /// Body length in megabytes, rounded to 3 decimals
    pub content_length_mb: f64,

    /// Traversal depth (0 = seed)
    pub depth: u32,

    /// Number of `<a href>` elements on the page
    pub links_found: usize,

    /// Number of `<img>` elements on the page
    pub images_found: usize,

    /// Time until response headers arrived
    pub response_time_ms: f64,

    /// Where the content was written
    pub saved_to: PathBuf,

    /// Wall-clock time the page was processed
    pub processed_at: DateTime<Utc>,
}

/// Classification of a failed page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// HTTP 404: the archive holds no capture for this URL
    NotFound,

    /// Any other non-200 response
    HttpStatus,

    /// The request exceeded its timeout
    Timeout,

    /// Connection, TLS or body-read failure
    Transport,

    /// The page was fetched but could not be written to disk
    Storage,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::HttpStatus => "http_status",
            Self::Timeout => "timeout",
            Self::Transport => "transport",
            Self::Storage => "storage",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One page that could not be archived
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub url: String,
    pub kind: FailureKind,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub status_code: Option<u16>,
    pub depth: u32,
}

impl FailureRecord {
    /// HTTP 404 from the archive
    pub fn not_found(url: &str, depth: u32) -> Self {
        Self {
            url: url.to_string(),
            kind: FailureKind::NotFound,
            error: "Not found in archive".to_string(),
            status_code: Some(404),
            depth,
        }
    }

    /// Any non-200, non-404 status
    pub fn http_status(url: &str, status_code: u16, depth: u32) -> Self {
        Self {
            url: url.to_string(),
            kind: FailureKind::HttpStatus,
            error: format!("HTTP {}", status_code),
            status_code: Some(status_code),
            depth,
        }
    }

    /// Errors without a status code (timeout, transport, storage)
    pub fn error(url: &str, kind: FailureKind, error: impl Into<String>, depth: u32) -> Self {
        Self {
            url: url.to_string(),
            kind,
            error: error.into(),
            status_code: None,
            depth,
        }
    }
}
