//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests to the archive, including:
//! - Building HTTP clients with the archiver's user agent and timeout
//! - GET requests for archived pages
//! - Classification of failures into page-level failure kinds

use crate::config::UserAgentConfig;
use crate::state::{FailureKind, FailureRecord};
use reqwest::{Client, StatusCode};
use std::time::{Duration, Instant};

/// Connection setup timeout, separate from the whole-request timeout
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of a fetch operation
#[derive(Debug)]
pub enum FetchResult {
    /// HTTP 200 with a readable body
    Success {
        /// Page body content
        body: String,
        /// Time until response headers arrived
        elapsed: Duration,
    },

    /// Any non-200 status
    HttpError {
        /// The HTTP status code
        status_code: u16,
    },

    /// The request never produced a usable response
    NetworkError {
        /// Error description
        error: String,
        /// Timeout or transport
        kind: FailureKind,
    },
}

impl FetchResult {
    /// Converts a failed fetch into a failure record
    ///
    /// Returns `None` for successful fetches.
    pub fn failure(&self, url: &str, depth: u32) -> Option<FailureRecord> {
        match self {
            Self::Success { .. } => None,
            Self::HttpError { status_code: 404 } => Some(FailureRecord::not_found(url, depth)),
            Self::HttpError { status_code } => {
                Some(FailureRecord::http_status(url, *status_code, depth))
            }
            Self::NetworkError { error, kind } => {
                Some(FailureRecord::error(url, *kind, error.clone(), depth))
            }
        }
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
/// * `timeout` - Whole-request timeout
///
/// # Example
///
/// ```no_run
/// use wayback_archiver::config::UserAgentConfig;
/// use wayback_archiver::crawler::build_http_client;
/// use std::time::Duration;
///
/// let client = build_http_client(&UserAgentConfig::default(), Duration::from_secs(30)).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .timeout(timeout)
        .connect_timeout(CONNECT_TIMEOUT.min(timeout))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches one archived page
///
/// | Condition | Result |
/// |-----------|--------|
/// | HTTP 200 | Success |
/// | HTTP 404 | HttpError, recorded as not found |
/// | Other status | HttpError |
/// | Timeout | NetworkError (timeout) |
/// | Connection, TLS or body error | NetworkError (transport) |
///
/// Redirects are followed by the client; the archive redirects to the
/// nearest capture when the exact timestamp is missing.
pub async fn fetch_url(client: &Client, url: &str) -> FetchResult {
    let started = Instant::now();

    let response = match client.get(url).send().await {
        Ok(response) => response,
        Err(e) => return classify_error(&e),
    };
    let elapsed = started.elapsed();

    let status = response.status();
    if status != StatusCode::OK {
        return FetchResult::HttpError {
            status_code: status.as_u16(),
        };
    }

    match response.text().await {
        Ok(body) => FetchResult::Success { body, elapsed },
        Err(e) => classify_error(&e),
    }
}

fn classify_error(e: &reqwest::Error) -> FetchResult {
    if e.is_timeout() {
        FetchResult::NetworkError {
            error: "Request timeout".to_string(),
            kind: FailureKind::Timeout,
        }
    } else {
        FetchResult::NetworkError {
            error: e.to_string(),
            kind: FailureKind::Transport,
        }
    }
}
