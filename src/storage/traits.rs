//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::output::{BatchManifest, RunSummary};
use crate::state::CrawlState;
use crate::url::ArchivedPageRef;
use serde_json::{Map, Value};
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// The page identity cannot be mapped to a location. This is an input
    /// error, never a per-page failure.
    #[error("Invalid archive URL: {0}")]
    InvalidArchiveUrl(String),

    #[error("Invalid batch directory key: {0}")]
    InvalidBatchKey(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// Returns true for errors caused by malformed input rather than the disk
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::InvalidArchiveUrl(_) | Self::InvalidBatchKey(_))
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// The crawler and the batch downloader persist everything through this
/// trait. Implementations are shared between downloader workers, so every
/// method takes `&self`; concurrent callers always write disjoint paths.
pub trait Storage: Send + Sync {
    // ===== Crawled Pages =====

    /// Deterministic content path for a page
    fn page_path(&self, page: &ArchivedPageRef) -> StorageResult<PathBuf>;

    /// Writes page content and its `.meta.json` sidecar
    ///
    /// Caller metadata is merged with the page identity, size and save time.
    /// Calling it twice for the same page overwrites both files.
    ///
    /// # Returns
    ///
    /// The content path
    fn save_page(
        &self,
        page: &ArchivedPageRef,
        content: &str,
        metadata: Map<String, Value>,
    ) -> StorageResult<PathBuf>;

    /// Returns true if the page's content file already exists
    fn page_exists(&self, page: &ArchivedPageRef) -> bool;

    // ===== Run Summary & Resumable State =====

    /// Writes the run summary, keyed by the crawl's start page
    fn save_summary(&self, start: &ArchivedPageRef, summary: &RunSummary) -> StorageResult<PathBuf>;

    /// Loads the resumable state of a crawl, if one was saved
    fn load_state(&self, start: &ArchivedPageRef) -> StorageResult<Option<CrawlState>>;

    /// Overwrites the resumable state of a crawl
    fn save_state(&self, start: &ArchivedPageRef, state: &CrawlState) -> StorageResult<PathBuf>;

    // ===== Batch Downloads =====

    /// Deterministic content path of one batch record
    fn batch_page_path(&self, domain: &str, date: &str, original_url: &str)
        -> StorageResult<PathBuf>;

    /// Returns true if the batch record's content file already exists
    fn batch_page_exists(&self, domain: &str, date: &str, original_url: &str) -> bool;

    /// Writes a batch page and its `.meta.json` sidecar
    fn save_batch_page(
        &self,
        domain: &str,
        date: &str,
        original_url: &str,
        content: &str,
        metadata: &Value,
    ) -> StorageResult<PathBuf>;

    /// Overwrites the batch manifest for `(domain, date)`
    fn save_manifest(&self, domain: &str, date: &str, manifest: &BatchManifest)
        -> StorageResult<PathBuf>;
}
