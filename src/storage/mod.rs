//! Storage module for persisting archived pages
//!
//! This module handles every write the archiver makes, including:
//! - Page content with a JSON metadata sidecar per page
//! - Run summaries and resumable crawl state
//! - Batch-download pages and manifests
//!
//! Paths are pure functions of a page's identity, so re-saving a page
//! overwrites it instead of duplicating it.

mod filesystem;
pub mod layout;
mod traits;

pub use filesystem::FileStorage;
pub use traits::{Storage, StorageError, StorageResult};

use std::path::Path;

/// Opens filesystem storage under `base`, creating its directory layout
pub fn open_storage(base: &Path) -> StorageResult<FileStorage> {
    FileStorage::new(base)
}
