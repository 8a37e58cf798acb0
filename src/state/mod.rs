//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `PageRecord`: a successfully archived page
//! - `FailureRecord` / `FailureKind`: a page that could not be archived, and why
//! - `CrawlState`: the resumable visited/found/failed state of one crawl run

mod crawl_state;
mod records;

// Re-export main types
pub use crawl_state::CrawlState;
pub use records::{FailureKind, FailureRecord, PageRecord};
