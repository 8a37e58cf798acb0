//! Output module for run summaries and reports
//!
//! This module handles:
//! - Building crawl summaries and batch-download summaries
//! - Building batch manifests
//! - Printing reports for the command line

pub mod stats;
mod summary;

pub use stats::{print_batch_summary, print_run_summary};
pub use summary::{
    bytes_to_mb, round_to, BatchCounters, BatchManifest, BatchSummary, RunSummary,
    MANIFEST_SAMPLE, SKIPPED_SAMPLE,
};
