use crate::state::{FailureRecord, PageRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Resumable state of one crawl run
///
/// Persisted as `crawler_state.json` next to the snapshot's pages. Loaded at
/// start when resuming, overwritten at checkpoints and at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrawlState {
    /// Archive URLs already dispatched (successful, failed or skipped)
    #[serde(default)]
    pub visited_urls: BTreeSet<String>,

    /// Pages archived so far, in visit order
    #[serde(default)]
    pub found_pages: Vec<PageRecord>,

    /// Pages that failed, in visit order
    #[serde(default)]
    pub failed_urls: Vec<FailureRecord>,

    /// When this state was written
    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,
}

impl CrawlState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if nothing has been recorded yet
    pub fn is_empty(&self) -> bool {
        self.visited_urls.is_empty() && self.found_pages.is_empty() && self.failed_urls.is_empty()
    }
}
