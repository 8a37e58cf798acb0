//! Console reports for finished runs
//!
//! This module prints run summaries to stdout for the command line.

use crate::output::{BatchSummary, RunSummary};
use crate::state::FailureKind;
use std::collections::BTreeMap;

/// Number of failures listed individually in a crawl report
const FAILURES_SHOWN: usize = 10;

/// Failure counts grouped by kind
pub fn failures_by_kind(summary: &RunSummary) -> BTreeMap<&'static str, usize> {
    let mut counts = BTreeMap::new();
    for failure in &summary.failed_urls {
        *counts.entry(failure.kind.as_str()).or_insert(0) += 1;
    }
    counts
}

/// Pages found per depth level
pub fn pages_by_depth(summary: &RunSummary) -> BTreeMap<u32, usize> {
    let mut counts = BTreeMap::new();
    for page in &summary.pages {
        *counts.entry(page.depth).or_insert(0) += 1;
    }
    counts
}

/// Prints a crawl summary to stdout in a formatted manner
pub fn print_run_summary(summary: &RunSummary) {
    println!("=== Crawl Summary ===\n");

    println!("Overview:");
    println!("  Start URL: {}", summary.start_url);
    println!("  Snapshot: {}", summary.timestamp);
    println!("  Domain: {}", summary.target_domain);
    println!();

    println!("Pages:");
    println!("  Found: {}", summary.total_pages_found);
    println!("  Failed: {}", summary.total_pages_failed);
    println!("  Skipped: {}", summary.total_pages_skipped);
    if summary.pages_already_saved > 0 {
        println!("  Already saved: {}", summary.pages_already_saved);
    }
    println!("  Max depth reached: {}", summary.max_depth_reached);
    println!();

    let by_depth = pages_by_depth(summary);
    if !by_depth.is_empty() {
        println!("Pages by Depth:");
        for (depth, count) in by_depth {
            println!("  {}: {}", depth, count);
        }
        println!();
    }

    if !summary.failed_urls.is_empty() {
        println!("Failures by Kind:");
        for (kind, count) in failures_by_kind(summary) {
            println!("  {}: {}", kind, count);
        }

        let not_found = summary
            .failed_urls
            .iter()
            .filter(|f| f.kind == FailureKind::NotFound)
            .count();
        if not_found > 0 {
            println!("  ({} pages were never captured by the archive)", not_found);
        }

        for failure in summary.failed_urls.iter().take(FAILURES_SHOWN) {
            println!("  - {} ({})", failure.url, failure.error);
        }
        println!();
    }

    println!(
        "Duration: {:.1} min, {:.1} MB, {:.1} pages/min",
        summary.crawl_duration_minutes, summary.total_size_mb, summary.pages_per_minute
    );
}

/// Prints a batch download summary to stdout
pub fn print_batch_summary(summary: &BatchSummary) {
    println!("=== Download Summary ===\n");

    println!("  Domain: {}", summary.domain);
    println!("  Date: {}", summary.date);
    println!("  Attempted: {}", summary.total_attempted);
    println!("  Successful: {}", summary.successful);
    println!("  Failed: {}", summary.failed);
    println!("  Skipped (already saved): {}", summary.skipped);
    println!();

    let success_rate = if summary.total_attempted > 0 {
        (summary.successful as f64 / summary.total_attempted as f64) * 100.0
    } else {
        0.0
    };

    println!(
        "Success Rate: {:.1}% ({} / {} pages downloaded)",
        success_rate, summary.successful, summary.total_attempted
    );
    println!(
        "Duration: {:.1} min, {:.2} MB, avg {:.1} KB/page",
        summary.duration_minutes, summary.total_size_mb, summary.average_page_size_kb
    );
}
