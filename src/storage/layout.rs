//! On-disk layout of the archive tree
//!
//! ```text
//! <base>/snapshots/<sanitized-domain>/<timestamp>/<sanitized-filename>.html
//! <base>/snapshots/<sanitized-domain>/<timestamp>/<sanitized-filename>.html.meta.json
//! <base>/snapshots/<sanitized-domain>/<timestamp>/crawler_state.json
//! <base>/metadata/<sanitized-domain>/snapshot_<timestamp>_summary.json
//! <base>/snapshots/<domain>/<date>/<batch-filename>.html
//! <base>/snapshots/<domain>/<date>/snapshot_manifest.json
//! ```

use sha2::{Digest, Sha256};

pub const SNAPSHOTS_DIR: &str = "snapshots";
pub const METADATA_DIR: &str = "metadata";
pub const LOGS_DIR: &str = "logs";

pub const STATE_FILE: &str = "crawler_state.json";
pub const MANIFEST_FILE: &str = "snapshot_manifest.json";
pub const META_SUFFIX: &str = ".meta.json";
pub const PAGE_EXTENSION: &str = ".html";

/// Crawled page names longer than this are truncated and hashed
const PAGE_NAME_THRESHOLD: usize = 200;
const PAGE_NAME_KEEP: usize = 180;

/// Batch page names longer than this are truncated and hashed
const BATCH_NAME_THRESHOLD: usize = 150;
const BATCH_NAME_KEEP: usize = 140;

/// Hex characters of the hash suffix
const HASH_LEN: usize = 8;

/// Replaces every non-alphanumeric character of a domain with `_`
pub fn sanitize_domain(domain: &str) -> String {
    domain
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// File name for a crawled page
///
/// The scheme is dropped and `/ ? & =` become `_`. Names over 200
/// bytes keep their first 180 followed by `_` and 8 hex characters of
/// a hash of the scheme-less URL. `.html` is appended unless present.
pub fn page_filename(original_url: &str) -> String {
    let url = strip_scheme(original_url);
    let name = replace_chars(url, &['/', '?', '&', '=']);
    let mut name = truncate_with_hash(name, url, PAGE_NAME_THRESHOLD, PAGE_NAME_KEEP);

    if !name.ends_with(PAGE_EXTENSION) {
        name.push_str(PAGE_EXTENSION);
    }
    name
}

/// Base file name (without extension) for a batch-downloaded page
///
/// Like [`page_filename`] but also replaces `: # %`, with a 150-byte
/// threshold that keeps the first 140.
pub fn batch_filename(original_url: &str) -> String {
    let url = strip_scheme(original_url);
    let name = replace_chars(url, &['/', '?', '&', '=', ':', '#', '%']);
    truncate_with_hash(name, url, BATCH_NAME_THRESHOLD, BATCH_NAME_KEEP)
}

/// Sidecar metadata file name for a content file name
pub fn meta_filename(content_filename: &str) -> String {
    format!("{}{}", content_filename, META_SUFFIX)
}

/// Summary file name for a capture timestamp
pub fn summary_filename(timestamp: &str) -> String {
    format!("snapshot_{}_summary.json", timestamp)
}

/// Batch directory keys are used verbatim and must stay a single path segment
pub fn is_safe_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && !segment.contains(['/', '\\'])
}

fn strip_scheme(url: &str) -> &str {
    match url.split_once("://") {
        Some((_, rest)) => rest,
        None => url,
    }
}

fn replace_chars(input: &str, targets: &[char]) -> String {
    input
        .chars()
        .map(|c| if targets.contains(&c) { '_' } else { c })
        .collect()
}

/// Limits are in bytes, since filesystems bound names in bytes
fn truncate_with_hash(name: String, hashed: &str, threshold: usize, keep: usize) -> String {
    if name.len() <= threshold {
        return name;
    }

    let mut end = keep;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}_{}", &name[..end], short_hash(hashed))
}

fn short_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut hex = hex::encode(digest);
    hex.truncate(HASH_LEN);
    hex
}
