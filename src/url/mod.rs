//! URL handling module for Wayback-Archiver
//!
//! This module provides translation between archive URLs and live URLs,
//! domain extraction, and the substring rules used to prioritize and
//! exclude crawl paths.

mod archive;
mod matcher;

pub use archive::{ArchiveUrls, ArchivedPageRef, DEFAULT_ARCHIVE_ROOT, TIMESTAMP_LEN};
pub use matcher::PathRules;

/// Paths visited first on political party sites (English and Ukrainian)
pub const DEFAULT_PRIORITY_PATHS: &[&str] = &[
    "/about",
    "/про-партію",
    "/програма",
    "/program",
    "/news",
    "/новини",
    "/blog",
    "/блог",
    "/deputies",
    "/депутати",
    "/candidates",
    "/кандидати",
    "/contacts",
    "/контакти",
    "/join",
    "/приєднатися",
];

/// Admin, search and binary-file paths that are never fetched
pub const DEFAULT_EXCLUDE_PATHS: &[&str] = &[
    "/wp-admin",
    "/admin",
    "/login",
    "/search",
    "/пошук",
    "/404",
    ".pdf",
    ".doc",
    ".zip",
    ".jpg",
    ".png",
    ".gif",
];
