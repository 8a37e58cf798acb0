use crate::{UrlError, UrlResult};
use serde::{Deserialize, Serialize};
use url::Url;

/// Default public web archive
pub const DEFAULT_ARCHIVE_ROOT: &str = "https://web.archive.org";

/// Path segment that introduces a capture inside an archive URL
const CAPTURE_MARKER: &str = "/web/";

/// Length of a capture timestamp (`YYYYMMDDhhmmss`)
pub const TIMESTAMP_LEN: usize = 14;

/// Translates between archived-page URLs and the live URLs they capture
///
/// An archive URL has the shape `<root>/web/<timestamp>/<original-url>`.
/// The translator is pure: it never performs I/O and never panics on
/// malformed input.
///
/// # Examples
///
/// ```
/// use wayback_archiver::url::ArchiveUrls;
///
/// let urls = ArchiveUrls::default();
/// let archived = "https://web.archive.org/web/20201231013900/https://example.com/";
///
/// assert!(urls.is_archive_url(archived));
/// assert_eq!(
///     urls.decompose(archived),
///     Some(("20201231013900".to_string(), "https://example.com/".to_string()))
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveUrls {
    /// Archive root without trailing slash, e.g. `https://web.archive.org`
    root: String,

    /// Host (and port, when explicit) of the archive root
    host_marker: String,
}

impl Default for ArchiveUrls {
    fn default() -> Self {
        Self {
            root: DEFAULT_ARCHIVE_ROOT.to_string(),
            host_marker: "web.archive.org".to_string(),
        }
    }
}

impl ArchiveUrls {
    /// Creates a translator for the archive served at `root`
    ///
    /// # Arguments
    ///
    /// * `root` - Base URL of the archive (`https://web.archive.org`)
    ///
    /// # Returns
    ///
    /// * `Ok(ArchiveUrls)` - Translator bound to this archive
    /// * `Err(UrlError)` - The root is not an absolute URL with a host
    pub fn new(root: &str) -> UrlResult<Self> {
        let parsed = Url::parse(root).map_err(|e| UrlError::Parse(format!("{}: {}", root, e)))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| UrlError::MissingDomain(root.to_string()))?
            .to_lowercase();

        let host_marker = match parsed.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host,
        };

        Ok(Self {
            root: root.trim_end_matches('/').to_string(),
            host_marker,
        })
    }

    /// Returns true iff both the archive host and the capture path marker appear
    pub fn is_archive_url(&self, url: &str) -> bool {
        url.contains(&self.host_marker) && url.contains(CAPTURE_MARKER)
    }

    /// Splits an archive URL into `(timestamp, original_url)`
    ///
    /// The original URL gets an `https://` prefix when it has no scheme.
    /// Returns `None` when the URL does not carry a 14-digit capture
    /// timestamp followed by a non-empty original URL.
    pub fn decompose(&self, archive_url: &str) -> Option<(String, String)> {
        if !self.is_archive_url(archive_url) {
            return None;
        }

        let prefix = format!("{}{}", self.host_marker, CAPTURE_MARKER);

        for (index, _) in archive_url.match_indices(&prefix) {
            let rest = &archive_url[index + prefix.len()..];

            let Some(timestamp) = rest.get(..TIMESTAMP_LEN) else {
                continue;
            };
            if !timestamp.bytes().all(|b| b.is_ascii_digit()) {
                continue;
            }

            let Some(original) = rest[TIMESTAMP_LEN..].strip_prefix('/') else {
                continue;
            };
            if original.is_empty() {
                continue;
            }

            return Some((timestamp.to_string(), with_scheme(original)));
        }

        None
    }

    /// Builds an archive URL from a capture timestamp and an original URL
    ///
    /// Scheme-less original URLs are normalized to `https://` so that
    /// [`ArchiveUrls::decompose`] returns exactly the URL that was composed.
    pub fn compose(&self, timestamp: &str, original_url: &str) -> String {
        format!(
            "{}{}{}/{}",
            self.root,
            CAPTURE_MARKER,
            timestamp,
            with_scheme(original_url)
        )
    }

    /// Resolves a relative link against the original URL behind `base_archive_url`
    ///
    /// Returns `None` if the base is not a valid archive URL or the link
    /// cannot be resolved.
    pub fn resolve_relative(&self, relative_url: &str, base_archive_url: &str) -> Option<String> {
        let (timestamp, original_base) = self.decompose(base_archive_url)?;
        let base = Url::parse(&original_base).ok()?;
        let resolved = base.join(relative_url).ok()?;
        Some(self.compose(&timestamp, resolved.as_str()))
    }

    /// Resolves a root-relative href that points inside the archive itself
    ///
    /// The archive rewrites on-page links to `/web/<timestamp>/<original>`;
    /// such hrefs are joined to the archive root instead of the original site.
    pub fn resolve_archive_path(&self, href: &str) -> Option<String> {
        if !href.starts_with(CAPTURE_MARKER) {
            return None;
        }
        let candidate = format!("{}{}", self.root, href);
        let (timestamp, original) = self.decompose(&candidate)?;
        Some(self.compose(&timestamp, &original))
    }

    /// Returns the lowercased host of a URL
    ///
    /// Archive URLs are reduced to their original URL first. Never fails
    /// loudly: unparseable input yields `None`.
    pub fn domain_of(&self, url: &str) -> Option<String> {
        let target = match self.decompose(url) {
            Some((_, original)) => original,
            None => url.to_string(),
        };

        let parsed = Url::parse(&target).ok()?;
        extract_domain(&parsed)
    }

    /// Returns true iff both URLs resolve to the same (case-insensitive) domain
    pub fn same_domain(&self, url1: &str, url2: &str) -> bool {
        match (self.domain_of(url1), self.domain_of(url2)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// Builds the page identity for an archive URL
    pub fn page_ref(&self, archive_url: &str) -> UrlResult<ArchivedPageRef> {
        let (timestamp, original_url) = self
            .decompose(archive_url)
            .ok_or_else(|| UrlError::NotArchiveUrl(archive_url.to_string()))?;

        Ok(ArchivedPageRef {
            archive_url: archive_url.to_string(),
            original_url,
            timestamp,
        })
    }
}

/// Lowercased host of a parsed URL, ignoring any port
fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Prefixes `https://` unless the URL already starts with an HTTP(S) scheme
fn with_scheme(url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{}", url)
    }
}

/// Identity of one archived page
///
/// Only [`ArchiveUrls::page_ref`] creates one, so the timestamp and
/// original URL are always the decomposition of `archive_url`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArchivedPageRef {
    archive_url: String,
    original_url: String,
    timestamp: String,
}

impl ArchivedPageRef {
    pub fn archive_url(&self) -> &str {
        &self.archive_url
    }

    pub fn original_url(&self) -> &str {
        &self.original_url
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    /// Lowercased host of the original URL
    pub fn domain(&self) -> Option<String> {
        Url::parse(&self.original_url)
            .ok()
            .and_then(|url| extract_domain(&url))
    }
}
