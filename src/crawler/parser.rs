//! HTML parser for archived pages
//!
//! This module handles parsing HTML content to extract:
//! - The page title (first `<title>`, falling back to the first `<h1>`)
//! - Raw link targets to follow
//! - Link and image counts for page metadata

use scraper::{Html, Selector};

/// Title recorded for pages without a `<title>` or `<h1>`
pub const UNTITLED: &str = "Untitled";

/// Extracted information from an HTML page
#[derive(Debug, Clone)]
pub struct ParsedPage {
    /// Page title, never empty
    pub title: String,

    /// Raw `href` values worth resolving, in document order
    pub hrefs: Vec<String>,

    /// Number of `<a href>` elements
    pub links_found: usize,

    /// Number of `<img>` elements
    pub images_found: usize,
}

/// Parses HTML content and extracts the title, links and counts
///
/// Hrefs are returned as written; resolution against the archive happens
/// in the crawler. Empty, fragment-only, `javascript:`, `mailto:`, `tel:`
/// and `data:` hrefs are dropped.
///
/// # Example
///
/// ```
/// use wayback_archiver::crawler::parse_html;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
/// let parsed = parse_html(html);
/// assert_eq!(parsed.title, "Test");
/// assert_eq!(parsed.hrefs, vec!["/page".to_string()]);
/// ```
pub fn parse_html(html: &str) -> ParsedPage {
    let document = Html::parse_document(html);

    let title = extract_title(&document).unwrap_or_else(|| UNTITLED.to_string());

    let mut hrefs = Vec::new();
    let mut links_found = 0;
    if let Ok(a_selector) = Selector::parse("a[href]") {
        for element in document.select(&a_selector) {
            links_found += 1;
            if let Some(href) = element.value().attr("href").and_then(followable) {
                hrefs.push(href.to_string());
            }
        }
    }

    let images_found = Selector::parse("img")
        .map(|selector| document.select(&selector).count())
        .unwrap_or(0);

    ParsedPage {
        title,
        hrefs,
        links_found,
        images_found,
    }
}

fn extract_title(document: &Html) -> Option<String> {
    ["title", "h1"].iter().find_map(|tag| first_text(document, tag))
}

fn first_text(document: &Html, tag: &str) -> Option<String> {
    let selector = Selector::parse(tag).ok()?;

    document
        .select(&selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn followable(href: &str) -> Option<&str> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lowered.starts_with(scheme))
    {
        return None;
    }

    Some(href)
}
