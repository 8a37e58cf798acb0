/// Case-insensitive substring rules for crawl paths
///
/// Each pattern is matched both as written and in its percent-encoded
/// form, because resolved URLs carry non-ASCII paths (`/новини`) encoded
/// while hrefs taken straight from HTML may not.
#[derive(Debug, Clone, Default)]
pub struct PathRules {
    patterns: Vec<(String, String)>,
}

impl PathRules {
    /// Builds a rule set from raw patterns
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| p.as_ref().to_lowercase())
            .filter(|p| !p.is_empty())
            .map(|p| {
                let encoded = percent_encode_lower(&p);
                (p, encoded)
            })
            .collect();

        Self { patterns }
    }

    /// Returns true if any pattern occurs in `url` (case-insensitive)
    pub fn matches(&self, url: &str) -> bool {
        let lowered = url.to_lowercase();
        self.patterns
            .iter()
            .any(|(raw, encoded)| lowered.contains(raw.as_str()) || lowered.contains(encoded.as_str()))
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Percent-encodes every non-ASCII byte with lowercase hex digits
fn percent_encode_lower(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    for byte in pattern.bytes() {
        if byte.is_ascii() {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02x}", byte));
        }
    }
    out
}
