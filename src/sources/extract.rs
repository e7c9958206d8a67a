//! URL Extraction
//!
//! Regex scan over free text for http(s) URLs. Matches keep first-seen
//! order; trailing sentence punctuation is stripped and duplicates removed
//! so "https://a.com/x," and "https://a.com/x!!" both land as one entry.

use regex::Regex;
use std::sync::OnceLock;

/// Punctuation that belongs to the surrounding sentence, not the URL.
const TRAILING_PUNCTUATION: &[char] = &[')', '.', ',', ';', '!', '?', '"', '\'', ']'];

fn url_regex() -> &'static Regex {
    static URL_RE: OnceLock<Regex> = OnceLock::new();
    URL_RE.get_or_init(|| {
        Regex::new(r"https?://(?:[-\w.]|(?:%[\da-fA-F]{2})|[/?=&#+])+")
            .expect("static URL regex")
    })
}

/// Extract all URLs from text, deduplicated, in first-seen order.
pub fn extract_urls(text: &str) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();

    for found in url_regex().find_iter(text) {
        let cleaned = found.as_str().trim_end_matches(TRAILING_PUNCTUATION);
        if !cleaned.is_empty() && !urls.iter().any(|u| u == cleaned) {
            urls.push(cleaned.to_string());
        }
    }

    urls
}
