//! Page Metadata Fetching
//!
//! Best-effort HTTP fetch of title/description/favicon for cited URLs, with
//! a process-wide URL-keyed cache. This is presentation enrichment, not a
//! trust boundary: certificate verification is relaxed, failures degrade to
//! domain-derived placeholders, and nothing here ever returns an error.

use std::time::Duration;

use dashmap::DashMap;
use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

use crate::config::EnrichmentConfig;
use crate::constants::enrichment;
use crate::types::Result;

/// Lightweight metadata for one page.
#[derive(Debug, Clone)]
pub struct SiteMetadata {
    pub title: String,
    pub description: Option<String>,
    pub favicon: String,
    pub domain: String,
}

impl SiteMetadata {
    /// Domain-derived placeholder used when the page cannot be fetched.
    fn placeholder(domain: &str) -> Self {
        Self {
            title: domain.to_string(),
            description: None,
            favicon: fallback_favicon(domain),
            domain: domain.to_string(),
        }
    }
}

/// Fetches and caches page metadata.
pub struct MetadataFetcher {
    client: reqwest::Client,
    cache: DashMap<String, SiteMetadata>,
}

impl MetadataFetcher {
    pub fn new(config: &EnrichmentConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .user_agent(enrichment::USER_AGENT)
            .danger_accept_invalid_certs(true)
            .build()?;

        Ok(Self {
            client,
            cache: DashMap::new(),
        })
    }

    /// Fetch metadata for a URL, consulting the cache first. Never fails;
    /// unfetchable pages yield domain-derived placeholders (which are also
    /// cached, so a flaky URL is not hammered across prompts).
    pub async fn fetch(&self, url: &str) -> SiteMetadata {
        if let Some(hit) = self.cache.get(url) {
            return hit.clone();
        }

        let domain = extract_domain(url);

        // Synthetic search links are not real pages; skip the network.
        let metadata = if url.to_lowercase().contains("google.com/search") {
            SiteMetadata {
                title: "Google Search".to_string(),
                description: Some("Search results from Google".to_string()),
                favicon: "https://www.google.com/favicon.ico".to_string(),
                domain,
            }
        } else {
            self.fetch_live(url, domain).await
        };

        self.store(url, metadata.clone());
        metadata
    }

    async fn fetch_live(&self, url: &str, domain: String) -> SiteMetadata {
        match self.client.get(url).send().await {
            Ok(response) if response.status().is_success() => match response.text().await {
                Ok(html) => parse_page(&html, url, domain),
                Err(err) => {
                    debug!(url, %err, "Failed to read page body");
                    SiteMetadata::placeholder(&domain)
                }
            },
            Ok(response) => {
                debug!(url, status = %response.status(), "Non-success fetching metadata");
                SiteMetadata::placeholder(&domain)
            }
            Err(err) => {
                debug!(url, %err, "Error fetching metadata");
                SiteMetadata::placeholder(&domain)
            }
        }
    }

    fn store(&self, url: &str, metadata: SiteMetadata) {
        // Bounded by capacity instead of an eviction policy: past the cap,
        // results are still returned, just not remembered.
        if self.cache.len() < enrichment::METADATA_CACHE_CAPACITY {
            self.cache.insert(url.to_string(), metadata);
        } else {
            debug!(url, "Metadata cache full, result not cached");
        }
    }

    #[cfg(test)]
    fn cached(&self, url: &str) -> bool {
        self.cache.contains_key(url)
    }
}

/// Parse title/description/favicon out of fetched HTML. Synchronous on
/// purpose: the parsed DOM is not Send and must not live across an await.
fn parse_page(html: &str, page_url: &str, domain: String) -> SiteMetadata {
    let document = Html::parse_document(html);

    let title = page_title(&document)
        .unwrap_or_else(|| domain.clone());
    let description = meta_description(&document);
    let favicon = icon_link(&document, page_url).unwrap_or_else(|| fallback_favicon(&domain));

    SiteMetadata {
        title,
        description,
        favicon,
        domain,
    }
}

fn page_title(document: &Html) -> Option<String> {
    let title_sel = Selector::parse("title").unwrap();
    if let Some(title) = document
        .select(&title_sel)
        .next()
        .map(|el| el.text().collect::<String>())
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
    {
        return Some(cap(&title, enrichment::TITLE_MAX_CHARS));
    }

    if let Some(og) = meta_content(document, r#"meta[property="og:title"]"#) {
        return Some(cap(&og, enrichment::TITLE_MAX_CHARS));
    }

    let h1_sel = Selector::parse("h1").unwrap();
    document
        .select(&h1_sel)
        .next()
        .map(|el| el.text().collect::<String>())
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .map(|t| cap(&t, enrichment::TITLE_MAX_CHARS))
}

fn meta_description(document: &Html) -> Option<String> {
    if let Some(desc) = meta_content(document, r#"meta[name="description"]"#) {
        return Some(cap(&desc, enrichment::DESCRIPTION_MAX_CHARS));
    }
    if let Some(og) = meta_content(document, r#"meta[property="og:description"]"#) {
        return Some(cap(&og, enrichment::DESCRIPTION_MAX_CHARS));
    }

    let p_sel = Selector::parse("p").unwrap();
    document
        .select(&p_sel)
        .next()
        .map(|el| el.text().collect::<String>())
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .map(|t| cap(&t, enrichment::DESCRIPTION_MAX_CHARS))
}

fn meta_content(document: &Html, selector: &str) -> Option<String> {
    let sel = Selector::parse(selector).unwrap();
    document
        .select(&sel)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
}

/// The page's own icon link, resolved against the page URL.
fn icon_link(document: &Html, page_url: &str) -> Option<String> {
    let sel = Selector::parse(r#"link[rel~="icon"]"#).unwrap();
    let href = document
        .select(&sel)
        .next()
        .and_then(|el| el.value().attr("href"))
        .filter(|h| !h.is_empty())?;

    let base = Url::parse(page_url).ok()?;
    base.join(href).ok().map(String::from)
}

fn fallback_favicon(domain: &str) -> String {
    format!("https://www.google.com/s2/favicons?domain={}&sz=64", domain)
}

fn cap(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        s.chars().take(max_chars).collect()
    }
}

/// Extract the registrable host from a URL, dropping any `www.` prefix.
/// Unparseable input falls back to a best-effort scheme/path strip.
pub fn extract_domain(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => parsed
            .host_str()
            .map(|host| host.trim_start_matches("www.").to_string())
            .unwrap_or_else(|| url.to_string()),
        Err(_) => url
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .split('/')
            .next()
            .unwrap_or(url)
            .trim_start_matches("www.")
            .to_string(),
    }
}
