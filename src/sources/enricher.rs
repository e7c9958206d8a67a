//! Source Enrichment
//!
//! Fills in page metadata for source references under a shared counting
//! semaphore. The semaphore is the second of the two independent
//! concurrency domains: one enricher instance is shared by every prompt
//! pipeline in flight, so total metadata fetches stay bounded regardless of
//! how many prompts are running.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::debug;

use super::metadata::MetadataFetcher;
use crate::config::EnrichmentConfig;
use crate::types::report::UNTITLED_GROUNDED_SOURCE;
use crate::types::{Result, SourceReference};

/// Best-effort metadata enrichment for source references.
pub struct SourceEnricher {
    fetcher: MetadataFetcher,
    limiter: Arc<Semaphore>,
}

impl SourceEnricher {
    pub fn new(config: &EnrichmentConfig) -> Result<Self> {
        Ok(Self {
            fetcher: MetadataFetcher::new(config)?,
            limiter: Arc::new(Semaphore::new(config.fetch_concurrency)),
        })
    }

    /// Enrich every source that lacks rich metadata. Never fails: sources
    /// whose pages cannot be fetched come back with domain-derived
    /// placeholders. Input order is preserved.
    pub async fn enrich(&self, sources: Vec<SourceReference>) -> Vec<SourceReference> {
        join_all(sources.into_iter().map(|source| self.enrich_single(source))).await
    }

    async fn enrich_single(&self, source: SourceReference) -> SourceReference {
        // Certified sources that already look complete are left alone -
        // this is what makes repeated enrichment a no-op.
        if source.has_rich_metadata() {
            return source;
        }

        let Ok(_permit) = self.limiter.acquire().await else {
            debug!(url = %source.url, "Enrichment limiter closed, keeping source as-is");
            return source;
        };

        let metadata = self.fetcher.fetch(&source.url).await;

        let keep_title = !source.title.is_empty() && source.title != UNTITLED_GROUNDED_SOURCE;
        SourceReference {
            title: if keep_title { source.title } else { metadata.title },
            favicon: source.favicon.or(Some(metadata.favicon)),
            description: source.description.or(metadata.description),
            domain: source.domain.or(Some(metadata.domain)),
            ..source
        }
    }
}
