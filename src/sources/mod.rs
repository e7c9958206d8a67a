//! Source Extraction & Enrichment
//!
//! Turns answer text into deduplicated [`SourceReference`] lists and fills
//! in lightweight page metadata (title, description, favicon) with bounded
//! concurrency and a process-wide URL-keyed cache.
//!
//! [`SourceReference`]: crate::types::SourceReference

mod enricher;
mod extract;
mod metadata;

pub use enricher::SourceEnricher;
pub use extract::extract_urls;
pub use metadata::{MetadataFetcher, SiteMetadata, extract_domain};
