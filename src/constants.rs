//! Global Constants
//!
//! Centralized constants for configuration and tuning.
//! All magic numbers should be defined here with documentation.

/// Provider gateway constants
pub mod gateway {
    /// Maximum attempts against one provider before falling back
    pub const MAX_PROVIDER_ATTEMPTS: u32 = 3;

    /// Base delay for exponential backoff (doubles each attempt)
    pub const BASE_RETRY_DELAY_MS: u64 = 1_000;

    /// Jitter added to each backoff delay (+/- this much)
    pub const RETRY_JITTER_MS: u64 = 1_000;

    /// How long a provider stays disabled after a hard quota failure
    pub const QUOTA_DISABLE_WINDOW_SECS: u64 = 24 * 60 * 60;
}

/// Evaluation orchestrator constants
pub mod evaluation {
    /// Maximum prompt pipelines in flight at once (respects upstream rate limits)
    pub const PROMPT_CONCURRENCY: usize = 3;
}

/// Source enrichment constants
pub mod enrichment {
    /// Maximum concurrent metadata fetches across all prompts
    pub const FETCH_CONCURRENCY: usize = 5;

    /// Per-request timeout for metadata fetches (seconds)
    pub const FETCH_TIMEOUT_SECS: u64 = 5;

    /// Page title length cap (characters)
    pub const TITLE_MAX_CHARS: usize = 100;

    /// Meta description length cap (characters)
    pub const DESCRIPTION_MAX_CHARS: usize = 200;

    /// Maximum entries held by the process-wide metadata cache.
    /// Once full, new results are returned uncached instead of evicting.
    pub const METADATA_CACHE_CAPACITY: usize = 1_024;

    /// Browser-like user agent for metadata fetches
    pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
        AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
}

/// Scoring and aggregation constants
pub mod scoring {
    /// Competitors included in the narrative visibility-reason pass
    pub const TOP_COMPETITORS: usize = 10;

    /// Distinct prompts retained per competitor insight
    pub const PROMPTS_PER_COMPETITOR: usize = 5;

    /// Distinct sources retained per competitor insight
    pub const SOURCES_PER_COMPETITOR: usize = 10;
}

/// Intake (prompt generation) constants
pub mod intake {
    /// Queries requested from the prompt generator per run
    pub const PROMPT_BATCH_SIZE: usize = 20;
}
