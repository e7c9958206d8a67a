//! GeoLens - AI Search Visibility Auditor
//!
//! Probes how generative-answer providers describe a company versus its
//! competitors and turns the raw model text into a scored visibility
//! report.
//!
//! ## Core Pieces
//!
//! - **Provider Gateway**: one generate operation over several upstream
//!   services, with health-aware fallback, retry/backoff, and quota
//!   cool-downs
//! - **Source Enricher**: URL extraction plus cached, bounded-concurrency
//!   page-metadata fetches
//! - **Evaluation Orchestrator**: per-prompt generate → extract → enrich →
//!   audit pipelines under a concurrency limit, degrading instead of
//!   failing
//! - **Scoring Aggregator**: rank-table scoring, competitor rollups, and a
//!   narrative summary
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use geolens::{
//!     Config, EvaluationOptions, EvaluationOrchestrator, ProviderGateway,
//!     ProviderHealthStore, ProviderId, SourceEnricher,
//! };
//!
//! let config = geolens::ConfigLoader::load()?;
//! let health = Arc::new(ProviderHealthStore::new());
//! let gateway = Arc::new(ProviderGateway::from_config(&config, health)?);
//! let enricher = Arc::new(SourceEnricher::new(&config.enrichment)?);
//! let orchestrator = EvaluationOrchestrator::new(gateway, enricher, &config);
//!
//! let report = orchestrator
//!     .evaluate(&company, &prompts, &EvaluationOptions::new(ProviderId::Gemini))
//!     .await;
//! ```
//!
//! ## Modules
//!
//! - [`provider`]: gateway, health store, and upstream adapters
//! - [`sources`]: URL extraction and metadata enrichment
//! - [`eval`]: the per-prompt evaluation pipeline
//! - [`scoring`]: score table, competitor rollup, narrative
//! - [`intake`]: profile builder and prompt generator collaborators
//! - [`config`]: layered figment configuration

pub mod config;
pub mod constants;
pub mod eval;
pub mod intake;
pub mod provider;
pub mod scoring;
pub mod sources;
pub mod telemetry;
pub mod types;
pub mod validation;

// =============================================================================
// Core Re-exports
// =============================================================================

// Configuration
pub use config::{Config, ConfigLoader, EnrichmentConfig, EvaluationConfig, ProvidersConfig};

// Error Types
pub use types::error::{LensError, ProviderError, ProviderErrorKind, Result};

// Domain Types
pub use types::{
    CompanyProfile, CompetitorInsight, CompetitorRank, EvaluationMetric, ModelResponse, Prompt,
    ProviderId, Sentiment, SourceReference, SourceType, VisibilityReport,
};

// =============================================================================
// Pipeline Re-exports
// =============================================================================

pub use eval::{EvaluationOptions, EvaluationOrchestrator};
pub use provider::{
    AnswerProvider, GenerateRequest, GenerateResult, ProviderGateway, ProviderHealthStore,
    ResponseFormat,
};
pub use scoring::{PromptOutcome, ScoringAggregator};
pub use sources::{SourceEnricher, extract_urls};
