//! Provider Abstraction
//!
//! Defines the AnswerProvider trait for upstream generative-answer services
//! and the gateway that routes one logical generate call across them.
//!
//! ## Modules
//!
//! - `gateway`: tiered fallback routing with retry/backoff and health gating
//! - `health`: dependency-injected per-provider health store
//! - `gemini`: Google Generative Language adapter (grounding-capable)
//! - `chat`: OpenAI-compatible chat-completions adapter (cerebras, openrouter)

mod chat;
pub mod gateway;
mod gemini;
pub mod health;

pub use chat::ChatCompletionsProvider;
pub use gateway::{GatewayConfig, GenerateRequest, GenerateResult, ProviderGateway, ResponseFormat};
pub use gemini::GeminiProvider;
pub use health::{ProviderHealthStatus, ProviderHealthStore};

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::ProviderSettings;
use crate::types::error::ProviderResult;
use crate::types::{LensError, ProviderId, Result};

// =============================================================================
// Wire-Level Types
// =============================================================================

/// A citation certified by a grounding-capable provider, as opposed to a URL
/// merely detected in the answer text.
#[derive(Debug, Clone)]
pub struct GroundingCitation {
    pub url: String,
    pub title: Option<String>,
}

/// One provider's raw answer: the generated text plus any certified
/// grounding citations (empty for providers without grounding).
#[derive(Debug, Clone)]
pub struct ProviderAnswer {
    pub text: String,
    pub citations: Vec<GroundingCitation>,
}

impl ProviderAnswer {
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            citations: Vec::new(),
        }
    }
}

/// Per-call options passed down to an adapter.
#[derive(Debug, Clone, Copy)]
pub struct GenerateOptions {
    pub format: ResponseFormat,
    /// Honored only by grounding-capable adapters; others ignore it.
    pub grounded_search: bool,
}

// =============================================================================
// Provider Trait
// =============================================================================

/// An upstream generative-answer service reachable through a uniform
/// generate-text capability.
///
/// Adapters classify their own failures into [`ProviderErrorKind`] where the
/// real HTTP status code is available; callers never sniff error strings.
///
/// [`ProviderErrorKind`]: crate::types::ProviderErrorKind
#[async_trait]
pub trait AnswerProvider: Send + Sync {
    /// Generate an answer for the prompt under the given options.
    async fn generate(&self, prompt: &str, options: &GenerateOptions)
    -> ProviderResult<ProviderAnswer>;

    fn id(&self) -> ProviderId;

    /// Human-facing label attached to report entries, e.g. "Cerebras (llama-3.3-70b)".
    fn display_name(&self) -> String;

    /// Whether this provider can run certified web-search grounding.
    fn supports_grounding(&self) -> bool {
        false
    }
}

/// Shared provider handle for concurrent use across pipelines.
pub type SharedProvider = Arc<dyn AnswerProvider>;

/// Create a provider adapter from its settings.
///
/// Fails with a config error when the provider has no API key in settings or
/// its conventional environment variable; the gateway builder treats that
/// provider as unconfigured and leaves it out of the fallback order.
pub fn create_provider(id: ProviderId, settings: &ProviderSettings) -> Result<SharedProvider> {
    match id {
        ProviderId::Gemini => Ok(Arc::new(GeminiProvider::new(settings)?)),
        ProviderId::Cerebras => Ok(Arc::new(ChatCompletionsProvider::cerebras(settings)?)),
        ProviderId::OpenRouter => Ok(Arc::new(ChatCompletionsProvider::openrouter(settings)?)),
    }
}

/// Resolve an API key from explicit settings or the environment.
pub(crate) fn resolve_api_key(
    settings: &ProviderSettings,
    env_var: &str,
    provider: ProviderId,
) -> Result<String> {
    settings
        .api_key
        .clone()
        .or_else(|| std::env::var(env_var).ok())
        .filter(|key| !key.is_empty())
        .ok_or_else(|| {
            LensError::Config(format!(
                "{} API key not found. Set {} or providers.{}.api_key",
                provider, env_var, provider
            ))
        })
}
