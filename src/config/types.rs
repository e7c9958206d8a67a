//! Configuration Types
//!
//! Note: API keys are handled securely - they are never serialized back out
//! and each provider adapter converts its key to a SecretString internally
//! for runtime protection. Keys may also come from the provider's
//! conventional environment variable (GEMINI_API_KEY, CEREBRAS_API_KEY,
//! OPENROUTER_API_KEY).

use serde::{Deserialize, Serialize};

use crate::constants::{enrichment, evaluation, gateway};
use crate::types::{LensError, ProviderId, Result};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub providers: ProvidersConfig,
    pub evaluation: EvaluationConfig,
    pub enrichment: EnrichmentConfig,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.evaluation.prompt_concurrency == 0 {
            return Err(LensError::Config(
                "evaluation.prompt_concurrency must be at least 1".to_string(),
            ));
        }
        if self.evaluation.max_provider_attempts == 0 {
            return Err(LensError::Config(
                "evaluation.max_provider_attempts must be at least 1".to_string(),
            ));
        }
        if self.enrichment.fetch_concurrency == 0 {
            return Err(LensError::Config(
                "enrichment.fetch_concurrency must be at least 1".to_string(),
            ));
        }
        if self.enrichment.fetch_timeout_secs == 0 {
            return Err(LensError::Config(
                "enrichment.fetch_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Per-provider connection settings plus gateway routing choices.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    /// Final fallback tier; also the provider used when a caller does not
    /// ask for a specific one.
    pub default: ProviderId,
    pub gemini: ProviderSettings,
    pub cerebras: ProviderSettings,
    pub openrouter: ProviderSettings,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            default: ProviderId::Gemini,
            gemini: ProviderSettings::with_model("gemini-1.5-flash"),
            cerebras: ProviderSettings::with_model("llama-3.3-70b"),
            openrouter: ProviderSettings::with_model("openai/gpt-oss-120b"),
        }
    }
}

impl ProvidersConfig {
    pub fn settings(&self, id: ProviderId) -> &ProviderSettings {
        match id {
            ProviderId::Gemini => &self.gemini,
            ProviderId::Cerebras => &self.cerebras,
            ProviderId::OpenRouter => &self.openrouter,
        }
    }
}

/// One upstream service's connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub model: String,
    /// Never serialized back out.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Override for custom endpoints / test servers.
    pub api_base: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            model: String::new(),
            api_key: None,
            api_base: None,
            timeout_secs: 60,
        }
    }
}

impl ProviderSettings {
    pub fn with_model(model: &str) -> Self {
        Self {
            model: model.to_string(),
            ..Self::default()
        }
    }
}

/// Evaluation pipeline tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Prompt pipelines in flight at once.
    pub prompt_concurrency: usize,
    /// Attempts against one provider before falling back.
    pub max_provider_attempts: u32,
    /// Seconds a provider stays disabled after a hard quota failure.
    pub quota_disable_secs: u64,
    /// Provider preferred for structured audit/narrative calls. When unset,
    /// cerebras is used if it has a key, else the default provider.
    pub audit_provider: Option<ProviderId>,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            prompt_concurrency: evaluation::PROMPT_CONCURRENCY,
            max_provider_attempts: gateway::MAX_PROVIDER_ATTEMPTS,
            quota_disable_secs: gateway::QUOTA_DISABLE_WINDOW_SECS,
            audit_provider: None,
        }
    }
}

/// Source metadata enrichment tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    /// Concurrent metadata fetches across all prompts.
    pub fetch_concurrency: usize,
    pub fetch_timeout_secs: u64,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            fetch_concurrency: enrichment::FETCH_CONCURRENCY,
            fetch_timeout_secs: enrichment::FETCH_TIMEOUT_SECS,
        }
    }
}
