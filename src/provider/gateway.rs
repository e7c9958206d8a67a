//! Provider Gateway
//!
//! Routes one logical generate call across the configured providers with
//! health-aware fallback.
//!
//! ## Routing policy
//!
//! 1. Skip any tier that is disabled (manual flag or unexpired quota window)
//!    without attempting the call.
//! 2. Return on the first successful call.
//! 3. RateLimited: retry the same provider with exponential backoff and
//!    random jitter, up to the attempt cap, then move on.
//! 4. QuotaExhausted: quota-disable the provider for the cool-down window
//!    and move on immediately.
//! 5. AuthFailed: disable the provider until re-enabled and move on.
//! 6. Anything else: move on, health untouched.
//! 7. The final tier is the designated default provider; when it too fails,
//!    the call fails with `NoProviderAvailable` - the only error the
//!    evaluation pipeline ever surfaces.
//!
//! A grounding-capable provider is never asked for structured output and
//! grounded search in the same call: grounding wins, and a second
//! convert-to-JSON call against the same provider produces the structured
//! answer, with the grounded call's citations carried through.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

use super::health::ProviderHealthStore;
use super::{AnswerProvider, GenerateOptions, GroundingCitation, ProviderAnswer, SharedProvider};
use crate::config::Config;
use crate::constants::gateway as gateway_constants;
use crate::types::error::{ProviderError, ProviderErrorKind, ProviderResult};
use crate::types::{LensError, ProviderId, Result};

/// Output shape requested from the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    Text,
    Json,
}

/// One logical generate request.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub prompt: String,
    /// First tier; the remaining configured providers follow, with the
    /// default provider as the final tier.
    pub provider: ProviderId,
    pub format: ResponseFormat,
    pub grounded_search: bool,
}

impl GenerateRequest {
    pub fn text(provider: ProviderId, prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            provider,
            format: ResponseFormat::Text,
            grounded_search: false,
        }
    }

    pub fn json(provider: ProviderId, prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            provider,
            format: ResponseFormat::Json,
            grounded_search: false,
        }
    }

    pub fn with_grounding(mut self, grounded: bool) -> Self {
        self.grounded_search = grounded;
        self
    }
}

/// The full outcome of a routed generate call. Callers that only want the
/// answer read `.text`; the orchestrator also reads the certified citations
/// and the serving provider's label.
#[derive(Debug, Clone)]
pub struct GenerateResult {
    pub text: String,
    pub citations: Vec<GroundingCitation>,
    pub provider: ProviderId,
    pub provider_label: String,
    /// Whether certified web-search grounding actually ran.
    pub grounded: bool,
}

/// Retry/backoff and health-window tuning.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Attempts against one provider before falling back.
    pub max_provider_attempts: u32,
    /// Backoff base; doubles after each rate-limited attempt.
    pub base_retry_delay: Duration,
    /// Random jitter applied to each backoff delay (+/-).
    pub retry_jitter: Duration,
    /// Quota cool-down window.
    pub quota_disable_window: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            max_provider_attempts: gateway_constants::MAX_PROVIDER_ATTEMPTS,
            base_retry_delay: Duration::from_millis(gateway_constants::BASE_RETRY_DELAY_MS),
            retry_jitter: Duration::from_millis(gateway_constants::RETRY_JITTER_MS),
            quota_disable_window: Duration::from_secs(gateway_constants::QUOTA_DISABLE_WINDOW_SECS),
        }
    }
}

/// Uniform generate-text operation over the configured providers.
pub struct ProviderGateway {
    /// Registration order defines the middle fallback tiers.
    providers: Vec<SharedProvider>,
    default_provider: ProviderId,
    health: Arc<ProviderHealthStore>,
    config: GatewayConfig,
}

impl ProviderGateway {
    /// Build from explicit providers. The default provider must be among
    /// them; it becomes the final fallback tier.
    pub fn new(
        providers: Vec<SharedProvider>,
        default_provider: ProviderId,
        health: Arc<ProviderHealthStore>,
        config: GatewayConfig,
    ) -> Result<Self> {
        if providers.is_empty() {
            return Err(LensError::Config(
                "No providers configured in gateway".to_string(),
            ));
        }
        if !providers.iter().any(|p| p.id() == default_provider) {
            return Err(LensError::Config(format!(
                "Default provider {} is not configured",
                default_provider
            )));
        }
        Ok(Self {
            providers,
            default_provider,
            health,
            config,
        })
    }

    /// Build adapters for every provider whose API key resolves, then wire
    /// them into a gateway. Providers without keys are left out of the
    /// fallback order; when the configured default is among them, the first
    /// configured provider takes its place.
    pub fn from_config(config: &Config, health: Arc<ProviderHealthStore>) -> Result<Self> {
        let mut providers: Vec<SharedProvider> = Vec::new();

        for id in ProviderId::ALL {
            match super::create_provider(id, config.providers.settings(id)) {
                Ok(provider) => providers.push(provider),
                Err(err) => info!(provider = %id, %err, "Provider unconfigured, skipping"),
            }
        }

        let configured_default = providers
            .iter()
            .any(|p| p.id() == config.providers.default);
        let default_provider = if configured_default {
            config.providers.default
        } else {
            let fallback = providers
                .first()
                .map(|p| p.id())
                .ok_or_else(|| LensError::Config("No provider has an API key".to_string()))?;
            warn!(
                configured = %config.providers.default,
                using = %fallback,
                "Configured default provider has no key"
            );
            fallback
        };

        let gateway_config = GatewayConfig {
            max_provider_attempts: config.evaluation.max_provider_attempts,
            quota_disable_window: Duration::from_secs(config.evaluation.quota_disable_secs),
            ..GatewayConfig::default()
        };

        Self::new(providers, default_provider, health, gateway_config)
    }

    pub fn default_provider(&self) -> ProviderId {
        self.default_provider
    }

    pub fn health(&self) -> &Arc<ProviderHealthStore> {
        &self.health
    }

    pub fn is_configured(&self, id: ProviderId) -> bool {
        self.providers.iter().any(|p| p.id() == id)
    }

    /// Display label for a configured provider.
    pub fn provider_label(&self, id: ProviderId) -> Option<String> {
        self.providers
            .iter()
            .find(|p| p.id() == id)
            .map(|p| p.display_name())
    }

    /// Provider used for structured audit/narrative calls: the explicit
    /// preference when configured, else cerebras (fast structured output)
    /// when configured, else the default provider.
    pub fn audit_provider(&self, preferred: Option<ProviderId>) -> ProviderId {
        if let Some(id) = preferred
            && self.is_configured(id)
        {
            return id;
        }
        if self.is_configured(ProviderId::Cerebras) {
            return ProviderId::Cerebras;
        }
        self.default_provider
    }

    /// Route a generate call across the fallback tiers.
    #[instrument(skip(self, request), fields(provider = %request.provider, grounded = request.grounded_search))]
    pub async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResult> {
        let mut last_failure: Option<ProviderError> = None;

        for provider in self.tiers(request.provider) {
            let id = provider.id();

            if !self.health.is_enabled(id) {
                debug!(provider = %id, "Skipping disabled provider");
                continue;
            }

            match self.try_provider(provider.as_ref(), request).await {
                Ok(result) => {
                    debug!(provider = %id, "Generate succeeded");
                    return Ok(result);
                }
                Err(err) => {
                    warn!(provider = %id, kind = %err.kind, "Provider failed, falling back");
                    last_failure = Some(err);
                }
            }
        }

        Err(LensError::NoProviderAvailable(match last_failure {
            Some(err) => err.to_string(),
            None => "every configured provider is disabled".to_string(),
        }))
    }

    /// Convenience for callers that only want the answer text.
    pub async fn generate_text(&self, request: &GenerateRequest) -> Result<String> {
        Ok(self.generate(request).await?.text)
    }

    /// Fallback tiers for one request: the requested provider, the other
    /// configured providers in registration order, the default last.
    fn tiers(&self, requested: ProviderId) -> Vec<&SharedProvider> {
        let mut tiers: Vec<&SharedProvider> = Vec::with_capacity(self.providers.len());

        if let Some(first) = self.providers.iter().find(|p| p.id() == requested) {
            tiers.push(first);
        }
        tiers.extend(
            self.providers
                .iter()
                .filter(|p| p.id() != requested && p.id() != self.default_provider),
        );
        if self.default_provider != requested
            && let Some(last) = self
                .providers
                .iter()
                .find(|p| p.id() == self.default_provider)
        {
            tiers.push(last);
        }

        tiers
    }

    /// One tier's worth of work, including the grounding/JSON split call.
    async fn try_provider(
        &self,
        provider: &dyn AnswerProvider,
        request: &GenerateRequest,
    ) -> ProviderResult<GenerateResult> {
        let grounded = request.grounded_search && provider.supports_grounding();

        // Grounding and structured output are mutually exclusive upstream:
        // run the grounded call free-text, then convert with a second call.
        if grounded && request.format == ResponseFormat::Json {
            let answer = self
                .call_with_retry(
                    provider,
                    &request.prompt,
                    GenerateOptions {
                        format: ResponseFormat::Text,
                        grounded_search: true,
                    },
                )
                .await?;

            let conversion = conversion_prompt(&request.prompt, &answer.text);
            let structured = self
                .call_with_retry(
                    provider,
                    &conversion,
                    GenerateOptions {
                        format: ResponseFormat::Json,
                        grounded_search: false,
                    },
                )
                .await?;

            return Ok(GenerateResult {
                text: structured.text,
                citations: answer.citations,
                provider: provider.id(),
                provider_label: provider.display_name(),
                grounded: true,
            });
        }

        let answer = self
            .call_with_retry(
                provider,
                &request.prompt,
                GenerateOptions {
                    format: request.format,
                    grounded_search: grounded,
                },
            )
            .await?;

        Ok(GenerateResult {
            text: answer.text,
            citations: answer.citations,
            provider: provider.id(),
            provider_label: provider.display_name(),
            grounded,
        })
    }

    /// Call one provider, retrying only rate limits. Quota and auth
    /// failures update the health store before bubbling to the tier loop.
    async fn call_with_retry(
        &self,
        provider: &dyn AnswerProvider,
        prompt: &str,
        options: GenerateOptions,
    ) -> ProviderResult<ProviderAnswer> {
        let mut delay = self.config.base_retry_delay;
        let mut attempt = 1;

        loop {
            match provider.generate(prompt, &options).await {
                Ok(answer) => return Ok(answer),
                Err(err) => match err.kind {
                    ProviderErrorKind::RateLimited
                        if attempt < self.config.max_provider_attempts =>
                    {
                        let wait = err
                            .retry_after
                            .unwrap_or_else(|| jittered(delay, self.config.retry_jitter));
                        info!(
                            provider = %err.provider,
                            attempt,
                            wait_ms = wait.as_millis() as u64,
                            "Rate limited, retrying"
                        );
                        sleep(wait).await;
                        delay = delay.saturating_mul(2);
                        attempt += 1;
                    }
                    ProviderErrorKind::RateLimited => return Err(err),
                    ProviderErrorKind::QuotaExhausted => {
                        error!(provider = %err.provider, "Hard quota exhausted");
                        self.health
                            .disable_for_quota(err.provider, self.config.quota_disable_window);
                        return Err(err);
                    }
                    ProviderErrorKind::AuthFailed => {
                        error!(provider = %err.provider, "Authentication failed");
                        self.health.disable_manual(err.provider);
                        return Err(err);
                    }
                    ProviderErrorKind::Other => return Err(err),
                },
            }
        }
    }
}

/// Prompt for the follow-up call that turns a grounded free-text answer
/// into the structured output the original instructions asked for.
fn conversion_prompt(original_prompt: &str, answer: &str) -> String {
    format!(
        "Convert the following answer into the JSON format requested by the \
         original instructions. Return only valid JSON.\n\n\
         Original instructions:\n{}\n\nAnswer:\n{}",
        original_prompt, answer
    )
}

/// Apply +/- jitter to a backoff delay, clamped at zero.
fn jittered(delay: Duration, jitter: Duration) -> Duration {
    if jitter.is_zero() {
        return delay;
    }
    let jitter_ms = jitter.as_millis() as i64;
    let offset = rand::rng().random_range(-jitter_ms..=jitter_ms);
    let delay_ms = delay.as_millis() as i64;
    Duration::from_millis((delay_ms + offset).max(0) as u64)
}
