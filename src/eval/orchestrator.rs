//! Evaluation Orchestrator
//!
//! Runs one prompt pipeline per test query under bounded concurrency:
//! generate → seed grounded sources → extract URLs → enrich → audit →
//! assemble. Nothing a single prompt does can abort the batch: every
//! failure degrades into a placeholder answer with a neutral metric, so
//! every prompt tested produces exactly one `ModelResponse`.

use std::sync::Arc;

use futures::StreamExt;
use tracing::{debug, info, warn};

use super::audit::{build_audit_prompt, heuristic_metric, parse_audit};
use crate::config::Config;
use crate::provider::{GenerateRequest, ProviderGateway};
use crate::scoring::{PromptOutcome, ScoringAggregator};
use crate::sources::{SourceEnricher, extract_urls};
use crate::types::{
    CompanyProfile, ModelResponse, Prompt, ProviderId, SourceReference, VisibilityReport,
};

/// Label attached to responses produced with certified search grounding.
const GROUNDED_MODEL_LABEL: &str = "Google AI Search";

/// Caller-selected knobs for one evaluation run.
#[derive(Debug, Clone)]
pub struct EvaluationOptions {
    /// First-tier provider for the raw answers.
    pub provider: ProviderId,
    /// Ask for certified web-search grounding where supported.
    pub grounded_search: bool,
}

impl EvaluationOptions {
    pub fn new(provider: ProviderId) -> Self {
        Self {
            provider,
            grounded_search: false,
        }
    }

    pub fn with_grounding(mut self, grounded: bool) -> Self {
        self.grounded_search = grounded;
        self
    }
}

/// Fans prompt pipelines out across the gateway and assembles the report.
pub struct EvaluationOrchestrator {
    gateway: Arc<ProviderGateway>,
    enricher: Arc<SourceEnricher>,
    aggregator: ScoringAggregator,
    prompt_concurrency: usize,
    audit_preference: Option<ProviderId>,
}

impl EvaluationOrchestrator {
    pub fn new(
        gateway: Arc<ProviderGateway>,
        enricher: Arc<SourceEnricher>,
        config: &Config,
    ) -> Self {
        Self {
            aggregator: ScoringAggregator::new(
                Arc::clone(&gateway),
                config.evaluation.audit_provider,
            ),
            gateway,
            enricher,
            prompt_concurrency: config.evaluation.prompt_concurrency,
            audit_preference: config.evaluation.audit_provider,
        }
    }

    /// Evaluate every prompt and reduce the outcomes to a report.
    ///
    /// Pipelines run concurrently up to the configured limit and complete
    /// in no particular order; each runs to completion even when siblings
    /// degrade.
    pub async fn evaluate(
        &self,
        company: &CompanyProfile,
        prompts: &[Prompt],
        options: &EvaluationOptions,
    ) -> VisibilityReport {
        info!(
            prompts = prompts.len(),
            provider = %options.provider,
            grounded = options.grounded_search,
            concurrency = self.prompt_concurrency,
            "Starting evaluation run"
        );

        let outcomes: Vec<PromptOutcome> = futures::stream::iter(prompts)
            .map(|prompt| async move {
                let response = self.evaluate_prompt(company, prompt, options).await;
                PromptOutcome {
                    prompt_text: prompt.prompt_text.clone(),
                    response,
                }
            })
            .buffer_unordered(self.prompt_concurrency)
            .collect()
            .await;

        info!(completed = outcomes.len(), "Evaluation run complete");

        self.aggregator.build_report(company, outcomes).await
    }

    /// One prompt's full pipeline. Infallible by construction.
    async fn evaluate_prompt(
        &self,
        company: &CompanyProfile,
        prompt: &Prompt,
        options: &EvaluationOptions,
    ) -> ModelResponse {
        debug!(prompt = %prompt.prompt_text, stage = "generating", "Testing prompt");

        let request = GenerateRequest::text(options.provider, prompt.prompt_text.clone())
            .with_grounding(options.grounded_search);

        let mut sources: Vec<SourceReference> = Vec::new();

        let (response_text, model_name) = match self.gateway.generate(&request).await {
            Ok(result) => {
                // Rich results seed the synthetic search link plus every
                // certified citation ahead of anything regex finds.
                if result.grounded || !result.citations.is_empty() {
                    push_unique(&mut sources, SourceReference::search_link(&prompt.prompt_text));
                    for citation in &result.citations {
                        push_unique(
                            &mut sources,
                            SourceReference::grounded(&citation.url, citation.title.clone()),
                        );
                    }
                }

                for url in extract_urls(&result.text) {
                    push_unique(&mut sources, SourceReference::extracted(url));
                }

                let label = if result.grounded {
                    GROUNDED_MODEL_LABEL.to_string()
                } else {
                    result.provider_label.clone()
                };
                (result.text, label)
            }
            Err(err) => {
                let error_text = err.to_string();
                warn!(%error_text, prompt = %prompt.prompt_text, "Generation failed, degrading");

                let placeholder = failure_placeholder(&error_text);

                // Partial references hiding in the error or placeholder
                // text are still worth keeping.
                for url in extract_urls(&format!("{} {}", placeholder, error_text)) {
                    push_unique(&mut sources, SourceReference::from_error(url));
                }

                let label = if options.grounded_search {
                    GROUNDED_MODEL_LABEL.to_string()
                } else {
                    self.gateway
                        .provider_label(options.provider)
                        .unwrap_or_else(|| options.provider.to_string())
                };
                (placeholder, label)
            }
        };

        debug!(stage = "extracting", count = sources.len(), "Enriching sources");
        let sources = self.enricher.enrich(sources).await;

        debug!(stage = "auditing", "Auditing response");
        let audit_provider = self.gateway.audit_provider(self.audit_preference);
        let audit_request = GenerateRequest::json(
            audit_provider,
            build_audit_prompt(company, &response_text),
        );

        let evaluation = match self.gateway.generate(&audit_request).await {
            Ok(result) => parse_audit(&result.text).unwrap_or_else(|err| {
                warn!(%err, "Audit parse failed, using heuristic");
                heuristic_metric(&company.name, &response_text)
            }),
            Err(err) => {
                warn!(%err, "Audit call failed, using heuristic");
                heuristic_metric(&company.name, &response_text)
            }
        };

        debug!(stage = "complete", sources = sources.len(), "Prompt pipeline done");

        ModelResponse {
            model_name,
            response_text,
            evaluation,
            sources,
        }
    }
}

/// User-facing explanation substituted for a failed generation, selected by
/// matching the error text against known categories.
fn failure_placeholder(error_text: &str) -> String {
    let lower = error_text.to_lowercase();
    if lower.contains("grounding") || lower.contains("google_search") {
        "Google Search grounding is not available with your API key. \
         Please use standard mode or upgrade your API access."
            .to_string()
    } else if lower.contains("quota") {
        "API quota exceeded. Please try again later or check your API limits.".to_string()
    } else if lower.contains("api key") || lower.contains("auth") {
        "API key error. Please verify your provider credentials.".to_string()
    } else {
        format!("Analysis error: {}", error_text)
    }
}

/// Append a source unless its URL is already present.
fn push_unique(sources: &mut Vec<SourceReference>, source: SourceReference) {
    if !sources.iter().any(|existing| existing.url == source.url) {
        sources.push(source);
    }
}
