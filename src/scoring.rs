//! Scoring & Aggregation
//!
//! Reduces per-prompt audit outcomes into the overall visibility score, the
//! competitor rollup, and the narrative summary (one more generative call,
//! with computed defaults when it fails).
//!
//! ## Rank table
//!
//! Applied per prompt, only when the brand is present:
//!
//! | recommendation_rank | base score |
//! |---|---|
//! | 1 | 100 |
//! | 2 | 80 |
//! | 3 | 60 |
//! | 4-5 | 40 |
//! | 6+ | 25 |
//! | present, unranked | 15 |
//!
//! Each base score is scaled by `0.5 + 0.5 * accuracy`; absent brands
//! contribute 0; the overall score is the mean across evaluated prompts,
//! rounded to two decimals.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::constants::scoring;
use crate::provider::{GenerateRequest, ProviderGateway};
use crate::types::{
    CompanyProfile, CompetitorInsight, EvaluationMetric, ModelResponse, ProviderId,
    SourceReference, VisibilityReport,
};
use crate::validation::{extract_json, unwrap_singleton};

/// One prompt's result, still paired with the prompt that produced it.
/// The pairing is what lets competitor insights name the prompts a rival
/// appeared under.
#[derive(Debug, Clone)]
pub struct PromptOutcome {
    pub prompt_text: String,
    pub response: ModelResponse,
}

/// Builds the final report from per-prompt outcomes.
pub struct ScoringAggregator {
    gateway: Arc<ProviderGateway>,
    audit_preference: Option<ProviderId>,
}

impl ScoringAggregator {
    pub fn new(gateway: Arc<ProviderGateway>, audit_preference: Option<ProviderId>) -> Self {
        Self {
            gateway,
            audit_preference,
        }
    }

    /// Reduce outcomes into the terminal report. Infallible: a failed
    /// narrative call degrades to computed defaults.
    pub async fn build_report(
        &self,
        company: &CompanyProfile,
        outcomes: Vec<PromptOutcome>,
    ) -> VisibilityReport {
        let overall_score = overall_score(outcomes.iter().map(|o| &o.response.evaluation));
        let mut insights = competitor_insights(&outcomes);

        let narrative = self.narrative(company, &outcomes, &insights).await;

        let default_reason = default_visibility_reason(company);
        for insight in &mut insights {
            insight.visibility_reason = narrative
                .reasons
                .get(&insight.name)
                .cloned()
                .unwrap_or_else(|| default_reason.clone());
        }

        VisibilityReport {
            company_name: company.name.clone(),
            overall_score,
            queries_tested: outcomes.iter().map(|o| o.prompt_text.clone()).collect(),
            model_results: outcomes.into_iter().map(|o| o.response).collect(),
            key_findings: narrative.key_findings,
            optimizer_tips: narrative.optimizer_tips,
            competitor_insights: insights,
            generated_at: Utc::now(),
        }
    }

    /// Ask a provider for findings, tips, and per-competitor reasons.
    /// Anything short of a well-shaped answer falls back to the computed
    /// defaults.
    async fn narrative(
        &self,
        company: &CompanyProfile,
        outcomes: &[PromptOutcome],
        insights: &[CompetitorInsight],
    ) -> Narrative {
        let defaults = default_narrative(outcomes, insights);

        let provider = self.gateway.audit_provider(self.audit_preference);
        let request = GenerateRequest::json(
            provider,
            build_narrative_prompt(company, outcomes, insights),
        );

        match self.gateway.generate(&request).await {
            Ok(result) => match parse_narrative(&result.text) {
                Ok(payload) => {
                    debug!("Narrative call succeeded");
                    Narrative {
                        key_findings: if payload.key_findings.is_empty() {
                            defaults.key_findings
                        } else {
                            payload.key_findings
                        },
                        optimizer_tips: if payload.optimizer_tips.is_empty() {
                            defaults.optimizer_tips
                        } else {
                            payload.optimizer_tips
                        },
                        reasons: payload.competitor_reasons,
                    }
                }
                Err(err) => {
                    warn!(%err, "Narrative response malformed, using defaults");
                    defaults
                }
            },
            Err(err) => {
                warn!(%err, "Narrative call failed, using defaults");
                defaults
            }
        }
    }
}

// =============================================================================
// Per-Prompt Scoring
// =============================================================================

/// Base score for a recommendation rank (brand already known present).
pub fn base_score(rank: Option<u32>) -> f64 {
    match rank {
        Some(1) => 100.0,
        Some(2) => 80.0,
        Some(3) => 60.0,
        Some(4..=5) => 40.0,
        Some(_) => 25.0,
        None => 15.0,
    }
}

/// One prompt's contribution: the rank's base score scaled by the accuracy
/// penalty factor, or 0 when the brand is absent.
pub fn prompt_score(metric: &EvaluationMetric) -> f64 {
    if !metric.brand_present {
        return 0.0;
    }
    base_score(metric.recommendation_rank) * (0.5 + 0.5 * metric.accuracy_score)
}

/// Mean of per-prompt scores over the prompts actually evaluated, rounded
/// to two decimals. Zero prompts score 0.
pub fn overall_score<'a>(metrics: impl Iterator<Item = &'a EvaluationMetric>) -> f64 {
    let scores: Vec<f64> = metrics.map(prompt_score).collect();
    if scores.is_empty() {
        return 0.0;
    }
    round2(scores.iter().sum::<f64>() / scores.len() as f64)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// =============================================================================
// Competitor Rollup
// =============================================================================

#[derive(Default)]
struct Rollup {
    mentions: usize,
    ranks: Vec<u32>,
    prompts: Vec<String>,
    sources: Vec<SourceReference>,
}

/// Aggregate every competitor seen across outcomes, sorted by mention count
/// descending (first-seen order breaks ties).
pub fn competitor_insights(outcomes: &[PromptOutcome]) -> Vec<CompetitorInsight> {
    let mut order: Vec<String> = Vec::new();
    let mut rollups: HashMap<String, Rollup> = HashMap::new();

    for outcome in outcomes {
        // Collapse within one response first: a name counts one mention per
        // response, and repeats of the same rank are not double-counted.
        let mut per_response: Vec<(String, Vec<u32>)> = Vec::new();
        for competitor in &outcome.response.evaluation.competitor_ranks {
            let name = competitor.name.trim();
            if name.is_empty() {
                continue;
            }
            let idx = match per_response.iter().position(|(n, _)| n == name) {
                Some(idx) => idx,
                None => {
                    per_response.push((name.to_string(), Vec::new()));
                    per_response.len() - 1
                }
            };
            if let Some(rank) = competitor.rank
                && !per_response[idx].1.contains(&rank)
            {
                per_response[idx].1.push(rank);
            }
        }

        for (name, ranks) in per_response {
            if !rollups.contains_key(&name) {
                order.push(name.clone());
            }
            let rollup = rollups.entry(name).or_default();
            rollup.mentions += 1;
            rollup.ranks.extend(ranks);

            if rollup.prompts.len() < scoring::PROMPTS_PER_COMPETITOR
                && !rollup.prompts.contains(&outcome.prompt_text)
            {
                rollup.prompts.push(outcome.prompt_text.clone());
            }

            for source in &outcome.response.sources {
                if rollup.sources.len() >= scoring::SOURCES_PER_COMPETITOR {
                    break;
                }
                if !rollup.sources.iter().any(|s| s.url == source.url) {
                    rollup.sources.push(source.clone());
                }
            }
        }
    }

    let mut insights: Vec<CompetitorInsight> = order
        .into_iter()
        .filter_map(|name| {
            let rollup = rollups.remove(&name)?;
            let avg_rank = (!rollup.ranks.is_empty()).then(|| {
                rollup.ranks.iter().sum::<u32>() as f64 / rollup.ranks.len() as f64
            });
            Some(CompetitorInsight {
                name,
                mentions: rollup.mentions,
                avg_rank,
                prompts_appeared: rollup.prompts,
                sources: rollup.sources,
                visibility_reason: String::new(),
            })
        })
        .collect();

    insights.sort_by(|a, b| b.mentions.cmp(&a.mentions));
    insights
}

// =============================================================================
// Narrative
// =============================================================================

struct Narrative {
    key_findings: Vec<String>,
    optimizer_tips: Vec<String>,
    reasons: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct NarrativePayload {
    #[serde(default)]
    key_findings: Vec<String>,
    #[serde(default)]
    optimizer_tips: Vec<String>,
    #[serde(default)]
    competitor_reasons: HashMap<String, String>,
}

const DEFAULT_OPTIMIZER_TIPS: [&str; 3] = [
    "Publish authoritative, source-linked content answering the discovery queries your audience asks generative engines.",
    "State your offerings, region, and differentiators plainly on the pages search-grounded models cite most.",
    "Review competitor positioning regularly and close the content gaps where rivals outrank you.",
];

fn parse_narrative(raw: &str) -> crate::types::Result<NarrativePayload> {
    let value = unwrap_singleton(extract_json(raw)?);
    Ok(serde_json::from_value(value)?)
}

fn build_narrative_prompt(
    company: &CompanyProfile,
    outcomes: &[PromptOutcome],
    insights: &[CompetitorInsight],
) -> String {
    let (mentions, accuracy_pct) = performance_stats(outcomes);
    let top_competitors: Vec<&str> = insights
        .iter()
        .take(scoring::TOP_COMPETITORS)
        .map(|i| i.name.as_str())
        .collect();

    format!(
        r#"You are a Senior GEO (Generative Engine Optimization) Strategist focusing on the {region} market. Analyze these results for "{name}".

Company Context: {summary}
Performance: {mentions}/{total} mentions, {accuracy}% accuracy.
Focus Region: {region}
Competitors: {competitors}

Instructions:
1. Provide 3-4 specific 'key_findings' about their current AI visibility.
2. Provide 3-4 'optimizer_tips' that are EXTREMELY SPECIFIC to this company's industry and offerings.
3. For each competitor listed, provide a one-sentence reason for its visibility in 'competitor_reasons'.
4. Return valid JSON.

Schema:
{{
  "key_findings": ["insight 1", "insight 2"],
  "optimizer_tips": ["actionable tip 1", "actionable tip 2"],
  "competitor_reasons": {{"Competitor Name": "one sentence reason"}}
}}"#,
        region = company.region,
        name = company.name,
        summary = company.summary,
        mentions = mentions,
        total = outcomes.len(),
        accuracy = accuracy_pct,
        competitors = top_competitors.join(", "),
    )
}

fn default_narrative(outcomes: &[PromptOutcome], insights: &[CompetitorInsight]) -> Narrative {
    let (mentions, accuracy_pct) = performance_stats(outcomes);

    Narrative {
        key_findings: vec![
            format!("Brand mention rate: {}/{}", mentions, outcomes.len()),
            format!("Average information accuracy: {:.1}%", accuracy_pct),
            format!("Total competitors identified: {}", insights.len()),
        ],
        optimizer_tips: DEFAULT_OPTIMIZER_TIPS.iter().map(|t| t.to_string()).collect(),
        reasons: HashMap::new(),
    }
}

fn default_visibility_reason(company: &CompanyProfile) -> String {
    format!(
        "Frequently associated with {} queries in the {} market.",
        company.industry, company.region
    )
}

/// Brand mention count and average accuracy (as a percentage).
fn performance_stats(outcomes: &[PromptOutcome]) -> (usize, f64) {
    let mentions = outcomes
        .iter()
        .filter(|o| o.response.evaluation.brand_present)
        .count();
    let accuracy_pct = if outcomes.is_empty() {
        0.0
    } else {
        let sum: f64 = outcomes
            .iter()
            .map(|o| o.response.evaluation.accuracy_score)
            .sum();
        round2(sum / outcomes.len() as f64 * 100.0)
    };
    (mentions, accuracy_pct)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CompetitorRank, Sentiment};

    fn metric(
        brand_present: bool,
        rank: Option<u32>,
        accuracy: f64,
        competitors: Vec<CompetitorRank>,
    ) -> EvaluationMetric {
        EvaluationMetric {
            brand_present,
            url_cited: false,
            recommendation_rank: rank,
            accuracy_score: accuracy,
            sentiment: Sentiment::Neutral,
            competitor_ranks: competitors,
        }
    }

    fn outcome(prompt: &str, evaluation: EvaluationMetric) -> PromptOutcome {
        PromptOutcome {
            prompt_text: prompt.to_string(),
            response: ModelResponse {
                model_name: "test-model".to_string(),
                response_text: String::new(),
                evaluation,
                sources: Vec::new(),
            },
        }
    }

    #[test]
    fn test_rank_table() {
        let expected = [
            (1, 100.0),
            (2, 80.0),
            (3, 60.0),
            (4, 40.0),
            (5, 40.0),
            (6, 25.0),
            (10, 25.0),
        ];
        for (rank, score) in expected {
            assert_eq!(base_score(Some(rank)), score, "rank {}", rank);
        }
        assert_eq!(base_score(None), 15.0);
    }

    #[test]
    fn test_accuracy_scaling() {
        for rank in [Some(1), Some(2), Some(3), Some(4), Some(6), None] {
            let zero = metric(true, rank, 0.0, Vec::new());
            let full = metric(true, rank, 1.0, Vec::new());
            // 0.0 accuracy exactly halves; 1.0 leaves unchanged.
            assert_eq!(prompt_score(&zero), base_score(rank) * 0.5);
            assert_eq!(prompt_score(&full), base_score(rank));
        }
    }

    #[test]
    fn test_absent_brand_scores_zero() {
        assert_eq!(prompt_score(&metric(false, Some(1), 1.0, Vec::new())), 0.0);
    }

    #[test]
    fn test_overall_score_scenario() {
        // rank 1 @ 0.8 -> 90; absent -> 0; unranked @ 0.5 -> 11.25.
        let metrics = [
            metric(true, Some(1), 0.8, Vec::new()),
            metric(false, None, 0.0, Vec::new()),
            metric(true, None, 0.5, Vec::new()),
        ];
        assert_eq!(overall_score(metrics.iter()), 33.75);
    }

    #[test]
    fn test_overall_score_empty_is_zero() {
        assert_eq!(overall_score(std::iter::empty::<&EvaluationMetric>()), 0.0);
    }

    #[test]
    fn test_competitor_rollup_scenario() {
        let outcomes = vec![
            outcome(
                "prompt a",
                metric(
                    true,
                    Some(1),
                    1.0,
                    vec![CompetitorRank {
                        name: "Acme".to_string(),
                        rank: Some(2),
                        url_cited: false,
                    }],
                ),
            ),
            outcome("prompt b", metric(false, None, 0.0, Vec::new())),
            outcome(
                "prompt c",
                metric(
                    true,
                    Some(3),
                    0.5,
                    vec![CompetitorRank {
                        name: "Acme".to_string(),
                        rank: Some(4),
                        url_cited: true,
                    }],
                ),
            ),
        ];

        let insights = competitor_insights(&outcomes);
        assert_eq!(insights.len(), 1);
        let acme = &insights[0];
        assert_eq!(acme.name, "Acme");
        assert_eq!(acme.mentions, 2);
        assert_eq!(acme.avg_rank, Some(3.0));
        assert_eq!(acme.prompts_appeared, vec!["prompt a", "prompt c"]);
    }

    #[test]
    fn test_duplicate_rank_in_one_response_counted_once() {
        let outcomes = vec![outcome(
            "prompt a",
            metric(
                true,
                Some(1),
                1.0,
                vec![
                    CompetitorRank {
                        name: "Acme".to_string(),
                        rank: Some(2),
                        url_cited: false,
                    },
                    CompetitorRank {
                        name: "Acme".to_string(),
                        rank: Some(2),
                        url_cited: true,
                    },
                ],
            ),
        )];

        let insights = competitor_insights(&outcomes);
        // One response: one mention, one rank entry despite the repeat.
        assert_eq!(insights[0].mentions, 1);
        assert_eq!(insights[0].avg_rank, Some(2.0));
    }

    #[test]
    fn test_competitors_sorted_by_mentions_desc() {
        let rival = |name: &str| CompetitorRank {
            name: name.to_string(),
            rank: None,
            url_cited: false,
        };
        let outcomes = vec![
            outcome("p1", metric(true, None, 0.5, vec![rival("Rare"), rival("Common")])),
            outcome("p2", metric(true, None, 0.5, vec![rival("Common")])),
            outcome("p3", metric(true, None, 0.5, vec![rival("Common")])),
        ];

        let insights = competitor_insights(&outcomes);
        assert_eq!(insights[0].name, "Common");
        assert_eq!(insights[0].mentions, 3);
        assert_eq!(insights[1].name, "Rare");
    }

    #[test]
    fn test_rank_absent_everywhere_means_no_avg() {
        let outcomes = vec![outcome(
            "p1",
            metric(
                true,
                None,
                0.5,
                vec![CompetitorRank {
                    name: "Acme".to_string(),
                    rank: None,
                    url_cited: false,
                }],
            ),
        )];
        assert_eq!(competitor_insights(&outcomes)[0].avg_rank, None);
    }

    mod narrative_tests {
        use super::*;
        use async_trait::async_trait;
        use std::sync::Arc;
        use std::time::Duration;

        use crate::provider::gateway::{GatewayConfig, ResponseFormat};
        use crate::provider::health::ProviderHealthStore;
        use crate::provider::{
            AnswerProvider, GenerateOptions, ProviderAnswer, ProviderGateway, SharedProvider,
        };
        use crate::types::error::{ProviderError, ProviderErrorKind, ProviderResult};

        struct JsonProvider {
            payload: Option<String>,
        }

        #[async_trait]
        impl AnswerProvider for JsonProvider {
            async fn generate(
                &self,
                _prompt: &str,
                _options: &GenerateOptions,
            ) -> ProviderResult<ProviderAnswer> {
                match &self.payload {
                    Some(payload) => Ok(ProviderAnswer::text_only(payload.clone())),
                    None => Err(ProviderError::new(
                        ProviderErrorKind::Other,
                        ProviderId::Cerebras,
                        "scripted failure",
                    )),
                }
            }

            fn id(&self) -> ProviderId {
                ProviderId::Cerebras
            }

            fn display_name(&self) -> String {
                "mock-cerebras".to_string()
            }
        }

        fn aggregator_with(payload: Option<&str>) -> ScoringAggregator {
            let provider: SharedProvider = Arc::new(JsonProvider {
                payload: payload.map(String::from),
            });
            let gateway = Arc::new(
                ProviderGateway::new(
                    vec![provider],
                    ProviderId::Cerebras,
                    Arc::new(ProviderHealthStore::new()),
                    GatewayConfig {
                        max_provider_attempts: 1,
                        base_retry_delay: Duration::from_millis(1),
                        retry_jitter: Duration::ZERO,
                        quota_disable_window: Duration::from_secs(60),
                    },
                )
                .unwrap(),
            );
            ScoringAggregator::new(gateway, None)
        }

        fn company() -> CompanyProfile {
            CompanyProfile {
                name: "Ethosh".to_string(),
                industry: "Immersive Technology".to_string(),
                region: "India".to_string(),
                ..CompanyProfile::default()
            }
        }

        fn sample_outcomes() -> Vec<PromptOutcome> {
            vec![outcome(
                "top firms",
                metric(
                    true,
                    Some(2),
                    0.5,
                    vec![CompetitorRank {
                        name: "Acme".to_string(),
                        rank: Some(1),
                        url_cited: false,
                    }],
                ),
            )]
        }

        #[tokio::test]
        async fn test_narrative_applied_when_well_shaped() {
            let aggregator = aggregator_with(Some(
                r#"{
                    "key_findings": ["Strong niche presence"],
                    "optimizer_tips": ["Publish case studies"],
                    "competitor_reasons": {"Acme": "Dominates broad discovery queries."}
                }"#,
            ));

            let report = aggregator
                .build_report(&company(), sample_outcomes())
                .await;

            assert_eq!(report.key_findings, vec!["Strong niche presence"]);
            assert_eq!(report.optimizer_tips, vec!["Publish case studies"]);
            assert_eq!(
                report.competitor_insights[0].visibility_reason,
                "Dominates broad discovery queries."
            );
            // rank 2 @ 0.5 accuracy: 80 * 0.75.
            assert_eq!(report.overall_score, 60.0);
        }

        #[tokio::test]
        async fn test_narrative_failure_uses_computed_defaults() {
            let aggregator = aggregator_with(None);

            let report = aggregator
                .build_report(&company(), sample_outcomes())
                .await;

            assert_eq!(report.key_findings[0], "Brand mention rate: 1/1");
            assert_eq!(report.key_findings[1], "Average information accuracy: 50.0%");
            assert_eq!(report.key_findings[2], "Total competitors identified: 1");
            assert_eq!(report.optimizer_tips.len(), 3);
            assert_eq!(
                report.competitor_insights[0].visibility_reason,
                "Frequently associated with Immersive Technology queries in the India market."
            );
        }

        #[tokio::test]
        async fn test_narrative_bad_shape_uses_defaults() {
            let aggregator = aggregator_with(Some("not json at all"));

            let report = aggregator
                .build_report(&company(), sample_outcomes())
                .await;

            assert_eq!(report.key_findings[0], "Brand mention rate: 1/1");
            assert!(!report.optimizer_tips.is_empty());
        }
    }
}
