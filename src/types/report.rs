//! Report Data Model
//!
//! Value types flowing through the pipeline, from the immutable inputs
//! (company profile, prompt batch) to the terminal `VisibilityReport`.
//! Everything is serde-serializable so callers can persist or ship reports
//! in whatever format they choose; this crate defines no wire format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

// =============================================================================
// Inputs
// =============================================================================

/// Identity and positioning of the company under audit.
///
/// Built once per report run (by the intake collaborator or by the caller)
/// and read-only afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub name: String,
    pub summary: String,
    pub industry: String,
    #[serde(default)]
    pub offerings: Vec<String>,
    #[serde(default)]
    pub target_users: Vec<String>,
    #[serde(default)]
    pub problems_solved: Vec<String>,
    #[serde(default)]
    pub manual_notes: Option<String>,
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_region")]
    pub region: String,
}

fn default_region() -> String {
    "Global".to_string()
}

impl Default for CompanyProfile {
    fn default() -> Self {
        Self {
            name: "Pending Analysis...".to_string(),
            summary: "We couldn't extract enough details. Please add more manual notes."
                .to_string(),
            industry: "Industry: Undefined".to_string(),
            offerings: Vec::new(),
            target_users: Vec::new(),
            problems_solved: Vec::new(),
            manual_notes: None,
            url: String::new(),
            region: default_region(),
        }
    }
}

/// One simulated end-user query, tagged with its search intent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prompt {
    pub prompt_text: String,
    /// e.g. "Unbiased Discovery", "Competitive Comparison"
    pub intent_category: String,
}

impl Prompt {
    pub fn new(text: impl Into<String>, intent: impl Into<String>) -> Self {
        Self {
            prompt_text: text.into(),
            intent_category: intent.into(),
        }
    }
}

// =============================================================================
// Sources
// =============================================================================

/// How a source reference entered the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// Certified by the provider's grounding metadata.
    Grounding,
    /// Regex-extracted from the answer text.
    Extracted,
    /// Extracted from a failed generation's error/placeholder text.
    Error,
    /// Synthetic link to the live search for the prompt.
    SearchLink,
}

/// A cited or detected web source attached to one model response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceReference {
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub favicon: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    /// True only when the upstream provider itself certified the citation.
    #[serde(default)]
    pub is_grounded: bool,
    pub source_type: SourceType,
}

/// Placeholder title used for grounding citations that arrive without one.
pub(crate) const UNTITLED_GROUNDED_SOURCE: &str = "Verified Web Source";

impl SourceReference {
    /// A provider-certified citation from grounding metadata.
    pub fn grounded(url: impl Into<String>, title: Option<String>) -> Self {
        Self {
            url: url.into(),
            title: title.unwrap_or_else(|| UNTITLED_GROUNDED_SOURCE.to_string()),
            favicon: None,
            description: None,
            domain: None,
            is_grounded: true,
            source_type: SourceType::Grounding,
        }
    }

    /// A URL detected by scanning the answer text.
    pub fn extracted(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: "Reference found in response".to_string(),
            favicon: None,
            description: None,
            domain: None,
            is_grounded: false,
            source_type: SourceType::Extracted,
        }
    }

    /// A URL salvaged from a failed generation's error/placeholder text.
    pub fn from_error(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: "Reference from error".to_string(),
            favicon: None,
            description: None,
            domain: None,
            is_grounded: false,
            source_type: SourceType::Error,
        }
    }

    /// The synthetic live-search link seeded ahead of grounded citations.
    pub fn search_link(query: &str) -> Self {
        Self {
            url: format!("https://www.google.com/search?q={}", query.replace(' ', "+")),
            title: "Live Google Search Grounding".to_string(),
            favicon: None,
            description: None,
            domain: None,
            is_grounded: false,
            source_type: SourceType::SearchLink,
        }
    }

    /// Whether this source already carries certified, non-placeholder
    /// metadata and can skip the enrichment fetch entirely.
    pub fn has_rich_metadata(&self) -> bool {
        self.is_grounded
            && self.domain.is_some()
            && self.description.is_some()
            && self.title != UNTITLED_GROUNDED_SOURCE
    }
}

// =============================================================================
// Evaluation
// =============================================================================

/// Tone of the answer towards the audited company.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Sentiment {
    Positive,
    #[default]
    Neutral,
    Negative,
}

// Models return sentiment as free-ish text ("positive", "NEUTRAL"). Accept
// any casing; anything unrecognized reads as Neutral rather than failing the
// whole audit parse.
impl<'de> Deserialize<'de> for Sentiment {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.to_lowercase().as_str() {
            "positive" => Sentiment::Positive,
            "negative" => Sentiment::Negative,
            _ => Sentiment::Neutral,
        })
    }
}

/// One rival company spotted in an answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompetitorRank {
    pub name: String,
    #[serde(default)]
    pub rank: Option<u32>,
    #[serde(default)]
    pub url_cited: bool,
}

/// Structured audit of one raw answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationMetric {
    pub brand_present: bool,
    #[serde(default)]
    pub url_cited: bool,
    #[serde(default)]
    pub recommendation_rank: Option<u32>,
    /// 0.0 to 1.0; clamped on construction from model output.
    pub accuracy_score: f64,
    #[serde(default)]
    pub sentiment: Sentiment,
    #[serde(default)]
    pub competitor_ranks: Vec<CompetitorRank>,
}

impl EvaluationMetric {
    /// Neutral metric used when the audit call or its parse fails.
    /// `brand_present` comes from the local substring heuristic.
    pub fn degraded(brand_present: bool) -> Self {
        Self {
            brand_present,
            url_cited: false,
            recommendation_rank: None,
            accuracy_score: 0.0,
            sentiment: Sentiment::Neutral,
            competitor_ranks: Vec::new(),
        }
    }
}

/// One prompt's complete outcome. Exactly one exists per tested prompt,
/// whether generation succeeded or degraded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelResponse {
    pub model_name: String,
    pub response_text: String,
    pub evaluation: EvaluationMetric,
    #[serde(default)]
    pub sources: Vec<SourceReference>,
}

// =============================================================================
// Aggregates
// =============================================================================

/// Cross-prompt rollup for one rival name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompetitorInsight {
    pub name: String,
    pub mentions: usize,
    #[serde(default)]
    pub avg_rank: Option<f64>,
    #[serde(default)]
    pub prompts_appeared: Vec<String>,
    #[serde(default)]
    pub sources: Vec<SourceReference>,
    #[serde(default)]
    pub visibility_reason: String,
}

/// The terminal artifact: one scored, competitor-annotated summary of how
/// the company appears across all tested prompts. Immutable once built;
/// owned exclusively by the caller that requested the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisibilityReport {
    pub company_name: String,
    /// 0 to 100, rounded to 2 decimal places.
    pub overall_score: f64,
    pub queries_tested: Vec<String>,
    pub model_results: Vec<ModelResponse>,
    pub key_findings: Vec<String>,
    pub optimizer_tips: Vec<String>,
    #[serde(default)]
    pub competitor_insights: Vec<CompetitorInsight>,
    pub generated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_link_url_encodes_spaces() {
        let source = SourceReference::search_link("best crm tools india");
        assert_eq!(
            source.url,
            "https://www.google.com/search?q=best+crm+tools+india"
        );
        assert_eq!(source.source_type, SourceType::SearchLink);
        assert!(!source.is_grounded);
    }

    #[test]
    fn test_grounded_source_without_title_gets_placeholder() {
        let source = SourceReference::grounded("https://example.com", None);
        assert_eq!(source.title, UNTITLED_GROUNDED_SOURCE);
        assert!(source.is_grounded);
        assert!(!source.has_rich_metadata());
    }

    #[test]
    fn test_rich_metadata_detection() {
        let mut source = SourceReference::grounded(
            "https://example.com",
            Some("Example Corp".to_string()),
        );
        assert!(!source.has_rich_metadata());

        source.domain = Some("example.com".to_string());
        source.description = Some("An example company.".to_string());
        assert!(source.has_rich_metadata());

        // Regex-extracted sources always need a fetch.
        let extracted = SourceReference::extracted("https://example.com");
        assert!(!extracted.has_rich_metadata());
    }

    #[test]
    fn test_sentiment_tolerant_parse() {
        let positive: Sentiment = serde_json::from_str("\"POSITIVE\"").unwrap();
        assert_eq!(positive, Sentiment::Positive);

        let odd: Sentiment = serde_json::from_str("\"mostly fine\"").unwrap();
        assert_eq!(odd, Sentiment::Neutral);
    }

    #[test]
    fn test_metric_parses_with_missing_optionals() {
        let metric: EvaluationMetric = serde_json::from_str(
            r#"{"brand_present": true, "accuracy_score": 0.7}"#,
        )
        .unwrap();
        assert!(metric.brand_present);
        assert_eq!(metric.recommendation_rank, None);
        assert_eq!(metric.sentiment, Sentiment::Neutral);
        assert!(metric.competitor_ranks.is_empty());
    }
}
