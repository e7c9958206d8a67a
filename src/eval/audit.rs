//! Answer Auditing
//!
//! Builds the audit prompt that turns one raw answer into structured
//! metrics, parses the model's JSON strictly, and provides the local
//! heuristic substitute used when parsing or shape validation fails.

use tracing::debug;

use crate::types::{CompanyProfile, EvaluationMetric, Result};
use crate::validation::{extract_json, unwrap_singleton};

/// Prompt instructing the audit model to score one answer against the
/// company, returning the fixed metric schema.
pub fn build_audit_prompt(company: &CompanyProfile, response_text: &str) -> String {
    format!(
        r#"You are an AI Search Visibility Auditor focusing on the {region} market. Analyze the "Model Response" provided below to see how "{name}" is positioned within this specific regional context.

Model Response:
"""
{response_text}
"""

Audit requirements for "{name}":
1. brand_present: Is the company mentioned? (true/false)
2. url_cited: Is the company's website URL mentioned or linked? (true/false)
3. recommendation_rank: If mentioned, what is its position in the list (1, 2, 3...)? If not mentioned, null.
4. accuracy_score: How accurately did the model describe the company's offerings? (0.0 to 1.0)
5. sentiment: What is the tone regarding this company? (Positive, Neutral, Negative)
6. competitor_ranks: List of OTHER companies mentioned. For each, provide:
   - name: String
   - rank: Integer (position in list) or null
   - url_cited: bool (if their URL/link is present)

Return valid JSON:
{{
  "brand_present": bool,
  "url_cited": bool,
  "recommendation_rank": int or null,
  "accuracy_score": float,
  "sentiment": "Positive|Neutral|Negative",
  "competitor_ranks": [
    {{"name": "string", "rank": int, "url_cited": bool}}
  ]
}}"#,
        region = company.region,
        name = company.name,
        response_text = response_text,
    )
}

/// Parse an audit response into a metric. Tolerates fences and the
/// single-element-array wrap; anything else fails shape validation and the
/// caller falls back to [`heuristic_metric`].
pub fn parse_audit(raw: &str) -> Result<EvaluationMetric> {
    let value = unwrap_singleton(extract_json(raw)?);
    let mut metric: EvaluationMetric = serde_json::from_value(value)?;
    metric.accuracy_score = metric.accuracy_score.clamp(0.0, 1.0);
    Ok(metric)
}

/// Purely local substitute for a failed audit: brand presence from a
/// case-insensitive substring test, everything else neutral/absent.
pub fn heuristic_metric(company_name: &str, response_text: &str) -> EvaluationMetric {
    debug!("Falling back to heuristic audit");
    let brand = company_name.trim().to_lowercase();
    let brand_present = !brand.is_empty() && response_text.to_lowercase().contains(&brand);
    EvaluationMetric::degraded(brand_present)
}
