//! Intake Collaborators
//!
//! The two single-call generative collaborators that feed the pipeline:
//! summarizing already-crawled site text into a [`CompanyProfile`], and
//! generating the batch of test prompts from one. Crawling itself is out of
//! scope - callers hand in whatever text they gathered. Both calls validate
//! the JSON shape strictly and degrade to fixed fallbacks, mirroring the
//! audit path's recovery discipline.

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::warn;

use crate::constants::intake;
use crate::provider::{GenerateRequest, ProviderGateway};
use crate::types::{CompanyProfile, LensError, Prompt, Result};
use crate::validation::{extract_json, unwrap_singleton};

// =============================================================================
// Company Profile Builder
// =============================================================================

/// Summarize crawled site text plus manual notes into a profile.
///
/// Never fails: when the call or its parse does, the profile comes back in
/// its degraded "Analysis Pending" form with the caller's notes, URL, and
/// region preserved.
pub async fn build_profile(
    gateway: &ProviderGateway,
    site_text: &str,
    manual_notes: &str,
    url: &str,
    region: &str,
) -> CompanyProfile {
    let request = GenerateRequest::json(
        gateway.audit_provider(None),
        build_summary_prompt(site_text, manual_notes, region),
    );

    let payload = match gateway.generate(&request).await {
        Ok(result) => match parse_profile(&result.text) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(%err, "Profile summary malformed, using degraded profile");
                return degraded_profile(manual_notes, url, region);
            }
        },
        Err(err) => {
            warn!(%err, "Profile summary call failed, using degraded profile");
            return degraded_profile(manual_notes, url, region);
        }
    };

    CompanyProfile {
        name: non_empty_or(payload.company_name, "Analysis Pending"),
        summary: non_empty_or(payload.company_summary, "Summary unavailable."),
        industry: non_empty_or(payload.industry, "Industry: Undefined"),
        offerings: payload.offerings,
        target_users: payload.target_users,
        problems_solved: payload.core_problems_solved,
        manual_notes: (!manual_notes.trim().is_empty()).then(|| manual_notes.to_string()),
        url: url.to_string(),
        region: region.to_string(),
    }
}

fn build_summary_prompt(site_text: &str, manual_notes: &str, region: &str) -> String {
    format!(
        r#"You are a professional business analyst focusing on the {region} market. Your task is to extract key information about a company.
You have two sources of information:
1. Website Content (Crawl)
2. Manual User Points (Specific Details)

---
WEBSITE CONTENT:
"""
{site_text}
"""

---
MANUAL USER POINTS:
"""
{manual_notes}
"""

Instructions:
1. Extraction: Merge information from both sources. Prioritize Manual User Points.
2. If a field is unknown, return an empty list [] or "N/A".
3. Return valid JSON only.

JSON Schema:
{{
  "company_name": "Official name.",
  "company_summary": "2-3 sentence overview.",
  "industry": "Primary industry.",
  "offerings": ["List of products/services"],
  "target_users": ["List of customers"],
  "core_problems_solved": ["List of problems"]
}}"#,
        region = region,
        site_text = if site_text.trim().is_empty() {
            "No website content available."
        } else {
            site_text
        },
        manual_notes = manual_notes,
    )
}

#[derive(Debug, Deserialize)]
struct ProfilePayload {
    #[serde(default)]
    company_name: String,
    #[serde(default)]
    company_summary: String,
    #[serde(default)]
    industry: String,
    #[serde(default, deserialize_with = "list_or_single")]
    offerings: Vec<String>,
    #[serde(default, deserialize_with = "list_or_single")]
    target_users: Vec<String>,
    #[serde(default, deserialize_with = "list_or_single")]
    core_problems_solved: Vec<String>,
}

fn parse_profile(raw: &str) -> Result<ProfilePayload> {
    let value = unwrap_singleton(extract_json(raw)?);
    Ok(serde_json::from_value(value)?)
}

/// Models sometimes return a lone string where a list was asked for.
/// Accept it, unless it is one of the stock "nothing here" markers.
fn list_or_single<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        List(Vec<String>),
        Single(String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::List(items)) => items,
        Some(Raw::Single(single)) => {
            let trimmed = single.trim();
            if trimmed.is_empty()
                || matches!(trimmed, "N/A" | "None" | "Information not available")
            {
                Vec::new()
            } else {
                vec![single]
            }
        }
        None => Vec::new(),
    })
}

fn non_empty_or(value: String, fallback: &str) -> String {
    if value.trim().is_empty() {
        fallback.to_string()
    } else {
        value
    }
}

fn degraded_profile(manual_notes: &str, url: &str, region: &str) -> CompanyProfile {
    let has_notes = !manual_notes.trim().is_empty();
    CompanyProfile {
        name: if has_notes { "Analysis Pending" } else { "Unknown" }.to_string(),
        summary: "Could not automatically summarize company data.".to_string(),
        manual_notes: has_notes.then(|| manual_notes.to_string()),
        url: url.to_string(),
        region: region.to_string(),
        ..CompanyProfile::default()
    }
}

// =============================================================================
// Prompt Generator
// =============================================================================

/// Generate the batch of realistic test queries for a profile.
///
/// Never fails: a failed call or unusable shape yields a two-entry static
/// fallback so the evaluation run can still proceed.
pub async fn generate_prompts(gateway: &ProviderGateway, company: &CompanyProfile) -> Vec<Prompt> {
    let request = GenerateRequest::json(gateway.default_provider(), build_query_prompt(company));

    match gateway.generate(&request).await {
        Ok(result) => match parse_prompt_list(&result.text) {
            Ok(prompts) if !prompts.is_empty() => prompts
                .into_iter()
                .take(intake::PROMPT_BATCH_SIZE)
                .collect(),
            Ok(_) => {
                warn!("Prompt generator returned an empty list, using fallback prompts");
                fallback_prompts(company)
            }
            Err(err) => {
                warn!(%err, "Prompt list malformed, using fallback prompts");
                fallback_prompts(company)
            }
        },
        Err(err) => {
            warn!(%err, "Prompt generation call failed, using fallback prompts");
            fallback_prompts(company)
        }
    }
}

fn build_query_prompt(company: &CompanyProfile) -> String {
    let niche_topic = company
        .offerings
        .first()
        .cloned()
        .unwrap_or_else(|| "the industry".to_string());

    format!(
        r#"You are an expert in Generative Engine Optimization (GEO). Your task is to generate {count} realistic and highly diverse user queries that someone might ask an AI (like ChatGPT or Gemini) to find services or companies in the industry: {industry}.
The user is located in or interested in the region: {region}. Ensure queries reflect local terminology and search intent for this specific market.

Company Context:
- Name: {name}
- Offerings: {offerings}
- Problems Solved: {problems}
- Focus Region: {region}

Generate a total of {count} queries distributed across these categories:
1. Unbiased Discovery: (Broad searches for top companies/tools in the sector)
2. Specific Solution-Seeking: (Focus on solving specific technical or business pain points)
3. Competitive Comparison: (Comparing top players or asking for alternatives)
4. Intent-Based / Transactional: (Ready to hire or looking for a specific project partner)
5. Brand Awareness & Verification: (Direct questions about {name})
6. Long-Tail / Niche: (Very specific or technical queries related to {niche})

Requirements:
- Ensure the queries sound like real humans asking an AI.
- Mix high-level and granular queries.
- Return exactly {count} queries.
- Return a JSON list of objects with "prompt_text" and "intent_category"."#,
        count = intake::PROMPT_BATCH_SIZE,
        industry = company.industry,
        region = company.region,
        name = company.name,
        offerings = company.offerings.join(", "),
        problems = company.problems_solved.join(", "),
        niche = niche_topic,
    )
}

/// Wrapper keys models are known to tuck the list under.
const LIST_WRAPPER_KEYS: [&str; 5] = ["queries", "prompts", "results", "data", "test_prompts"];

fn parse_prompt_list(raw: &str) -> Result<Vec<Prompt>> {
    let value = extract_json(raw)?;

    let items = match value {
        Value::Array(items) => items,
        // Single recovery attempt: a well-known wrapper key holding a list.
        Value::Object(ref map) => LIST_WRAPPER_KEYS
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_array).cloned())
            .ok_or_else(|| {
                LensError::ModelOutput("Prompt generator did not return a list".to_string())
            })?,
        _ => {
            return Err(LensError::ModelOutput(
                "Prompt generator did not return a list".to_string(),
            ));
        }
    };

    Ok(serde_json::from_value(Value::Array(items))?)
}

fn fallback_prompts(company: &CompanyProfile) -> Vec<Prompt> {
    let leader_topic = company
        .offerings
        .first()
        .cloned()
        .unwrap_or_else(|| company.industry.clone());
    vec![
        Prompt::new(format!("Top companies in {}", company.industry), "Discovery"),
        Prompt::new(format!("Who is the leader in {}?", leader_topic), "Discovery"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::provider::gateway::GatewayConfig;
    use crate::provider::health::ProviderHealthStore;
    use crate::provider::{AnswerProvider, GenerateOptions, ProviderAnswer, SharedProvider};
    use crate::types::ProviderId;
    use crate::types::error::{ProviderError, ProviderErrorKind, ProviderResult};

    #[test]
    fn test_parse_prompt_list_bare_array() {
        let prompts = parse_prompt_list(
            r#"[{"prompt_text": "best crm tools", "intent_category": "Discovery"}]"#,
        )
        .unwrap();
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0].prompt_text, "best crm tools");
    }

    #[test]
    fn test_parse_prompt_list_wrapped_in_known_key() {
        let prompts = parse_prompt_list(
            r#"{"queries": [{"prompt_text": "q", "intent_category": "Niche"}]}"#,
        )
        .unwrap();
        assert_eq!(prompts.len(), 1);
    }

    #[test]
    fn test_parse_prompt_list_rejects_unknown_shape() {
        assert!(parse_prompt_list(r#"{"unexpected": {"a": 1}}"#).is_err());
        assert!(parse_prompt_list("no json here").is_err());
    }

    #[test]
    fn test_profile_payload_coerces_single_strings() {
        let payload = parse_profile(
            r#"{
                "company_name": "Ethosh",
                "company_summary": "Digital experiences.",
                "industry": "Immersive Technology",
                "offerings": "Virtual labs",
                "target_users": "N/A",
                "core_problems_solved": null
            }"#,
        )
        .unwrap();
        assert_eq!(payload.offerings, vec!["Virtual labs"]);
        assert!(payload.target_users.is_empty());
        assert!(payload.core_problems_solved.is_empty());
    }

    struct StaticProvider {
        payload: Option<String>,
    }

    #[async_trait]
    impl AnswerProvider for StaticProvider {
        async fn generate(
            &self,
            _prompt: &str,
            _options: &GenerateOptions,
        ) -> ProviderResult<ProviderAnswer> {
            match &self.payload {
                Some(payload) => Ok(ProviderAnswer::text_only(payload.clone())),
                None => Err(ProviderError::new(
                    ProviderErrorKind::Other,
                    ProviderId::Gemini,
                    "scripted failure",
                )),
            }
        }

        fn id(&self) -> ProviderId {
            ProviderId::Gemini
        }

        fn display_name(&self) -> String {
            "mock-gemini".to_string()
        }
    }

    fn gateway_with(payload: Option<&str>) -> ProviderGateway {
        let provider: SharedProvider = Arc::new(StaticProvider {
            payload: payload.map(String::from),
        });
        ProviderGateway::new(
            vec![provider],
            ProviderId::Gemini,
            Arc::new(ProviderHealthStore::new()),
            GatewayConfig {
                max_provider_attempts: 1,
                base_retry_delay: Duration::from_millis(1),
                retry_jitter: Duration::ZERO,
                quota_disable_window: Duration::from_secs(60),
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_build_profile_success() {
        let gateway = gateway_with(Some(
            r#"{
                "company_name": "Ethosh",
                "company_summary": "Ethosh crafts digital experiences.",
                "industry": "Immersive Technology",
                "offerings": ["Virtual labs", "3D visualization"],
                "target_users": ["Pharma"],
                "core_problems_solved": ["Training cost"]
            }"#,
        ));

        let profile = build_profile(&gateway, "site text", "notes", "https://ethosh.com", "India")
            .await;

        assert_eq!(profile.name, "Ethosh");
        assert_eq!(profile.offerings.len(), 2);
        assert_eq!(profile.manual_notes.as_deref(), Some("notes"));
        assert_eq!(profile.region, "India");
    }

    #[tokio::test]
    async fn test_build_profile_degrades_on_failure() {
        let gateway = gateway_with(None);

        let with_notes = build_profile(&gateway, "", "some notes", "", "Global").await;
        assert_eq!(with_notes.name, "Analysis Pending");

        let without_notes = build_profile(&gateway, "", "", "", "Global").await;
        assert_eq!(without_notes.name, "Unknown");
        assert_eq!(
            without_notes.summary,
            "Could not automatically summarize company data."
        );
    }

    #[tokio::test]
    async fn test_generate_prompts_caps_batch() {
        let many: Vec<Value> = (0..30)
            .map(|i| {
                serde_json::json!({
                    "prompt_text": format!("query {}", i),
                    "intent_category": "Discovery"
                })
            })
            .collect();
        let gateway = gateway_with(Some(&serde_json::to_string(&many).unwrap()));

        let prompts = generate_prompts(&gateway, &CompanyProfile::default()).await;
        assert_eq!(prompts.len(), intake::PROMPT_BATCH_SIZE);
    }

    #[tokio::test]
    async fn test_generate_prompts_fallback() {
        let gateway = gateway_with(None);
        let company = CompanyProfile {
            industry: "Immersive Technology".to_string(),
            offerings: vec!["Virtual labs".to_string()],
            ..CompanyProfile::default()
        };

        let prompts = generate_prompts(&gateway, &company).await;
        assert_eq!(prompts.len(), 2);
        assert_eq!(prompts[0].prompt_text, "Top companies in Immersive Technology");
        assert_eq!(prompts[1].prompt_text, "Who is the leader in Virtual labs?");
    }
}
