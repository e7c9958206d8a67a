//! Core Domain Types
//!
//! Shared types for the visibility pipeline: provider identity, the report
//! data model, and the unified error type.

pub mod error;
pub mod report;

pub use error::{LensError, ProviderError, ProviderErrorKind, Result};
pub use report::{
    CompanyProfile, CompetitorInsight, CompetitorRank, EvaluationMetric, ModelResponse, Prompt,
    Sentiment, SourceReference, SourceType, VisibilityReport,
};

use serde::{Deserialize, Serialize};

/// Identifies an upstream generative-answer provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    /// Google Generative Language API. The only grounding-capable provider.
    Gemini,
    /// Cerebras inference API (OpenAI-compatible). Fast structured output.
    Cerebras,
    /// OpenRouter (OpenAI-compatible), serving GPT-OSS.
    OpenRouter,
}

impl ProviderId {
    /// All known providers, in default fallback order.
    pub const ALL: [ProviderId; 3] = [
        ProviderId::Gemini,
        ProviderId::Cerebras,
        ProviderId::OpenRouter,
    ];

    /// Stable lowercase name used in config keys and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::Cerebras => "cerebras",
            Self::OpenRouter => "openrouter",
        }
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderId {
    type Err = LensError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "cerebras" => Ok(Self::Cerebras),
            "openrouter" => Ok(Self::OpenRouter),
            other => Err(LensError::Config(format!(
                "Unknown provider: {}. Supported: gemini, cerebras, openrouter",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_id_round_trip() {
        for id in ProviderId::ALL {
            let parsed: ProviderId = id.as_str().parse().unwrap();
            assert_eq!(parsed, id);
        }
    }

    #[test]
    fn test_provider_id_parse_rejects_unknown() {
        assert!("claude".parse::<ProviderId>().is_err());
    }
}
