//! Gemini API Provider
//!
//! Adapter for the Google Generative Language API. The only provider in the
//! set that can run certified web-search grounding; grounded answers carry
//! the citations the upstream attached in `groundingMetadata`.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{AnswerProvider, GenerateOptions, GroundingCitation, ProviderAnswer, ResponseFormat};
use crate::config::ProviderSettings;
use crate::types::error::{ProviderError, ProviderErrorKind, ProviderResult};
use crate::types::{ProviderId, Result};

const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Google Generative Language adapter with secure API key handling.
pub struct GeminiProvider {
    /// Never exposed in logs or debug output.
    api_key: SecretString,
    api_base: String,
    model: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("api_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .finish()
    }
}

impl GeminiProvider {
    pub fn new(settings: &ProviderSettings) -> Result<Self> {
        let api_key = super::resolve_api_key(settings, "GEMINI_API_KEY", ProviderId::Gemini)?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        Ok(Self {
            api_key: SecretString::from(api_key),
            api_base: settings
                .api_base
                .clone()
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            model: settings.model.clone(),
            client,
        })
    }

    fn build_request(&self, prompt: &str, options: &GenerateOptions) -> GenerateContentRequest {
        // Grounding and structured output are mutually exclusive upstream;
        // the gateway never asks for both, so trust the options as given.
        let tools = options.grounded_search.then(|| {
            vec![Tool {
                google_search: EmptyObject {},
            }]
        });

        let generation_config = (options.format == ResponseFormat::Json
            && !options.grounded_search)
            .then(|| GenerationConfig {
                response_mime_type: "application/json".to_string(),
            });

        GenerateContentRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart {
                    text: prompt.to_string(),
                }],
            }],
            tools,
            generation_config,
        }
    }
}

#[async_trait]
impl AnswerProvider for GeminiProvider {
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerateOptions,
    ) -> ProviderResult<ProviderAnswer> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.api_base, self.model
        );

        debug!(model = %self.model, grounded = options.grounded_search, "Calling Gemini");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&self.build_request(prompt, options))
            .send()
            .await
            .map_err(|e| ProviderError::transport(ProviderId::Gemini, &e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(response.headers());
            let body = response.text().await.unwrap_or_default();
            let mut err = ProviderError::from_http(ProviderId::Gemini, status.as_u16(), body);
            if let Some(wait) = retry_after {
                err = err.retry_after(wait);
            }
            return Err(err);
        }

        let body: GenerateContentResponse = response.json().await.map_err(|e| {
            ProviderError::new(
                ProviderErrorKind::Other,
                ProviderId::Gemini,
                format!("Failed to parse Gemini response: {}", e),
            )
        })?;

        let candidate = body.candidates.into_iter().next().ok_or_else(|| {
            ProviderError::new(
                ProviderErrorKind::Other,
                ProviderId::Gemini,
                "No candidates in Gemini response",
            )
        })?;

        let text = candidate
            .content
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        let citations = candidate
            .grounding_metadata
            .map(|metadata| {
                metadata
                    .grounding_chunks
                    .into_iter()
                    .filter_map(|chunk| chunk.web)
                    .filter_map(|web| {
                        web.uri.map(|uri| GroundingCitation {
                            url: uri,
                            title: web.title,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(ProviderAnswer { text, citations })
    }

    fn id(&self) -> ProviderId {
        ProviderId::Gemini
    }

    fn display_name(&self) -> String {
        self.model.clone()
    }

    fn supports_grounding(&self) -> bool {
        true
    }
}

/// Read a Retry-After header as whole seconds, if present and numeric.
pub(crate) fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

// Request/Response types

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<RequestContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Tool>>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct RequestContent {
    parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
struct RequestPart {
    text: String,
}

#[derive(Debug, Serialize)]
struct Tool {
    google_search: EmptyObject,
}

#[derive(Debug, Serialize)]
struct EmptyObject {}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
    #[serde(rename = "groundingMetadata")]
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GroundingMetadata {
    #[serde(rename = "groundingChunks", default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Deserialize)]
struct GroundingChunk {
    web: Option<WebChunk>,
}

#[derive(Debug, Deserialize)]
struct WebChunk {
    uri: Option<String>,
    title: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider_for(base: &str) -> GeminiProvider {
        let settings = ProviderSettings {
            model: "gemini-1.5-flash".to_string(),
            api_key: Some("test-key".to_string()),
            api_base: Some(base.to_string()),
            timeout_secs: 5,
        };
        GeminiProvider::new(&settings).unwrap()
    }

    #[test]
    fn test_missing_key_is_config_error() {
        let settings = ProviderSettings {
            model: "gemini-1.5-flash".to_string(),
            api_key: None,
            api_base: None,
            timeout_secs: 5,
        };
        // Only valid while GEMINI_API_KEY is absent from the test env.
        if std::env::var("GEMINI_API_KEY").is_err() {
            assert!(GeminiProvider::new(&settings).is_err());
        }
    }

    #[test]
    fn test_grounded_request_omits_json_mime() {
        let provider = provider_for("http://localhost:1");
        let request = provider.build_request(
            "top crms",
            &GenerateOptions {
                format: ResponseFormat::Json,
                grounded_search: true,
            },
        );
        assert!(request.tools.is_some());
        assert!(request.generation_config.is_none());
    }

    #[test]
    fn test_json_request_sets_mime_type() {
        let provider = provider_for("http://localhost:1");
        let request = provider.build_request(
            "audit this",
            &GenerateOptions {
                format: ResponseFormat::Json,
                grounded_search: false,
            },
        );
        assert!(request.tools.is_none());
        assert_eq!(
            request.generation_config.unwrap().response_mime_type,
            "application/json"
        );
    }

    #[tokio::test]
    async fn test_grounded_response_parses_citations() {
        use wiremock::matchers::{method, path_regex};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex(r"/models/.+:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{
                    "content": {"parts": [{"text": "Acme leads the market."}]},
                    "groundingMetadata": {
                        "groundingChunks": [
                            {"web": {"uri": "https://acme.com", "title": "Acme"}},
                            {"web": {"uri": "https://review.io", "title": null}}
                        ]
                    }
                }]
            })))
            .mount(&server)
            .await;

        let provider = provider_for(&server.uri());
        let answer = provider
            .generate(
                "top vendors",
                &GenerateOptions {
                    format: ResponseFormat::Text,
                    grounded_search: true,
                },
            )
            .await
            .unwrap();

        assert_eq!(answer.text, "Acme leads the market.");
        assert_eq!(answer.citations.len(), 2);
        assert_eq!(answer.citations[0].url, "https://acme.com");
        assert_eq!(answer.citations[1].title, None);
    }

    #[tokio::test]
    async fn test_429_classified_rate_limited() {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header("retry-after", "7")
                    .set_body_string("Resource exhausted: too many requests"),
            )
            .mount(&server)
            .await;

        let provider = provider_for(&server.uri());
        let err = provider
            .generate(
                "hi",
                &GenerateOptions {
                    format: ResponseFormat::Text,
                    grounded_search: false,
                },
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind, ProviderErrorKind::RateLimited);
        assert_eq!(err.retry_after, Some(Duration::from_secs(7)));
    }
}
