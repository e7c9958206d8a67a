//! OpenAI-Compatible Chat Completions Provider
//!
//! One adapter covers every upstream speaking the chat-completions dialect;
//! cerebras and openrouter differ only in endpoint, key, and display label.
//! Neither supports grounding, so `grounded_search` is ignored here.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::gemini::parse_retry_after;
use super::{AnswerProvider, GenerateOptions, ProviderAnswer, ResponseFormat};
use crate::config::ProviderSettings;
use crate::types::error::{ProviderError, ProviderErrorKind, ProviderResult};
use crate::types::{ProviderId, Result};

const CEREBRAS_API_BASE: &str = "https://api.cerebras.ai/v1";
const OPENROUTER_API_BASE: &str = "https://openrouter.ai/api/v1";

/// Chat-completions adapter with secure API key handling.
pub struct ChatCompletionsProvider {
    id: ProviderId,
    /// Never exposed in logs or debug output.
    api_key: SecretString,
    api_base: String,
    model: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for ChatCompletionsProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletionsProvider")
            .field("id", &self.id)
            .field("api_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .finish()
    }
}

impl ChatCompletionsProvider {
    pub fn cerebras(settings: &ProviderSettings) -> Result<Self> {
        Self::new(settings, ProviderId::Cerebras, "CEREBRAS_API_KEY", CEREBRAS_API_BASE)
    }

    pub fn openrouter(settings: &ProviderSettings) -> Result<Self> {
        Self::new(
            settings,
            ProviderId::OpenRouter,
            "OPENROUTER_API_KEY",
            OPENROUTER_API_BASE,
        )
    }

    fn new(
        settings: &ProviderSettings,
        id: ProviderId,
        env_var: &str,
        default_base: &str,
    ) -> Result<Self> {
        let api_key = super::resolve_api_key(settings, env_var, id)?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        Ok(Self {
            id,
            api_key: SecretString::from(api_key),
            api_base: settings
                .api_base
                .clone()
                .unwrap_or_else(|| default_base.to_string()),
            model: settings.model.clone(),
            client,
        })
    }
}

#[async_trait]
impl AnswerProvider for ChatCompletionsProvider {
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerateOptions,
    ) -> ProviderResult<ProviderAnswer> {
        let url = format!("{}/chat/completions", self.api_base);

        debug!(provider = %self.id, model = %self.model, "Calling chat completions");

        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            response_format: (options.format == ResponseFormat::Json).then(|| JsonResponseFormat {
                format_type: "json_object".to_string(),
            }),
        };

        let response = self
            .client
            .post(&url)
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::transport(self.id, &e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(response.headers());
            let body = response.text().await.unwrap_or_default();
            let mut err = ProviderError::from_http(self.id, status.as_u16(), body);
            if let Some(wait) = retry_after {
                err = err.retry_after(wait);
            }
            return Err(err);
        }

        let body: ChatCompletionResponse = response.json().await.map_err(|e| {
            ProviderError::new(
                ProviderErrorKind::Other,
                self.id,
                format!("Failed to parse chat completion: {}", e),
            )
        })?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                ProviderError::new(
                    ProviderErrorKind::Other,
                    self.id,
                    "No content in chat completion",
                )
            })?;

        Ok(ProviderAnswer::text_only(content))
    }

    fn id(&self) -> ProviderId {
        self.id
    }

    fn display_name(&self) -> String {
        match self.id {
            ProviderId::Cerebras => format!("Cerebras ({})", self.model),
            ProviderId::OpenRouter => format!("GPT-OSS ({})", self.model),
            ProviderId::Gemini => self.model.clone(),
        }
    }
}

// Request/Response types

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<JsonResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct JsonResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_for(server_uri: &str) -> ChatCompletionsProvider {
        let settings = ProviderSettings {
            model: "llama-3.3-70b".to_string(),
            api_key: Some("test-key".to_string()),
            api_base: Some(server_uri.to_string()),
            timeout_secs: 5,
        };
        ChatCompletionsProvider::cerebras(&settings).unwrap()
    }

    #[test]
    fn test_display_names() {
        let settings = ProviderSettings {
            model: "m".to_string(),
            api_key: Some("k".to_string()),
            api_base: None,
            timeout_secs: 5,
        };
        assert_eq!(
            ChatCompletionsProvider::cerebras(&settings)
                .unwrap()
                .display_name(),
            "Cerebras (m)"
        );
        assert_eq!(
            ChatCompletionsProvider::openrouter(&settings)
                .unwrap()
                .display_name(),
            "GPT-OSS (m)"
        );
    }

    #[tokio::test]
    async fn test_json_format_forwarded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(serde_json::json!({
                "response_format": {"type": "json_object"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": "{\"ok\": true}"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = provider_for(&server.uri());
        let answer = provider
            .generate(
                "audit",
                &GenerateOptions {
                    format: ResponseFormat::Json,
                    grounded_search: false,
                },
            )
            .await
            .unwrap();

        assert_eq!(answer.text, "{\"ok\": true}");
        assert!(answer.citations.is_empty());
    }

    #[tokio::test]
    async fn test_auth_failure_classified() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
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

        assert_eq!(err.kind, ProviderErrorKind::AuthFailed);
    }
}
