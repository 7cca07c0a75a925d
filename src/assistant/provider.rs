//! Hosted inference endpoint (OpenAI-compatible chat completions).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AssistantError;
use crate::types::AiConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub max_tokens: u32,
}

#[async_trait::async_trait]
pub trait InferenceProvider: Send + Sync {
    /// Model identifier reported in `meta.model`.
    fn model(&self) -> Option<&str>;

    async fn complete(&self, request: &CompletionRequest) -> Result<String, AssistantError>;
}

/// Used when no API key is configured; every call reports `NotConfigured`.
pub struct DisabledProvider;

#[async_trait::async_trait]
impl InferenceProvider for DisabledProvider {
    fn model(&self) -> Option<&str> {
        None
    }

    async fn complete(&self, _request: &CompletionRequest) -> Result<String, AssistantError> {
        Err(AssistantError::NotConfigured)
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: Option<ChatChoiceMessage>,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

pub struct HttpInferenceProvider {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl HttpInferenceProvider {
    pub fn new(config: &AiConfig, api_key: &str) -> Result<Self, AssistantError> {
        // The caller races the request against its own timer; this is a backstop
        // so an abandoned request doesn't hold a connection forever.
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.saturating_mul(2).max(1)))
            .build()
            .map_err(|e| AssistantError::Network(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            api_key: api_key.to_string(),
        })
    }

    /// Build the provider the config asks for: HTTP when a key is set,
    /// otherwise the disabled stub.
    pub fn from_config(config: &AiConfig) -> Box<dyn InferenceProvider> {
        let key = config.api_key.as_deref().map(str::trim).unwrap_or("");
        if key.is_empty() {
            log::info!("Assistant: no inference API key configured, answers will use fallback");
            return Box::new(DisabledProvider);
        }
        match HttpInferenceProvider::new(config, key) {
            Ok(provider) => Box::new(provider),
            Err(e) => {
                log::warn!("Assistant: failed to build inference client: {}", e);
                Box::new(DisabledProvider)
            }
        }
    }
}

/// Pull the first non-empty completion out of a chat response body.
fn extract_answer(response: ChatResponse) -> Result<String, AssistantError> {
    response
        .choices
        .into_iter()
        .filter_map(|c| c.message.and_then(|m| m.content))
        .map(|text| text.trim().to_string())
        .find(|text| !text.is_empty())
        .ok_or(AssistantError::EmptyCompletion)
}

#[async_trait::async_trait]
impl InferenceProvider for HttpInferenceProvider {
    fn model(&self) -> Option<&str> {
        Some(&self.model)
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, AssistantError> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user,
                },
            ],
            max_tokens: request.max_tokens,
            temperature: 0.3,
        };

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 | 403 => AssistantError::Unauthorized,
                429 => AssistantError::RateLimited,
                code => AssistantError::Http {
                    status: code,
                    message,
                },
            });
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| AssistantError::Parse(e.to_string()))?;
        extract_answer(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_first_non_empty_choice() {
        let parsed: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"content":"   "}},{"message":{"content":" Hello "}}]}"#,
        )
        .unwrap();
        assert_eq!(extract_answer(parsed).unwrap(), "Hello");
    }

    #[test]
    fn empty_choices_is_an_error() {
        let parsed: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(
            extract_answer(parsed),
            Err(AssistantError::EmptyCompletion)
        ));
        let parsed: ChatResponse = serde_json::from_str(r#"{"id":"x"}"#).unwrap();
        assert!(matches!(
            extract_answer(parsed),
            Err(AssistantError::EmptyCompletion)
        ));
    }

    #[test]
    fn missing_key_gives_disabled_provider() {
        let config = AiConfig {
            api_key: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(HttpInferenceProvider::from_config(&config).model().is_none());

        let config = AiConfig {
            api_key: Some("sk-test".to_string()),
            base_url: "https://llm.example.com/v1/".to_string(),
            ..Default::default()
        };
        let provider = HttpInferenceProvider::new(&config, "sk-test").unwrap();
        assert_eq!(provider.endpoint, "https://llm.example.com/v1/chat/completions");
        assert_eq!(provider.model().unwrap(), config.model);
    }
}
