//! # Text Completion
//!
//! Prompt-in, text-out client over the OpenAI-compatible chat completions API.

use crate::error::CompletionError;
use crate::models::ModelConfig;
use crate::usage::{Pricing, TokenUsage};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A fully materialized completion
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    /// Token usage, when the service reports it
    pub usage: Option<TokenUsage>,
}

impl Completion {
    /// Completion without usage information
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            usage: None,
        }
    }
}

/// Text-generation service
#[async_trait]
pub trait TextCompletionClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<Completion, CompletionError>;

    /// Pricing used to cost this client's calls
    fn pricing(&self) -> Option<Pricing> {
        None
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
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

/// Client for any provider exposing `POST {base_url}/chat/completions`
pub struct OpenAiCompatibleClient {
    config: ModelConfig,
    api_key: String,
    http: reqwest::Client,
}

impl OpenAiCompatibleClient {
    pub fn new(config: ModelConfig, api_key: String) -> Result<Self, CompletionError> {
        let http = reqwest::Client::builder()
            .user_agent("deepsearch/0.1")
            .timeout(Duration::from_secs(300))
            .build()?;
        Ok(Self {
            config,
            api_key,
            http,
        })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.effective_base_url().trim_end_matches('/')
        )
    }
}

#[async_trait]
impl TextCompletionClient for OpenAiCompatibleClient {
    async fn complete(&self, prompt: &str) -> Result<Completion, CompletionError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &self.config.system_prompt {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt,
        });

        let request = ChatRequest {
            model: &self.config.model,
            messages,
            stream: false,
            temperature: self.config.temperature,
        };

        tracing::debug!(model = %self.config.model, prompt_chars = prompt.len(), "Sending completion request");

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response.json().await?;
        let usage = parsed.usage.map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
        });

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(CompletionError::EmptyResponse)?;

        Ok(Completion { text, usage })
    }

    fn pricing(&self) -> Option<Pricing> {
        self.config.effective_pricing()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LlmProvider;

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let config = ModelConfig::with_provider(LlmProvider::OpenAI, "gpt-4o")
            .with_base_url("http://localhost:8000/v1/");
        let client = OpenAiCompatibleClient::new(config, "sk-test".to_string()).unwrap();
        assert_eq!(client.endpoint(), "http://localhost:8000/v1/chat/completions");
        assert_eq!(client.model(), "gpt-4o");
    }

    #[test]
    fn test_request_serialization() {
        let request = ChatRequest {
            model: "deepseek-v3",
            messages: vec![ChatMessage {
                role: "user",
                content: "hello",
            }],
            stream: false,
            temperature: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["stream"], false);
        assert!(json.get("temperature").is_none());
    }

    #[test]
    fn test_response_parsing_with_usage() {
        let body = r#"{
            "choices": [{"message": {"role": "assistant", "content": "query: rust async"}}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 5, "total_tokens": 17}
        }"#;
        let parsed: ChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(
            parsed.choices[0].message.content.as_deref(),
            Some("query: rust async")
        );
        assert_eq!(parsed.usage.unwrap().completion_tokens, 5);
    }

    #[test]
    fn test_pricing_falls_back_to_model_list_price() {
        let client =
            OpenAiCompatibleClient::new(ModelConfig::default(), "sk-test".to_string()).unwrap();
        assert!(client.pricing().is_some());
    }
}
