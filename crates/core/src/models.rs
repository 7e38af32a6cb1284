//! # Models
//!
//! LLM provider and model configuration. Every supported provider speaks the
//! OpenAI-compatible `chat/completions` protocol, so a single client
//! implementation serves all of them.

use crate::error::CompletionError;
use crate::services::completion::OpenAiCompatibleClient;
use crate::usage::Pricing;
use serde::{Deserialize, Serialize};

/// Supported LLM providers
///
/// - DashScope (Alibaba Model Studio, compatible mode) - `DASHSCOPE_API_KEY`
/// - DeepSeek - `DEEPSEEK_API_KEY`
/// - OpenAI - `OPENAI_API_KEY`
/// - OpenRouter (Gateway) - `OPENROUTER_API_KEY`
/// - Grok (xAI) - `XAI_API_KEY`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    DashScope,
    DeepSeek,
    #[serde(rename = "openai")]
    OpenAI,
    OpenRouter,
    Grok,
}

impl LlmProvider {
    /// Get all available providers
    pub fn all() -> Vec<LlmProvider> {
        vec![
            LlmProvider::DashScope,
            LlmProvider::DeepSeek,
            LlmProvider::OpenAI,
            LlmProvider::OpenRouter,
            LlmProvider::Grok,
        ]
    }

    /// Display name for terminal output
    pub fn display_name(&self) -> &'static str {
        match self {
            LlmProvider::DashScope => "DashScope",
            LlmProvider::DeepSeek => "DeepSeek",
            LlmProvider::OpenAI => "OpenAI",
            LlmProvider::OpenRouter => "OpenRouter",
            LlmProvider::Grok => "Grok",
        }
    }

    /// Parse a provider name as written on the command line
    pub fn parse(name: &str) -> Option<LlmProvider> {
        match name.to_ascii_lowercase().as_str() {
            "dashscope" | "aliyun" => Some(LlmProvider::DashScope),
            "deepseek" => Some(LlmProvider::DeepSeek),
            "openai" => Some(LlmProvider::OpenAI),
            "openrouter" => Some(LlmProvider::OpenRouter),
            "grok" | "xai" => Some(LlmProvider::Grok),
            _ => None,
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            LlmProvider::DashScope => "https://dashscope.aliyuncs.com/compatible-mode/v1",
            LlmProvider::DeepSeek => "https://api.deepseek.com",
            LlmProvider::OpenAI => "https://api.openai.com/v1",
            LlmProvider::OpenRouter => "https://openrouter.ai/api/v1",
            LlmProvider::Grok => "https://api.x.ai/v1",
        }
    }

    pub fn api_key_env(&self) -> &'static str {
        match self {
            LlmProvider::DashScope => "DASHSCOPE_API_KEY",
            LlmProvider::DeepSeek => "DEEPSEEK_API_KEY",
            LlmProvider::OpenAI => "OPENAI_API_KEY",
            LlmProvider::OpenRouter => "OPENROUTER_API_KEY",
            LlmProvider::Grok => "XAI_API_KEY",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            LlmProvider::DashScope => "deepseek-v3",
            LlmProvider::DeepSeek => "deepseek-chat",
            LlmProvider::OpenAI => "gpt-4o",
            LlmProvider::OpenRouter => "deepseek/deepseek-chat",
            LlmProvider::Grok => "grok-2",
        }
    }
}

/// Configuration for LLM model selection
///
/// ## Example
/// ```rust,ignore
/// use deepsearch_core::models::{ModelConfig, LlmProvider};
///
/// // Default DashScope deepseek-v3
/// let config = ModelConfig::default();
///
/// // Specific provider and model
/// let config = ModelConfig::with_provider(LlmProvider::OpenAI, "gpt-4o");
///
/// let client = config.create_client()?;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// LLM provider to use
    #[serde(default)]
    pub provider: LlmProvider,
    /// Model name (e.g., "deepseek-v3", "gpt-4o")
    pub model: String,
    /// Optional base URL override for self-hosted or proxied endpoints
    #[serde(default)]
    pub base_url: Option<String>,
    /// Optional system message sent before every prompt
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    /// Per-token pricing; falls back to the known list price for the model
    #[serde(default)]
    pub pricing: Option<Pricing>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::with_provider(LlmProvider::DashScope, LlmProvider::DashScope.default_model())
    }
}

impl ModelConfig {
    /// Create config for a specific provider
    pub fn with_provider(provider: LlmProvider, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            base_url: None,
            system_prompt: None,
            temperature: None,
            pricing: None,
        }
    }

    /// Set base URL
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn effective_base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.provider.default_base_url())
    }

    pub fn effective_pricing(&self) -> Option<Pricing> {
        self.pricing.or_else(|| Pricing::for_model(&self.model))
    }

    /// Create a completion client for the configured provider.
    ///
    /// The API key is read from the provider's environment variable.
    pub fn create_client(&self) -> Result<OpenAiCompatibleClient, CompletionError> {
        let env_var = self.provider.api_key_env();
        let api_key = std::env::var(env_var)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| CompletionError::MissingApiKey(env_var.to_string()))?;
        OpenAiCompatibleClient::new(self.clone(), api_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ModelConfig::default();
        assert_eq!(config.provider, LlmProvider::DashScope);
        assert_eq!(config.model, "deepseek-v3");
        assert!(config.effective_pricing().is_some());
    }

    #[test]
    fn test_provider_display_names() {
        assert_eq!(LlmProvider::DashScope.display_name(), "DashScope");
        assert_eq!(LlmProvider::OpenAI.display_name(), "OpenAI");
    }

    #[test]
    fn test_provider_parse() {
        assert_eq!(LlmProvider::parse("OpenAI"), Some(LlmProvider::OpenAI));
        assert_eq!(LlmProvider::parse("aliyun"), Some(LlmProvider::DashScope));
        assert_eq!(LlmProvider::parse("gemini"), None);
        assert_eq!(LlmProvider::all().len(), 5);
    }

    #[test]
    fn test_base_url_override() {
        let config = ModelConfig::with_provider(LlmProvider::OpenAI, "gpt-4o");
        assert_eq!(config.effective_base_url(), "https://api.openai.com/v1");

        let config = config.with_base_url("http://localhost:11434/v1");
        assert_eq!(config.effective_base_url(), "http://localhost:11434/v1");
    }

    #[test]
    fn test_model_config_serialization() {
        let config = ModelConfig::with_provider(LlmProvider::OpenAI, "gpt-4o");
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("openai"));
        assert!(json.contains("gpt-4o"));

        let parsed: ModelConfig =
            serde_json::from_str(r#"{"provider":"deepseek","model":"deepseek-chat"}"#).unwrap();
        assert_eq!(parsed.provider, LlmProvider::DeepSeek);
        assert!(parsed.base_url.is_none());
    }
}
