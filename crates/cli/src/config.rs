//! Persisted configuration for the `deepsearch` binary.
//!
//! Precedence: built-in defaults < `.deepsearch/config.json` < CLI flags.
//! Secrets never live here; they come from the environment or a `.env` file.

use anyhow::{anyhow, bail, Context, Result};
use clap::ValueEnum;
use deepsearch_core::models::{LlmProvider, ModelConfig};
use deepsearch_core::prompts::PromptLanguage;
use deepsearch_core::research::ResearchConfig;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const HOME_ENV: &str = "DEEPSEARCH_HOME";
const DEFAULT_HOME: &str = ".deepsearch";
const CONFIG_FILE: &str = "config.json";

/// Web search backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SearchBackend {
    /// Google Custom Search JSON API
    #[default]
    Google,
    /// SearXNG metasearch
    Searxng,
}

/// Directory holding `config.json` and `.env`
pub fn config_dir() -> PathBuf {
    std::env::var(HOME_ENV)
        .ok()
        .filter(|dir| !dir.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_HOME))
}

/// Every field is optional so layers can be merged
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// System message sent ahead of every prompt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<SearchBackend>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub searxng_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_rounds: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// Fully resolved settings for one run
#[derive(Debug, Clone)]
pub struct Settings {
    pub model: ModelConfig,
    pub research: ResearchConfig,
    pub search: SearchBackend,
    pub searxng_url: Option<String>,
}

impl PersistedConfig {
    /// Starter file written by `deepsearch init`
    pub fn starter() -> Self {
        Self {
            provider: Some("dashscope".to_string()),
            model: Some(LlmProvider::DashScope.default_model().to_string()),
            search: Some(SearchBackend::Google),
            max_rounds: Some(5),
            result_count: Some(10),
            timeout_secs: Some(120),
            language: Some(PromptLanguage::default().code().to_string()),
            ..Self::default()
        }
    }

    /// Load `config.json` from `dir`. A missing file is an empty layer.
    pub async fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("Invalid config in {}", path.display()))
    }

    pub async fn save(&self, dir: &Path) -> Result<PathBuf> {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        let path = dir.join(CONFIG_FILE);
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(&path, content)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }

    /// Overlay the fields `other` sets
    pub fn merge(&mut self, other: PersistedConfig) {
        if other.provider.is_some() {
            self.provider = other.provider;
        }
        if other.model.is_some() {
            self.model = other.model;
        }
        if other.base_url.is_some() {
            self.base_url = other.base_url;
        }
        if other.system_prompt.is_some() {
            self.system_prompt = other.system_prompt;
        }
        if other.search.is_some() {
            self.search = other.search;
        }
        if other.searxng_url.is_some() {
            self.searxng_url = other.searxng_url;
        }
        if other.max_rounds.is_some() {
            self.max_rounds = other.max_rounds;
        }
        if other.result_count.is_some() {
            self.result_count = other.result_count;
        }
        if other.timeout_secs.is_some() {
            self.timeout_secs = other.timeout_secs;
        }
        if other.language.is_some() {
            self.language = other.language;
        }
    }

    /// Resolve against built-in defaults. The round cap has no default.
    pub fn resolve(&self) -> Result<Settings> {
        let max_rounds = self
            .max_rounds
            .ok_or_else(|| anyhow!("No round limit set: pass --max-rounds or set max_rounds in config.json"))?;
        let max_rounds = NonZeroU32::new(max_rounds).context("max_rounds must be at least 1")?;

        let provider = match &self.provider {
            Some(name) => LlmProvider::parse(name).ok_or_else(|| {
                let known: Vec<&str> = LlmProvider::all().iter().map(|p| p.display_name()).collect();
                anyhow!("Unknown provider '{}' (expected one of: {})", name, known.join(", "))
            })?,
            None => LlmProvider::default(),
        };
        let model_name = self
            .model
            .clone()
            .unwrap_or_else(|| provider.default_model().to_string());
        let mut model = ModelConfig::with_provider(provider, model_name);
        if let Some(url) = &self.base_url {
            model = model.with_base_url(url.clone());
        }
        if let Some(prompt) = self.system_prompt.as_deref().filter(|p| !p.trim().is_empty()) {
            model = model.with_system_prompt(prompt);
        }

        let language = match &self.language {
            Some(code) => PromptLanguage::parse(code)
                .ok_or_else(|| anyhow!("Unknown language '{}' (expected en or zh)", code))?,
            None => PromptLanguage::default(),
        };

        let mut research = ResearchConfig::new(max_rounds).with_language(language);
        if let Some(count) = self.result_count {
            if count == 0 {
                bail!("result_count must be at least 1");
            }
            research = research.with_result_count(count);
        }
        if let Some(secs) = self.timeout_secs.filter(|secs| *secs > 0) {
            research = research.with_call_timeout(Duration::from_secs(secs));
        }

        Ok(Settings {
            model,
            research,
            search: self.search.unwrap_or_default(),
            searxng_url: self.searxng_url.clone(),
        })
    }
}
