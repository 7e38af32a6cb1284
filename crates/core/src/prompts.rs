//! Default prompt templates bundled at compile time.
//!
//! Each template exists in both working languages. Placeholders
//! (`{question}`, `{query}`, `{results}`, `{history}`) are substituted in a
//! single pass, so placeholder-like text inside user input is left alone.

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Query generation - turns the user question into one search query
pub const QUERY_GENERATION_EN: &str = include_str!("defaults/query_generation.en.md");
pub const QUERY_GENERATION_ZH: &str = include_str!("defaults/query_generation.zh.md");

/// Round summary - extracts useful information from one round's results
pub const ROUND_SUMMARY_EN: &str = include_str!("defaults/round_summary.en.md");
pub const ROUND_SUMMARY_ZH: &str = include_str!("defaults/round_summary.zh.md");

/// Synthesis - judges sufficiency over the whole history
pub const SYNTHESIS_EN: &str = include_str!("defaults/synthesis.en.md");
pub const SYNTHESIS_ZH: &str = include_str!("defaults/synthesis.zh.md");

/// Language the prompts are written in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PromptLanguage {
    #[default]
    #[serde(rename = "en")]
    English,
    #[serde(rename = "zh")]
    Chinese,
}

impl PromptLanguage {
    pub fn parse(code: &str) -> Option<PromptLanguage> {
        match code.to_ascii_lowercase().as_str() {
            "en" | "english" => Some(PromptLanguage::English),
            "zh" | "cn" | "chinese" => Some(PromptLanguage::Chinese),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            PromptLanguage::English => "en",
            PromptLanguage::Chinese => "zh",
        }
    }

    /// Label used for one round when replaying history
    pub(crate) fn round_label(&self, index: u32) -> String {
        format!("**Round {}**", index)
    }

    pub(crate) fn query_label(&self) -> &'static str {
        match self {
            PromptLanguage::English => "Search query",
            PromptLanguage::Chinese => "检索query",
        }
    }

    pub(crate) fn summary_label(&self) -> &'static str {
        match self {
            PromptLanguage::English => "Summary",
            PromptLanguage::Chinese => "总结",
        }
    }
}

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{(question|query|results|history)\}").expect("placeholder pattern is valid")
});

/// Values substituted into a template
#[derive(Debug, Default, Clone, Copy)]
pub struct PromptVars<'a> {
    pub question: &'a str,
    pub query: &'a str,
    pub results: &'a str,
    pub history: &'a str,
}

/// Substitute placeholders in one pass
pub fn render(template: &str, vars: &PromptVars<'_>) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| match &caps[1] {
            "question" => vars.question.to_string(),
            "query" => vars.query.to_string(),
            "results" => vars.results.to_string(),
            _ => vars.history.to_string(),
        })
        .into_owned()
}

pub fn query_generation_prompt(language: PromptLanguage, question: &str) -> String {
    let template = match language {
        PromptLanguage::English => QUERY_GENERATION_EN,
        PromptLanguage::Chinese => QUERY_GENERATION_ZH,
    };
    render(
        template,
        &PromptVars {
            question,
            ..PromptVars::default()
        },
    )
}

pub fn round_summary_prompt(
    language: PromptLanguage,
    question: &str,
    query: &str,
    results: &str,
) -> String {
    let template = match language {
        PromptLanguage::English => ROUND_SUMMARY_EN,
        PromptLanguage::Chinese => ROUND_SUMMARY_ZH,
    };
    render(
        template,
        &PromptVars {
            question,
            query,
            results,
            ..PromptVars::default()
        },
    )
}

pub fn synthesis_prompt(language: PromptLanguage, question: &str, history: &str) -> String {
    let template = match language {
        PromptLanguage::English => SYNTHESIS_EN,
        PromptLanguage::Chinese => SYNTHESIS_ZH,
    };
    render(
        template,
        &PromptVars {
            question,
            history,
            ..PromptVars::default()
        },
    )
}

/// All default prompts with their slugs
pub fn all_defaults() -> Vec<(&'static str, &'static str)> {
    vec![
        ("query_generation.en", QUERY_GENERATION_EN),
        ("query_generation.zh", QUERY_GENERATION_ZH),
        ("round_summary.en", ROUND_SUMMARY_EN),
        ("round_summary.zh", ROUND_SUMMARY_ZH),
        ("synthesis.en", SYNTHESIS_EN),
        ("synthesis.zh", SYNTHESIS_ZH),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_prompts_non_empty() {
        for (slug, content) in all_defaults() {
            assert!(!content.is_empty(), "Prompt '{}' should not be empty", slug);
            assert!(content.len() > 50, "Prompt '{}' seems too short", slug);
        }
    }

    #[test]
    fn test_prompts_carry_their_placeholders() {
        for template in [QUERY_GENERATION_EN, QUERY_GENERATION_ZH] {
            assert!(template.contains("{question}"));
        }
        for template in [ROUND_SUMMARY_EN, ROUND_SUMMARY_ZH] {
            assert!(template.contains("{query}") && template.contains("{results}"));
        }
        for template in [SYNTHESIS_EN, SYNTHESIS_ZH] {
            assert!(template.contains("{history}"));
        }
    }

    #[test]
    fn test_render_is_single_pass() {
        let prompt = query_generation_prompt(PromptLanguage::English, "what is {history}?");
        assert!(prompt.contains("User question: [what is {history}?]"));
    }

    #[test]
    fn test_round_summary_embeds_everything() {
        let prompt = round_summary_prompt(
            PromptLanguage::Chinese,
            "芙宁娜是谁?",
            "Furina Genshin",
            "1. Furina\nwiki\nfandom.com",
        );
        assert!(prompt.contains("用户问题: [芙宁娜是谁?]"));
        assert!(prompt.contains("搜索内容: Furina Genshin"));
        assert!(prompt.contains("fandom.com"));
    }

    #[test]
    fn test_language_parse() {
        assert_eq!(PromptLanguage::parse("ZH"), Some(PromptLanguage::Chinese));
        assert_eq!(PromptLanguage::parse("en"), Some(PromptLanguage::English));
        assert_eq!(PromptLanguage::parse("fr"), None);
        assert_eq!(PromptLanguage::Chinese.code(), "zh");
    }
}
