//! # Round Executor
//!
//! Runs one round: resolve the query, search, render the hits, summarize.
//! No retries; service errors propagate to the controller.

use super::controller::ResearchConfig;
use super::history::{History, Round};
use crate::error::{ParseFailure, ParseFailureReason, ParseMode, ResearchError, SearchError};
use crate::parser;
use crate::prompts;
use crate::services::{complete_within, search_within, SearchClient, SearchHit, TextCompletionClient};
use crate::usage::UsageLedger;
use async_trait::async_trait;
use chrono::Utc;
use regex::Regex;
use std::sync::LazyLock;

/// Where a round's query comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundSeed {
    /// Round 1: the model turns the question into a query
    Question,
    /// Later rounds: the synthesis step's next query, used as-is
    Carried(String),
}

/// Progress inside a round, reported as each step finishes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundStep<'s> {
    QueryResolved {
        round: u32,
        query: &'s str,
        /// False when the query was carried over from the synthesis step
        generated: bool,
    },
    SearchCompleted {
        round: u32,
        hits: usize,
        results_text: &'s str,
    },
    Summarized {
        round: u32,
        summary: &'s str,
    },
}

/// Receives [`RoundStep`]s while a round runs
#[async_trait]
pub trait RoundObserver: Send {
    async fn on_step(&mut self, step: RoundStep<'_>);
}

/// Ignore progress
#[async_trait]
impl RoundObserver for () {
    async fn on_step(&mut self, _step: RoundStep<'_>) {}
}

pub struct RoundExecutor<'a> {
    completion: &'a dyn TextCompletionClient,
    search: &'a dyn SearchClient,
    config: &'a ResearchConfig,
}

impl<'a> RoundExecutor<'a> {
    pub fn new(
        completion: &'a dyn TextCompletionClient,
        search: &'a dyn SearchClient,
        config: &'a ResearchConfig,
    ) -> Self {
        Self {
            completion,
            search,
            config,
        }
    }

    /// Run a full round against the prior history
    pub async fn run_round(
        &self,
        question: &str,
        history: &History,
        seed: &RoundSeed,
        usage: &mut UsageLedger,
        observer: &mut dyn RoundObserver,
    ) -> Result<Round, ResearchError> {
        let index = history.next_index();

        let query = self.resolve_query(question, seed, index, usage).await?;
        observer
            .on_step(RoundStep::QueryResolved {
                round: index,
                query: &query,
                generated: matches!(seed, RoundSeed::Question),
            })
            .await;

        let hits = self.search(&query).await?;
        let results_text = render_results(&hits);
        observer
            .on_step(RoundStep::SearchCompleted {
                round: index,
                hits: hits.len(),
                results_text: &results_text,
            })
            .await;

        let summary_text = self.summarize(question, &query, &results_text, usage).await?;
        observer
            .on_step(RoundStep::Summarized {
                round: index,
                summary: &summary_text,
            })
            .await;

        Ok(Round {
            index,
            query,
            results_text,
            summary_text,
            completed_at: Utc::now(),
        })
    }

    /// Generate the query for round 1, or pass a carried query through
    async fn resolve_query(
        &self,
        question: &str,
        seed: &RoundSeed,
        round: u32,
        usage: &mut UsageLedger,
    ) -> Result<String, ResearchError> {
        let query = match seed {
            RoundSeed::Carried(query) => query.trim().to_string(),
            RoundSeed::Question => {
                let prompt = prompts::query_generation_prompt(self.config.language, question);
                let text = self.complete(&prompt, usage).await?;
                parser::extract_query(&text)
                    .map_err(|failure| ResearchError::QueryExtraction { round, failure })?
            }
        };

        if query.trim().is_empty() {
            return Err(ResearchError::QueryExtraction {
                round,
                failure: ParseFailure::new(ParseMode::ExtractQuery, ParseFailureReason::NoQuery),
            });
        }
        Ok(query)
    }

    /// Search; zero hits is a search-service failure
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, ResearchError> {
        let hits = search_within(
            self.config.call_timeout(),
            self.search.search(query, self.config.result_count),
        )
        .await?;

        if hits.is_empty() {
            return Err(SearchError::NoResults {
                query: query.to_string(),
            }
            .into());
        }
        Ok(hits)
    }

    /// Ask the model to summarize this round's results
    async fn summarize(
        &self,
        question: &str,
        query: &str,
        results_text: &str,
        usage: &mut UsageLedger,
    ) -> Result<String, ResearchError> {
        let prompt =
            prompts::round_summary_prompt(self.config.language, question, query, results_text);
        self.complete(&prompt, usage).await
    }

    async fn complete(&self, prompt: &str, usage: &mut UsageLedger) -> Result<String, ResearchError> {
        let completion =
            complete_within(self.config.call_timeout(), self.completion.complete(prompt)).await?;
        usage.record(completion.usage.as_ref(), self.completion.pricing().as_ref());
        Ok(completion.text)
    }
}

static AUTHORITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"//([^/?#]+)").expect("authority pattern is valid"));

/// Reduce a URL to its authority: `https://en.wikipedia.org/Everest` -> `en.wikipedia.org`
pub fn simplify_host(url: &str) -> String {
    AUTHORITY
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// Numbered title / snippet / host blocks
pub fn render_results(hits: &[SearchHit]) -> String {
    hits.iter()
        .enumerate()
        .map(|(i, hit)| {
            format!(
                "{}. {}\n{}\n{}\n",
                i + 1,
                hit.title,
                hit.snippet,
                simplify_host(&hit.url)
            )
        })
        .collect::<Vec<String>>()
        .join("\n")
}
