//! Scripted service stubs for driving the research loop in tests.

use crate::error::{CompletionError, SearchError};
use crate::services::{Completion, SearchClient, SearchHit, TextCompletionClient};
use crate::usage::Pricing;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// Completion client that answers from a fixed script, in order
pub(crate) struct ScriptedCompletion {
    script: Mutex<VecDeque<Result<Completion, CompletionError>>>,
    prompts: Mutex<Vec<String>>,
    delay: Option<Duration>,
    pricing: Option<Pricing>,
}

impl ScriptedCompletion {
    pub(crate) fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_results(
            replies
                .into_iter()
                .map(|reply| Ok(Completion::text(reply)))
                .collect(),
        )
    }

    pub(crate) fn from_results(script: Vec<Result<Completion, CompletionError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            prompts: Mutex::new(Vec::new()),
            delay: None,
            pricing: None,
        }
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn with_pricing(mut self, pricing: Pricing) -> Self {
        self.pricing = Some(pricing);
        self
    }

    /// Prompts received so far, in call order
    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextCompletionClient for ScriptedCompletion {
    async fn complete(&self, prompt: &str) -> Result<Completion, CompletionError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Err(CompletionError::Unavailable("script exhausted".to_string())))
    }

    fn pricing(&self) -> Option<Pricing> {
        self.pricing
    }
}

/// Search client that answers from a fixed script, in order
pub(crate) struct ScriptedSearch {
    script: Mutex<VecDeque<Result<Vec<SearchHit>, SearchError>>>,
    queries: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl ScriptedSearch {
    pub(crate) fn new<I>(replies: I) -> Self
    where
        I: IntoIterator<Item = Result<Vec<SearchHit>, SearchError>>,
    {
        Self {
            script: Mutex::new(replies.into_iter().collect()),
            queries: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    pub(crate) fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queries received so far, in call order
    pub(crate) fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchClient for ScriptedSearch {
    async fn search(&self, query: &str, count: usize) -> Result<Vec<SearchHit>, SearchError> {
        self.queries.lock().unwrap().push(query.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.script.lock().unwrap().pop_front();
        next.map(|result| result.map(|hits| hits.into_iter().take(count).collect()))
            .unwrap_or_else(|| Err(SearchError::Unavailable("script exhausted".to_string())))
    }
}
