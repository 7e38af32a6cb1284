//! # Sufficiency Evaluator
//!
//! The synthesis step. It is the only prompt that sees the whole history;
//! per-round summaries only see their own results.

use super::controller::ResearchConfig;
use super::history::History;
use crate::error::ResearchError;
use crate::parser::{self, Decision};
use crate::prompts;
use crate::services::{complete_within, TextCompletionClient};
use crate::usage::UsageLedger;

pub struct SufficiencyEvaluator<'a> {
    completion: &'a dyn TextCompletionClient,
    config: &'a ResearchConfig,
}

impl<'a> SufficiencyEvaluator<'a> {
    pub fn new(completion: &'a dyn TextCompletionClient, config: &'a ResearchConfig) -> Self {
        Self { completion, config }
    }

    /// Decide stop-or-continue over everything gathered so far
    pub async fn evaluate(
        &self,
        question: &str,
        history: &History,
        usage: &mut UsageLedger,
    ) -> Result<Decision, ResearchError> {
        let language = self.config.language;
        let prompt = prompts::synthesis_prompt(language, question, &history.render(language));

        let completion =
            complete_within(self.config.call_timeout(), self.completion.complete(&prompt)).await?;
        usage.record(completion.usage.as_ref(), self.completion.pricing().as_ref());

        parser::extract_decision(&completion.text).map_err(|failure| {
            ResearchError::DecisionExtraction {
                round: history.len() as u32,
                failure,
            }
        })
    }
}
