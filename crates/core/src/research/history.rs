//! # Rounds and History
//!
//! A round is immutable once recorded. The history is append-only and is
//! replayed verbatim, in order, into the synthesis prompt.

use crate::prompts::PromptLanguage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One query -> search -> summarize cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Round {
    /// 1-based, gapless
    pub index: u32,
    pub query: String,
    /// Search results as shown to the model
    pub results_text: String,
    /// The model's summary of this round
    pub summary_text: String,
    pub completed_at: DateTime<Utc>,
}

/// Ordered record of completed rounds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct History {
    rounds: Vec<Round>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index the next recorded round must carry
    pub fn next_index(&self) -> u32 {
        self.rounds.len() as u32 + 1
    }

    /// Append a round. Only the controller records rounds.
    pub(crate) fn record(&mut self, round: Round) {
        debug_assert_eq!(round.index, self.next_index(), "round index must be gapless");
        self.rounds.push(round);
    }

    pub fn rounds(&self) -> &[Round] {
        &self.rounds
    }

    pub fn len(&self) -> usize {
        self.rounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rounds.is_empty()
    }

    /// Render every round's query and summary, in order, with round labels
    pub fn render(&self, language: PromptLanguage) -> String {
        self.rounds
            .iter()
            .map(|round| {
                format!(
                    "{}\n{}: {}\n{}:\n{}\n\n",
                    language.round_label(round.index),
                    language.query_label(),
                    round.query,
                    language.summary_label(),
                    round.summary_text
                )
            })
            .collect()
    }
}
