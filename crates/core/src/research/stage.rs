//! # Controller Stages
//!
//! States of the research controller.
//!
//! ```text
//! Init → GeneratingFirstQuery → RunningRound → Evaluating ─┬→ RunningRound
//!                                                          ├→ Terminated
//!                                                          └→ Failed
//! ```

use serde::{Deserialize, Serialize};

/// Stage of the research loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerStage {
    /// Holding the question, no rounds yet
    Init,
    /// Round 1: asking the model for the first query
    GeneratingFirstQuery,
    /// Searching and summarizing
    RunningRound,
    /// Synthesis over the whole history
    Evaluating,
    /// Finished with a report
    Terminated,
    /// Finished with an error
    Failed,
}

impl ControllerStage {
    /// Whether `next` is a legal successor of this stage
    pub fn can_transition_to(&self, next: ControllerStage) -> bool {
        use ControllerStage::*;
        matches!(
            (self, next),
            (Init, GeneratingFirstQuery)
                | (GeneratingFirstQuery, RunningRound)
                | (RunningRound, Evaluating)
                | (Evaluating, RunningRound)
                | (Evaluating, Terminated)
                | (Init | GeneratingFirstQuery | RunningRound | Evaluating, Failed)
        )
    }
}
