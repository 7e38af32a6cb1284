//! # Research Outcome
//!
//! The discriminated result of a research run. Failures are values: the
//! partial history travels with the error so callers can see which round
//! and which step went wrong.

use super::history::History;
use crate::error::{ErrorKind, ResearchError};
use crate::usage::UsageLedger;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Terminated,
    Failed,
}

/// How a run ended
#[derive(Debug)]
pub enum ResearchOutcome {
    /// A sufficient decision was reached
    Terminated {
        report: String,
        history: History,
        usage: UsageLedger,
    },
    /// The run stopped on an error
    Failed {
        error: ResearchError,
        partial_history: History,
        usage: UsageLedger,
    },
}

impl ResearchOutcome {
    pub fn status(&self) -> OutcomeStatus {
        match self {
            ResearchOutcome::Terminated { .. } => OutcomeStatus::Terminated,
            ResearchOutcome::Failed { .. } => OutcomeStatus::Failed,
        }
    }

    /// Rounds completed before the run ended
    pub fn history(&self) -> &History {
        match self {
            ResearchOutcome::Terminated { history, .. } => history,
            ResearchOutcome::Failed {
                partial_history, ..
            } => partial_history,
        }
    }

    pub fn usage(&self) -> &UsageLedger {
        match self {
            ResearchOutcome::Terminated { usage, .. } | ResearchOutcome::Failed { usage, .. } => {
                usage
            }
        }
    }

    pub fn report(&self) -> Option<&str> {
        match self {
            ResearchOutcome::Terminated { report, .. } => Some(report),
            ResearchOutcome::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&ResearchError> {
        match self {
            ResearchOutcome::Terminated { .. } => None,
            ResearchOutcome::Failed { error, .. } => Some(error),
        }
    }

    /// Serializable view for JSON output
    pub fn summary(&self) -> OutcomeSummary {
        OutcomeSummary {
            status: self.status(),
            report: self.report().map(str::to_string),
            error_kind: self.error().map(ResearchError::kind),
            error: self.error().map(|e| e.to_string()),
            rounds: self.history().clone(),
            usage: self.usage().clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeSummary {
    pub status: OutcomeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub rounds: History,
    pub usage: UsageLedger,
}
