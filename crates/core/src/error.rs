//! # Research Errors
//!
//! Error taxonomy for the research loop. Every failure is returned as a value;
//! the controller turns them into a `Failed` outcome instead of unwinding.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Failure of the remote text-generation service
#[derive(Debug, Error)]
pub enum CompletionError {
    /// API key environment variable not set
    #[error("missing API key: set {0}")]
    MissingApiKey(String),
    /// Transport-level failure (DNS, TLS, connection reset, bad JSON)
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// Non-success HTTP status
    #[error("service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    /// The service answered but produced no text
    #[error("service returned an empty completion")]
    EmptyResponse,
    /// The call did not finish within the configured timeout
    #[error("no response within {0:?}")]
    Timeout(Duration),
    /// Any other service-side failure
    #[error("{0}")]
    Unavailable(String),
}

/// Failure of the remote search service
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("missing search credentials: set {0}")]
    MissingCredentials(String),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    /// Zero results is treated as a service failure
    #[error("no results for query '{query}'")]
    NoResults { query: String },
    #[error("no response within {0:?}")]
    Timeout(Duration),
    #[error("{0}")]
    Unavailable(String),
}

/// Which extraction was being attempted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseMode {
    ExtractQuery,
    ExtractDecision,
}

impl fmt::Display for ParseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseMode::ExtractQuery => f.write_str("extract-query"),
            ParseMode::ExtractDecision => f.write_str("extract-decision"),
        }
    }
}

/// Why free text could not be turned into structured fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseFailureReason {
    /// Input was empty or whitespace only
    EmptyText,
    /// No marker matched and the fallback produced nothing
    NoQuery,
    /// Insufficient verdict without a next-query marker
    MissingNextQuery,
    /// Sufficient verdict but nothing usable as a report
    MissingReport,
}

impl fmt::Display for ParseFailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ParseFailureReason::EmptyText => "text is empty",
            ParseFailureReason::NoQuery => "no query could be found",
            ParseFailureReason::MissingNextQuery => {
                "information marked insufficient but no next query was given"
            }
            ParseFailureReason::MissingReport => {
                "information marked sufficient but the report is empty"
            }
        };
        f.write_str(text)
    }
}

/// Tagged extraction failure returned by the response parser
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{mode}: {reason}")]
pub struct ParseFailure {
    pub mode: ParseMode,
    pub reason: ParseFailureReason,
}

impl ParseFailure {
    pub fn new(mode: ParseMode, reason: ParseFailureReason) -> Self {
        Self { mode, reason }
    }
}

/// Terminal error of a research run
#[derive(Debug, Error)]
pub enum ResearchError {
    #[error("completion service error: {0}")]
    CompletionService(#[from] CompletionError),
    #[error("search service error: {0}")]
    SearchService(#[from] SearchError),
    #[error("query extraction failed in round {round}: {failure}")]
    QueryExtraction { round: u32, failure: ParseFailure },
    #[error("decision extraction failed after round {round}: {failure}")]
    DecisionExtraction { round: u32, failure: ParseFailure },
    #[error("no sufficient answer after {max_rounds} rounds")]
    RoundLimitReached { max_rounds: u32 },
    #[error("research cancelled before round {next_round}")]
    Cancelled { next_round: u32 },
}

/// Serializable discriminant of [`ResearchError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    CompletionService,
    SearchService,
    QueryExtraction,
    DecisionExtraction,
    RoundLimitReached,
    Cancelled,
}

impl ResearchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ResearchError::CompletionService(_) => ErrorKind::CompletionService,
            ResearchError::SearchService(_) => ErrorKind::SearchService,
            ResearchError::QueryExtraction { .. } => ErrorKind::QueryExtraction,
            ResearchError::DecisionExtraction { .. } => ErrorKind::DecisionExtraction,
            ResearchError::RoundLimitReached { .. } => ErrorKind::RoundLimitReached,
            ResearchError::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_mapping() {
        let err = ResearchError::from(SearchError::NoResults {
            query: "rust".to_string(),
        });
        assert_eq!(err.kind(), ErrorKind::SearchService);
        assert!(err.to_string().contains("no results for query 'rust'"));
    }

    #[test]
    fn test_parse_failure_display() {
        let failure = ParseFailure::new(ParseMode::ExtractQuery, ParseFailureReason::EmptyText);
        assert_eq!(failure.to_string(), "extract-query: text is empty");
    }

    #[test]
    fn test_error_kind_serialization() {
        let json = serde_json::to_string(&ErrorKind::RoundLimitReached).unwrap();
        assert_eq!(json, "\"round_limit_reached\"");
    }
}
