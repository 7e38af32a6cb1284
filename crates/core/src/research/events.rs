//! # Research Events
//!
//! Progress events streamed while a research run is in flight.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of research event
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResearchEventKind {
    /// Run started
    SessionStarted,
    /// Search query produced (generated in round 1, carried over afterwards)
    QueryGenerated,
    /// Search returned results
    SearchCompleted,
    /// Round summary produced
    RoundSummarized,
    /// Synthesis step returned a decision
    DecisionMade,
    /// Run ended with a report
    SessionTerminated,
    /// Run ended with an error
    SessionFailed,
}

/// An event in the research run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchEvent {
    /// Unique event ID
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub kind: ResearchEventKind,
    /// Round the event belongs to, if any
    #[serde(default)]
    pub round: Option<u32>,
    /// Associated data (JSON)
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl ResearchEvent {
    /// Create a new event
    pub fn new(kind: ResearchEventKind) -> Self {
        Self {
            id: event_id(),
            timestamp: Utc::now(),
            kind,
            round: None,
            data: None,
        }
    }

    pub fn in_round(mut self, round: u32) -> Self {
        self.round = Some(round);
        self
    }

    /// Add data to the event
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Time-ordered, process-unique event id
fn event_id() -> String {
    use std::time::{Duration, SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_nanos();
    format!("{:x}-{:x}", nanos, rand_u32())
}

/// Simple random number (not cryptographic)
fn rand_u32() -> u32 {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};
    RandomState::new().build_hasher().finish() as u32
}
