//! # Research Loop
//!
//! Iterative retrieval for one question.
//!
//! ## Loop Flow
//!
//! ```text
//! Question → Query → Search → Summary → Synthesis ─┬→ Report
//!              ↑                                   │
//!              └──────────── next query ───────────┘
//! ```

pub mod controller;
pub mod evaluator;
pub mod events;
pub mod history;
pub mod outcome;
pub mod round;
pub mod stage;

#[cfg(test)]
pub(crate) mod testing;

pub use controller::{ControllerCommand, ResearchConfig, SearchController};
pub use evaluator::SufficiencyEvaluator;
pub use events::{ResearchEvent, ResearchEventKind};
pub use history::{History, Round};
pub use outcome::{OutcomeStatus, OutcomeSummary, ResearchOutcome};
pub use round::{render_results, simplify_host, RoundExecutor, RoundObserver, RoundSeed, RoundStep};
pub use stage::ControllerStage;
