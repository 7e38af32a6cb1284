//! # Deepsearch Core
//!
//! Iterative retrieval-augmented research: turn a question into search
//! queries, summarize each round of results, and stop once a synthesis over
//! everything gathered judges the answer sufficient.
//!
//! ## Architecture
//!
//! - `research/` - Controller, round executor, sufficiency evaluator, history
//! - `services/` - Text completion and web search clients
//! - `parser` - Free-text extraction of queries and decisions
//! - `prompts` - Bundled prompt templates (English and Chinese)
//! - `models` - LLM provider configuration
//! - `usage` - Per-run token and cost accounting
//!
//! ## Usage
//!
//! ```rust,ignore
//! use deepsearch_core::research::{ResearchConfig, SearchController};
//!
//! let config = ResearchConfig::new(NonZeroU32::new(5).unwrap());
//! let mut controller = SearchController::new(completion, search, config);
//! let outcome = controller.run("What is the tallest mountain?").await;
//! ```

pub mod error;
pub mod models;
pub mod parser;
pub mod prompts;
pub mod research;
pub mod services;
pub mod usage;

pub use error::{CompletionError, ErrorKind, ParseFailure, ResearchError, SearchError};
pub use models::{LlmProvider, ModelConfig};
pub use research::{ResearchConfig, ResearchOutcome, SearchController};
