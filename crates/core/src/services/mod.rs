//! # External Services
//!
//! Seams for the two remote collaborators of the research loop.
//!
//! - `completion` - text generation (prompt in, text out)
//! - `search` - web search (query in, ranked hits out)
//!
//! Both are async traits so the loop can be driven by scripted stubs in tests.

pub mod completion;
pub mod search;

pub use completion::{Completion, OpenAiCompatibleClient, TextCompletionClient};
pub use search::{GoogleCustomSearch, SearchClient, SearchHit, SearxngSearch};

use crate::error::{CompletionError, SearchError};
use std::future::Future;
use std::time::Duration;

/// Run a completion call under an optional timeout
pub async fn complete_within<F>(
    timeout: Option<Duration>,
    call: F,
) -> Result<Completion, CompletionError>
where
    F: Future<Output = Result<Completion, CompletionError>>,
{
    match timeout {
        Some(limit) => tokio::time::timeout(limit, call)
            .await
            .unwrap_or(Err(CompletionError::Timeout(limit))),
        None => call.await,
    }
}

/// Run a search call under an optional timeout
pub async fn search_within<F>(
    timeout: Option<Duration>,
    call: F,
) -> Result<Vec<SearchHit>, SearchError>
where
    F: Future<Output = Result<Vec<SearchHit>, SearchError>>,
{
    match timeout {
        Some(limit) => tokio::time::timeout(limit, call)
            .await
            .unwrap_or(Err(SearchError::Timeout(limit))),
        None => call.await,
    }
}
