//! # Search Controller
//!
//! Drives the research loop from question to report:
//! 1. Round 1 turns the question into a query; later rounds reuse the
//!    synthesis step's next query as-is
//! 2. Each round searches, renders the hits and summarizes them
//! 3. After every round the synthesis step judges the whole history
//!
//! The loop ends on a sufficient decision, the first error, the round cap,
//! or an abort command.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use super::evaluator::SufficiencyEvaluator;
use super::events::{ResearchEvent, ResearchEventKind};
use super::history::History;
use super::outcome::ResearchOutcome;
use super::round::{RoundExecutor, RoundObserver, RoundSeed, RoundStep};
use super::stage::ControllerStage;
use crate::error::{ParseFailure, ParseFailureReason, ParseMode, ResearchError};
use crate::parser::Decision;
use crate::prompts::PromptLanguage;
use crate::services::{SearchClient, TextCompletionClient};
use crate::usage::UsageLedger;

fn default_result_count() -> usize {
    10
}

/// Configuration for one research run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchConfig {
    /// Hard cap on rounds. There is no default.
    pub max_rounds: NonZeroU32,
    /// Hits requested per search
    #[serde(default = "default_result_count")]
    pub result_count: usize,
    /// Limit applied to every completion and search call
    #[serde(default)]
    pub call_timeout: Option<Duration>,
    #[serde(default)]
    pub language: PromptLanguage,
}

impl ResearchConfig {
    pub fn new(max_rounds: NonZeroU32) -> Self {
        Self {
            max_rounds,
            result_count: default_result_count(),
            call_timeout: None,
            language: PromptLanguage::default(),
        }
    }

    pub fn with_result_count(mut self, count: usize) -> Self {
        self.result_count = count.max(1);
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    pub fn with_language(mut self, language: PromptLanguage) -> Self {
        self.language = language;
        self
    }

    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout
    }
}

/// Commands accepted while a run is in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerCommand {
    /// Stop before the next round starts
    Abort,
}

/// The research loop
pub struct SearchController {
    completion: Arc<dyn TextCompletionClient>,
    search: Arc<dyn SearchClient>,
    config: ResearchConfig,
    stage: ControllerStage,
    event_tx: Option<mpsc::Sender<ResearchEvent>>,
    command_rx: Option<mpsc::Receiver<ControllerCommand>>,
}

impl SearchController {
    pub fn new(
        completion: Arc<dyn TextCompletionClient>,
        search: Arc<dyn SearchClient>,
        config: ResearchConfig,
    ) -> Self {
        Self {
            completion,
            search,
            config,
            stage: ControllerStage::Init,
            event_tx: None,
            command_rx: None,
        }
    }

    /// Set event channel for streaming progress
    pub fn with_event_channel(mut self, tx: mpsc::Sender<ResearchEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// Set command channel for aborting a run between rounds
    pub fn with_command_channel(mut self, rx: mpsc::Receiver<ControllerCommand>) -> Self {
        self.command_rx = Some(rx);
        self
    }

    pub fn config(&self) -> &ResearchConfig {
        &self.config
    }

    pub fn stage(&self) -> ControllerStage {
        self.stage
    }

    /// Research `question` until a sufficient report or a failure
    #[tracing::instrument(skip(self), fields(question_preview = %question.chars().take(50).collect::<String>()))]
    pub async fn run(&mut self, question: &str) -> ResearchOutcome {
        let completion = Arc::clone(&self.completion);
        let search = Arc::clone(&self.search);
        let config = self.config.clone();
        let executor = RoundExecutor::new(completion.as_ref(), search.as_ref(), &config);
        let evaluator = SufficiencyEvaluator::new(completion.as_ref(), &config);

        let mut history = History::new();
        let mut usage = UsageLedger::new();
        let mut seed = RoundSeed::Question;

        self.stage = ControllerStage::Init;
        tracing::info!(max_rounds = config.max_rounds.get(), "Research started");
        self.emit(
            ResearchEvent::new(ResearchEventKind::SessionStarted).with_data(serde_json::json!({
                "question": question,
                "max_rounds": config.max_rounds.get(),
            })),
        )
        .await;

        let result: Result<String, ResearchError> = loop {
            let index = history.next_index();
            if index > config.max_rounds.get() {
                break Err(ResearchError::RoundLimitReached {
                    max_rounds: config.max_rounds.get(),
                });
            }
            if self.abort_requested() {
                break Err(ResearchError::Cancelled { next_round: index });
            }

            if index == 1 {
                self.transition(ControllerStage::GeneratingFirstQuery);
            }
            let mut progress = RoundProgress {
                stage: &mut self.stage,
                event_tx: self.event_tx.as_ref(),
            };
            match executor
                .run_round(question, &history, &seed, &mut usage, &mut progress)
                .await
            {
                Ok(round) => history.record(round),
                Err(e) => break Err(e),
            }

            self.transition(ControllerStage::Evaluating);
            let decision = match evaluator.evaluate(question, &history, &mut usage).await {
                Ok(decision) => decision,
                Err(e) => break Err(e),
            };
            self.emit(
                ResearchEvent::new(ResearchEventKind::DecisionMade)
                    .in_round(index)
                    .with_data(serde_json::json!({
                        "sufficient": decision.sufficient,
                        "next_query": decision.next_query,
                        "rationale": decision.rationale,
                    })),
            )
            .await;

            match decision {
                Decision {
                    sufficient: true,
                    report: Some(report),
                    ..
                } => break Ok(report),
                Decision {
                    sufficient: false,
                    next_query: Some(next_query),
                    ..
                } => {
                    tracing::info!(round = index, next_query = %next_query, "Insufficient, continuing");
                    seed = RoundSeed::Carried(next_query);
                }
                Decision { sufficient, .. } => {
                    let reason = if sufficient {
                        ParseFailureReason::MissingReport
                    } else {
                        ParseFailureReason::MissingNextQuery
                    };
                    break Err(ResearchError::DecisionExtraction {
                        round: index,
                        failure: ParseFailure::new(ParseMode::ExtractDecision, reason),
                    });
                }
            }
        };

        match result {
            Ok(report) => {
                self.transition(ControllerStage::Terminated);
                tracing::info!(rounds = history.len(), cost = usage.cost, "Research terminated");
                self.emit(
                    ResearchEvent::new(ResearchEventKind::SessionTerminated).with_data(
                        serde_json::json!({ "rounds": history.len(), "report": report }),
                    ),
                )
                .await;
                ResearchOutcome::Terminated {
                    report,
                    history,
                    usage,
                }
            }
            Err(error) => {
                self.transition(ControllerStage::Failed);
                tracing::warn!(rounds = history.len(), error = %error, "Research failed");
                self.emit(
                    ResearchEvent::new(ResearchEventKind::SessionFailed).with_data(
                        serde_json::json!({
                            "rounds": history.len(),
                            "error_kind": error.kind(),
                            "error": error.to_string(),
                        }),
                    ),
                )
                .await;
                ResearchOutcome::Failed {
                    error,
                    partial_history: history,
                    usage,
                }
            }
        }
    }

    fn transition(&mut self, next: ControllerStage) {
        advance(&mut self.stage, next);
    }

    /// Drain pending commands without waiting
    fn abort_requested(&mut self) -> bool {
        let Some(rx) = self.command_rx.as_mut() else {
            return false;
        };
        let mut abort = false;
        while let Ok(command) = rx.try_recv() {
            match command {
                ControllerCommand::Abort => abort = true,
            }
        }
        abort
    }

    async fn emit(&self, event: ResearchEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event).await;
        }
    }
}

fn advance(stage: &mut ControllerStage, next: ControllerStage) {
    if *stage == next {
        return;
    }
    debug_assert!(
        stage.can_transition_to(next),
        "illegal stage transition {:?} -> {:?}",
        stage,
        next
    );
    tracing::debug!(from = ?stage, to = ?next, "Stage transition");
    *stage = next;
}

/// Turns round steps into stage changes and streamed events
struct RoundProgress<'c> {
    stage: &'c mut ControllerStage,
    event_tx: Option<&'c mpsc::Sender<ResearchEvent>>,
}

#[async_trait]
impl<'c> RoundObserver for RoundProgress<'c> {
    async fn on_step(&mut self, step: RoundStep<'_>) {
        let event = match step {
            RoundStep::QueryResolved {
                round,
                query,
                generated,
            } => {
                advance(self.stage, ControllerStage::RunningRound);
                tracing::debug!(round, query = %query, "Query resolved");
                ResearchEvent::new(ResearchEventKind::QueryGenerated)
                    .in_round(round)
                    .with_data(serde_json::json!({ "query": query, "generated": generated }))
            }
            RoundStep::SearchCompleted {
                round,
                hits,
                results_text,
            } => ResearchEvent::new(ResearchEventKind::SearchCompleted)
                .in_round(round)
                .with_data(serde_json::json!({ "hits": hits, "results": results_text })),
            RoundStep::Summarized { round, summary } => {
                ResearchEvent::new(ResearchEventKind::RoundSummarized)
                    .in_round(round)
                    .with_data(serde_json::json!({ "summary": summary }))
            }
        };
        if let Some(tx) = self.event_tx {
            let _ = tx.send(event).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CompletionError, ErrorKind, SearchError};
    use crate::research::outcome::OutcomeStatus;
    use crate::research::testing::{ScriptedCompletion, ScriptedSearch};
    use crate::services::{Completion, SearchHit};
    use crate::usage::{Pricing, TokenUsage};

    const QUESTION: &str = "What is the tallest mountain?";

    fn rounds(n: u32) -> ResearchConfig {
        ResearchConfig::new(NonZeroU32::new(n).unwrap())
    }

    fn everest() -> SearchHit {
        SearchHit::new("Mount Everest", "8,849m", "https://en.wikipedia.org/Everest")
    }

    fn controller(
        completion: &Arc<ScriptedCompletion>,
        search: &Arc<ScriptedSearch>,
        config: ResearchConfig,
    ) -> SearchController {
        SearchController::new(completion.clone(), search.clone(), config)
    }

    #[tokio::test]
    async fn test_tallest_mountain_scenario() {
        let completion = Arc::new(ScriptedCompletion::new([
            "query: tallest mountain in the world",
            "Everest stands at 8,849m.",
            "sufficiency: sufficient\nreport: Mount Everest is the tallest mountain.",
        ]));
        let search = Arc::new(ScriptedSearch::new([Ok(vec![everest()])]));
        let mut controller = controller(&completion, &search, rounds(5));

        let outcome = controller.run(QUESTION).await;

        assert_eq!(outcome.status(), OutcomeStatus::Terminated);
        assert_eq!(outcome.report(), Some("Mount Everest is the tallest mountain."));
        assert_eq!(outcome.history().len(), 1);
        let round = &outcome.history().rounds()[0];
        assert_eq!(round.query, "tallest mountain in the world");
        assert_eq!(round.summary_text, "Everest stands at 8,849m.");
        assert_eq!(
            round.results_text,
            "1. Mount Everest\n8,849m\nen.wikipedia.org\n"
        );
        assert_eq!(search.queries(), vec!["tallest mountain in the world".to_string()]);
        assert_eq!(controller.stage(), ControllerStage::Terminated);
    }

    #[tokio::test]
    async fn test_terminates_at_sufficient_round_with_gapless_indices() {
        let completion = Arc::new(ScriptedCompletion::new([
            "query: everest height",
            "summary 1",
            "sufficiency: insufficient\nnew query: k2 height",
            "summary 2",
            "sufficiency: insufficient\nnew query: kangchenjunga height",
            "summary 3",
            "sufficiency: sufficient\nreport: Everest, then K2, then Kangchenjunga.",
        ]));
        let search = Arc::new(ScriptedSearch::new([
            Ok(vec![everest()]),
            Ok(vec![everest()]),
            Ok(vec![everest()]),
        ]));
        let mut controller = controller(&completion, &search, rounds(10));

        let outcome = controller.run(QUESTION).await;

        assert_eq!(outcome.report(), Some("Everest, then K2, then Kangchenjunga."));
        let indices: Vec<u32> = outcome.history().rounds().iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![1, 2, 3]);
        assert_eq!(outcome.usage().calls, 7);
    }

    #[tokio::test]
    async fn test_later_rounds_reuse_next_query_without_generation() {
        let completion = Arc::new(ScriptedCompletion::new([
            "query: everest height",
            "summary 1",
            "sufficiency: insufficient\nnext query: \"k2 height\"",
            "summary 2",
            "sufficiency: sufficient\nreport: Everest.",
        ]));
        let search = Arc::new(ScriptedSearch::new([Ok(vec![everest()]), Ok(vec![everest()])]));
        let mut controller = controller(&completion, &search, rounds(5));

        let outcome = controller.run(QUESTION).await;

        assert_eq!(outcome.status(), OutcomeStatus::Terminated);
        assert_eq!(
            search.queries(),
            vec!["everest height".to_string(), "k2 height".to_string()]
        );
        // generate, summarize, synthesize, summarize, synthesize
        let prompts = completion.prompts();
        assert_eq!(prompts.len(), 5);
        assert!(prompts[3].contains("k2 height"));
        assert!(!prompts[3].contains("**Round 1**"));
        assert!(prompts[4].contains("**Round 1**") && prompts[4].contains("**Round 2**"));
    }

    #[tokio::test]
    async fn test_search_failure_on_round_two_keeps_partial_history() {
        let completion = Arc::new(ScriptedCompletion::new([
            "query: everest height",
            "summary 1",
            "sufficiency: insufficient\nnew query: k2 height",
        ]));
        let search = Arc::new(ScriptedSearch::new([
            Ok(vec![everest()]),
            Err(SearchError::Unavailable("quota exceeded".to_string())),
        ]));
        let mut controller = controller(&completion, &search, rounds(5));

        let outcome = controller.run(QUESTION).await;

        match &outcome {
            ResearchOutcome::Failed {
                error,
                partial_history,
                ..
            } => {
                assert_eq!(partial_history.len(), 1);
                assert!(matches!(
                    error,
                    ResearchError::SearchService(SearchError::Unavailable(cause)) if cause == "quota exceeded"
                ));
            }
            other => panic!("expected failure, got {:?}", other.status()),
        }
        assert_eq!(controller.stage(), ControllerStage::Failed);
    }

    #[tokio::test]
    async fn test_round_limit_reached() {
        let completion = Arc::new(ScriptedCompletion::new([
            "query: a",
            "summary 1",
            "sufficiency: insufficient\nnew query: b",
            "summary 2",
            "sufficiency: insufficient\nnew query: c",
        ]));
        let search = Arc::new(ScriptedSearch::new([Ok(vec![everest()]), Ok(vec![everest()])]));
        let mut controller = controller(&completion, &search, rounds(2));

        let outcome = controller.run(QUESTION).await;

        assert!(matches!(
            outcome.error(),
            Some(ResearchError::RoundLimitReached { max_rounds: 2 })
        ));
        assert_eq!(outcome.history().len(), 2);
        assert_eq!(search.queries().len(), 2);
    }

    #[tokio::test]
    async fn test_sufficient_on_last_allowed_round_terminates() {
        let completion = Arc::new(ScriptedCompletion::new([
            "query: a",
            "summary 1",
            "sufficiency: sufficient\nreport: done",
        ]));
        let search = Arc::new(ScriptedSearch::new([Ok(vec![everest()])]));
        let mut controller = controller(&completion, &search, rounds(1));

        let outcome = controller.run(QUESTION).await;
        assert_eq!(outcome.report(), Some("done"));
    }

    #[tokio::test]
    async fn test_abort_before_first_round() {
        let completion = Arc::new(ScriptedCompletion::new(["query: a"]));
        let search = Arc::new(ScriptedSearch::empty());
        let (tx, rx) = mpsc::channel(4);
        tx.send(ControllerCommand::Abort).await.unwrap();
        let mut controller = controller(&completion, &search, rounds(3)).with_command_channel(rx);

        let outcome = controller.run(QUESTION).await;

        assert!(matches!(
            outcome.error(),
            Some(ResearchError::Cancelled { next_round: 1 })
        ));
        assert!(outcome.history().is_empty());
        assert!(completion.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_call_timeout_fails_the_run() {
        let completion = Arc::new(
            ScriptedCompletion::new(["query: a"]).with_delay(Duration::from_millis(200)),
        );
        let search = Arc::new(ScriptedSearch::empty());
        let config = rounds(3).with_call_timeout(Duration::from_millis(10));
        let mut controller = controller(&completion, &search, config);

        let outcome = controller.run(QUESTION).await;

        assert!(matches!(
            outcome.error(),
            Some(ResearchError::CompletionService(CompletionError::Timeout(_)))
        ));
        assert_eq!(outcome.summary().error_kind, Some(ErrorKind::CompletionService));
    }

    #[tokio::test]
    async fn test_search_timeout_fails_the_run() {
        let completion = Arc::new(ScriptedCompletion::new(["query: a"]));
        let search = Arc::new(
            ScriptedSearch::new([Ok(vec![everest()])]).with_delay(Duration::from_millis(200)),
        );
        let config = rounds(3).with_call_timeout(Duration::from_millis(10));
        let mut controller = controller(&completion, &search, config);

        let outcome = controller.run(QUESTION).await;

        assert!(matches!(
            outcome.error(),
            Some(ResearchError::SearchService(SearchError::Timeout(_)))
        ));
    }

    #[tokio::test]
    async fn test_usage_accumulates_across_calls() {
        let usage = Some(TokenUsage {
            prompt_tokens: 100,
            completion_tokens: 20,
        });
        let reply = |text: &str| {
            Ok(Completion {
                text: text.to_string(),
                usage,
            })
        };
        let completion = Arc::new(
            ScriptedCompletion::from_results(vec![
                reply("query: a"),
                reply("summary"),
                reply("sufficiency: sufficient\nreport: done"),
            ])
            .with_pricing(Pricing::new(0.001, 0.002)),
        );
        let search = Arc::new(ScriptedSearch::new([Ok(vec![everest()])]));
        let mut controller = controller(&completion, &search, rounds(3));

        let outcome = controller.run(QUESTION).await;

        let ledger = outcome.usage();
        assert_eq!(ledger.calls, 3);
        assert_eq!(ledger.prompt_tokens, 300);
        assert_eq!(ledger.completion_tokens, 60);
        assert!((ledger.cost - 0.42).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_events_stream_in_order() {
        let completion = Arc::new(ScriptedCompletion::new([
            "query: tallest mountain in the world",
            "Everest stands at 8,849m.",
            "sufficiency: sufficient\nreport: Everest.",
        ]));
        let search = Arc::new(ScriptedSearch::new([Ok(vec![everest()])]));
        let (tx, mut rx) = mpsc::channel(32);
        let mut controller = controller(&completion, &search, rounds(3)).with_event_channel(tx);

        controller.run(QUESTION).await;

        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            kinds.push(event.kind);
        }
        assert_eq!(
            kinds,
            vec![
                ResearchEventKind::SessionStarted,
                ResearchEventKind::QueryGenerated,
                ResearchEventKind::SearchCompleted,
                ResearchEventKind::RoundSummarized,
                ResearchEventKind::DecisionMade,
                ResearchEventKind::SessionTerminated,
            ]
        );
    }

    #[test]
    fn test_config_defaults_from_json() {
        let config: ResearchConfig = serde_json::from_str(r#"{"max_rounds": 4}"#).unwrap();
        assert_eq!(config, rounds(4));
        assert_eq!(config.result_count, 10);
        assert!(config.call_timeout().is_none());
        assert!(serde_json::from_str::<ResearchConfig>(r#"{"max_rounds": 0}"#).is_err());
    }

    #[test]
    fn test_run_blocks_to_completion() {
        let completion = Arc::new(ScriptedCompletion::new([
            "query: a",
            "summary",
            "sufficiency: sufficient\nreport: done",
        ]));
        let search = Arc::new(ScriptedSearch::new([Ok(vec![everest()])]));
        let mut controller = controller(&completion, &search, rounds(2));

        let outcome = tokio_test::block_on(controller.run(QUESTION));
        assert_eq!(outcome.status(), OutcomeStatus::Terminated);
    }
}
