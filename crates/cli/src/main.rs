mod config;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use config::{config_dir, PersistedConfig, SearchBackend, Settings};
use deepsearch_core::research::{
    ControllerCommand, ResearchEvent, ResearchEventKind, ResearchOutcome, SearchController,
};
use deepsearch_core::services::{GoogleCustomSearch, SearchClient, SearxngSearch, TextCompletionClient};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

/// Conventional exit status for SIGINT
const INTERRUPTED_EXIT: i32 = 130;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InterruptAction {
    /// Let the current round finish, then stop
    Abort,
    /// Leave immediately
    Exit,
}

fn interrupt_action(presses: u32) -> InterruptAction {
    if presses <= 1 {
        InterruptAction::Abort
    } else {
        InterruptAction::Exit
    }
}

#[derive(Parser)]
#[command(author, version, about = "Deepsearch - iterative web research from the terminal")]
struct Args {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Research a question until a sufficient report is produced
    Run {
        /// The question to answer
        question: String,
        /// Maximum number of search rounds (required here or in config.json)
        #[arg(long)]
        max_rounds: Option<u32>,
        /// LLM provider (dashscope, deepseek, openai, openrouter, grok)
        #[arg(long)]
        provider: Option<String>,
        /// Model name
        #[arg(long)]
        model: Option<String>,
        /// Base URL override for the completion endpoint
        #[arg(long)]
        base_url: Option<String>,
        /// System message sent ahead of every prompt
        #[arg(long)]
        system_prompt: Option<String>,
        /// Search backend
        #[arg(long, value_enum)]
        search: Option<SearchBackend>,
        /// SearXNG instance URL
        #[arg(long)]
        searxng_url: Option<String>,
        /// Results requested per search
        #[arg(long)]
        results: Option<usize>,
        /// Per-call timeout in seconds (0 disables)
        #[arg(long)]
        timeout_secs: Option<u64>,
        /// Prompt language (en, zh)
        #[arg(long)]
        lang: Option<String>,
        /// Print the outcome as JSON on stdout
        #[arg(long)]
        json: bool,
    },
    /// Write a starter config.json and .gitignore
    Init,
    /// Print the effective configuration
    Config,
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_env(dir: &Path) {
    let _ = dotenvy::dotenv();
    let _ = dotenvy::from_path(dir.join(".env"));
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    let dir = config_dir();
    load_env(&dir);

    match dispatch(args.command, &dir).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("❌ {:#}", e);
            ExitCode::from(2)
        }
    }
}

async fn dispatch(command: CliCommand, dir: &Path) -> Result<ExitCode> {
    match command {
        CliCommand::Init => {
            init_home(dir).await?;
            Ok(ExitCode::SUCCESS)
        }
        CliCommand::Config => {
            let file = PersistedConfig::load(dir).await?;
            print_config(&file, dir)?;
            Ok(ExitCode::SUCCESS)
        }
        CliCommand::Run {
            question,
            max_rounds,
            provider,
            model,
            base_url,
            system_prompt,
            search,
            searxng_url,
            results,
            timeout_secs,
            lang,
            json,
        } => {
            let mut layered = PersistedConfig::load(dir).await?;
            layered.merge(PersistedConfig {
                provider,
                model,
                base_url,
                system_prompt,
                search,
                searxng_url,
                max_rounds,
                result_count: results,
                timeout_secs,
                language: lang,
            });
            let settings = layered.resolve()?;
            run(&question, settings, json).await
        }
    }
}

async fn init_home(dir: &Path) -> Result<()> {
    println!("🔧 Initializing {}", dir.display());

    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let gitignore = dir.join(".gitignore");
    tokio::fs::write(&gitignore, "# Never commit secrets\n.env\n*.env\n")
        .await
        .with_context(|| format!("Failed to write {}", gitignore.display()))?;

    if dir.join("config.json").exists() {
        println!("   Kept existing config.json");
    } else {
        let path = PersistedConfig::starter().save(dir).await?;
        println!("   Created: {}", path.display());
    }
    println!("\n🚀 Put API keys in {}/.env, then `deepsearch run \"<question>\"`", dir.display());
    Ok(())
}

fn print_config(file: &PersistedConfig, dir: &Path) -> Result<()> {
    println!("Config directory: {}", dir.display());
    println!("{}", serde_json::to_string_pretty(file)?);

    match file.resolve() {
        Ok(settings) => {
            let key_env = settings.model.provider.api_key_env();
            let key_state = if std::env::var(key_env).is_ok() { "set" } else { "missing" };
            println!(
                "Provider: {} ({}), model {}",
                settings.model.provider.display_name(),
                settings.model.effective_base_url(),
                settings.model.model
            );
            println!("API key:  {} ({})", key_env, key_state);
            println!("Search:   {:?}", settings.search);
            println!("Rounds:   at most {}", settings.research.max_rounds);
        }
        Err(e) => println!("Not runnable yet: {:#}", e),
    }
    Ok(())
}

fn build_search(settings: &Settings) -> Result<Arc<dyn SearchClient>> {
    let client: Arc<dyn SearchClient> = match settings.search {
        SearchBackend::Google => Arc::new(
            GoogleCustomSearch::from_env().context("Google Custom Search is not configured")?,
        ),
        SearchBackend::Searxng => Arc::new(
            SearxngSearch::new(settings.searxng_url.as_deref())
                .context("Failed to build SearXNG client")?,
        ),
    };
    Ok(client)
}

async fn run(question: &str, settings: Settings, json: bool) -> Result<ExitCode> {
    let completion: Arc<dyn TextCompletionClient> = Arc::new(
        settings
            .model
            .create_client()
            .context("Failed to create completion client")?,
    );
    let search = build_search(&settings)?;

    let (event_tx, mut event_rx) = mpsc::channel::<ResearchEvent>(64);
    let (command_tx, command_rx) = mpsc::channel::<ControllerCommand>(4);

    let printer = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            print_progress(&event);
        }
    });

    tokio::spawn(async move {
        let mut presses = 0;
        while tokio::signal::ctrl_c().await.is_ok() {
            presses += 1;
            match interrupt_action(presses) {
                InterruptAction::Abort => {
                    eprintln!("⏹  Stopping after the current round (Ctrl-C again to quit)...");
                    let _ = command_tx.try_send(ControllerCommand::Abort);
                }
                InterruptAction::Exit => {
                    eprintln!("⏹  Interrupted again, exiting now.");
                    std::process::exit(INTERRUPTED_EXIT);
                }
            }
        }
    });

    let mut controller = SearchController::new(completion, search, settings.research)
        .with_event_channel(event_tx)
        .with_command_channel(command_rx);
    let outcome = controller.run(question).await;
    drop(controller);
    let _ = printer.await;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome.summary())?);
    } else {
        print_outcome(&outcome);
    }

    let usage = outcome.usage();
    eprintln!(
        "📊 {} calls, {} tokens, cost {:.4}",
        usage.calls,
        usage.total_tokens(),
        usage.cost
    );

    Ok(match outcome {
        ResearchOutcome::Terminated { .. } => ExitCode::SUCCESS,
        ResearchOutcome::Failed { .. } => ExitCode::from(1),
    })
}

/// Per-round progress on stderr; stdout carries only the result
fn print_progress(event: &ResearchEvent) {
    let round = event.round.unwrap_or_default();
    let field = |name: &str| {
        event
            .data
            .as_ref()
            .and_then(|d| d.get(name))
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    };

    match event.kind {
        ResearchEventKind::SessionStarted => eprintln!("🔍 Researching: {}", field("question")),
        ResearchEventKind::QueryGenerated => {
            eprintln!("\n── Round {} ──\nQuery: {}", round, field("query"))
        }
        ResearchEventKind::SearchCompleted => {
            let hits = event
                .data
                .as_ref()
                .and_then(|d| d.get("hits"))
                .and_then(|v| v.as_u64())
                .unwrap_or_default();
            eprintln!("Search: {} results", hits);
            tracing::debug!(round, results = %field("results"), "Rendered results");
        }
        ResearchEventKind::RoundSummarized => eprintln!("Summary:\n{}", field("summary")),
        ResearchEventKind::DecisionMade => {
            let sufficient = event
                .data
                .as_ref()
                .and_then(|d| d.get("sufficient"))
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            if sufficient {
                eprintln!("Verdict: sufficient");
            } else {
                eprintln!("Verdict: insufficient, next query: {}", field("next_query"));
            }
        }
        ResearchEventKind::SessionTerminated | ResearchEventKind::SessionFailed => {}
    }
}

fn print_outcome(outcome: &ResearchOutcome) {
    match outcome {
        ResearchOutcome::Terminated { report, history, .. } => {
            eprintln!("\n✅ Sufficient after {} round(s)\n", history.len());
            println!("{}", report);
        }
        ResearchOutcome::Failed {
            error,
            partial_history,
            ..
        } => {
            eprintln!("\n❌ Research failed: {}", error);
            if partial_history.is_empty() {
                eprintln!("   No rounds completed.");
            }
            for round in partial_history.rounds() {
                eprintln!("\nRound {}: {}\n{}", round.index, round.query, round.summary_text);
            }
        }
    }
}
