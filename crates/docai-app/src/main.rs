//! DocAI client binary - composition root.
//!
//! 1. Parse CLI flags and initialize tracing
//! 2. Load configuration (file, env, flags)
//! 3. Build the HTTP query client, conversation store, and orchestrator
//! 4. Answer one `--query` or read questions from stdin until EOF

mod cli;
mod interrupt;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use docai_chat::{
    ConversationSnapshot, ConversationStore, HttpQueryApi, RetryPolicy, SubmissionOrchestrator,
    SubmitOutcome,
};

use crate::cli::CliArgs;
use crate::interrupt::Interrupts;

type Orchestrator = SubmissionOrchestrator<HttpQueryApi>;

/// Call `on_typing` once for every placeholder that shows up in the store.
async fn typing_indicator(
    mut rx: watch::Receiver<ConversationSnapshot>,
    mut on_typing: impl FnMut(),
) {
    let mut shown = None;
    loop {
        let placeholder = rx.borrow_and_update().placeholder().map(|m| m.id);
        if placeholder.is_some() && placeholder != shown {
            on_typing();
        }
        shown = placeholder;
        if rx.changed().await.is_err() {
            break;
        }
    }
}

/// Run one cycle; an interrupt while it runs cancels it.
async fn ask(orch: &Orchestrator, interrupts: &Interrupts, query: &str) {
    let token = interrupts.begin_cycle();
    let result = orch.submit_with_cancel(query, &token).await;
    interrupts.end_cycle();

    match result {
        Ok(SubmitOutcome::Skipped) => {}
        Ok(SubmitOutcome::Cancelled { attempts }) => {
            println!("(cancelled after {} attempts)", attempts);
        }
        Ok(outcome) => {
            if let Some(answer) = orch.store().snapshot().last_assistant() {
                println!("assistant> {}", answer.text);
            }
            tracing::debug!(attempts = outcome.attempts(), "Cycle finished");
        }
        Err(e) => {
            tracing::error!(error = %e, "Submission failed");
            eprintln!("error: {}", e);
        }
    }
}

async fn interactive(orch: &Orchestrator, interrupts: &Interrupts) -> std::io::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("Ask a question (Ctrl-D, Ctrl-C or /quit to exit).");
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = interrupts.shutdown().cancelled() => break,
        };
        let Some(line) = line else { break };
        let line = line.trim();
        if line == "/quit" {
            break;
        }
        ask(orch, interrupts, line).await;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Tracing goes to stderr so stdout carries only the conversation.
    let from_env = EnvFilter::try_from_default_env().ok();
    let has_env_filter = from_env.is_some();
    let initial = from_env
        .unwrap_or_else(|| EnvFilter::new(args.log_level.as_deref().unwrap_or("info")));
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(initial)
        .with_filter_reloading();
    let filter_handle = builder.reload_handle();
    builder.init();

    tracing::info!("Starting DocAI client v{}", env!("CARGO_PKG_VERSION"));

    let config = args.load_config()?;
    if !has_env_filter {
        filter_handle.reload(EnvFilter::new(&config.general.log_level))?;
    }

    let api = HttpQueryApi::from_config(&config.api)?;
    tracing::info!(
        url = %api.url(),
        retry_ceiling = config.retry.retry_ceiling,
        backoff_unit_ms = config.retry.backoff_unit_ms,
        "Query client ready"
    );

    let orch = SubmissionOrchestrator::new(
        api,
        ConversationStore::new(),
        RetryPolicy::from_config(&config.retry),
    );

    let indicator = tokio::spawn(typing_indicator(orch.store().subscribe(), || {
        eprintln!("assistant is typing...")
    }));

    let interrupts = Interrupts::new();
    tokio::spawn(interrupts.clone().listen());

    match args.query.as_deref() {
        Some(query) => ask(&orch, &interrupts, query).await,
        None => interactive(&orch, &interrupts).await?,
    }

    indicator.abort();

    if args.transcript {
        println!("{}", serde_json::to_string_pretty(&orch.store().snapshot())?);
    }

    if interrupts.shutdown().is_cancelled() {
        // A pending stdin read keeps the runtime from shutting down.
        std::process::exit(130);
    }

    Ok(())
}
