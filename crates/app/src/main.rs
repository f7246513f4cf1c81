//! `ask`: stream answers from a chat model, optionally grounded in a knowledge base.

mod config;
mod journal;
mod terminal;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use orchestrator::{CancellationToken, Session, TurnPhase};
use shared::settings::TurnOptions;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use crate::config::FileConfig;
use crate::journal::JsonlLog;
use crate::terminal::TerminalSink;

/// Ask questions against a configured chat model.
///
/// Without a question on the command line, questions are read from stdin one
/// per line and share a conversation history. `/reset` clears the history
/// and `/quit` exits. Ctrl-C stops the answer being streamed.
#[derive(Parser, Debug)]
#[command(name = "ask", version)]
struct Cli {
    /// Settings file. Defaults to `settings.json` in the platform config directory.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Knowledge-base dataset to search before answering.
    #[arg(long, value_name = "NAME")]
    dataset: Option<String>,

    /// Language code sent with retrieval requests.
    #[arg(long = "lang", value_name = "CODE", default_value = "en")]
    language: String,

    /// Send each question without earlier turns as context.
    #[arg(long = "no-history", default_value_t = false)]
    no_history: bool,

    /// Question to ask. Read from stdin when omitted.
    question: Vec<String>,
}

impl Cli {
    fn turn_options(&self) -> TurnOptions {
        TurnOptions {
            dataset: self.dataset.clone().filter(|d| !d.trim().is_empty()),
            language: self.language.clone(),
            include_history: !self.no_history,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_path = match cli.config.clone() {
        Some(path) => path,
        None => config::default_config_path().context("Could not determine config directory")?,
    };
    tracing::debug!(path = ?config_path, "using settings file");

    let mut session = Session::new(Arc::new(FileConfig::new(config_path)));
    match config::default_data_dir().map(JsonlLog::new) {
        Some(Ok(log)) => {
            tracing::debug!(path = ?log.path(), "conversation journal");
            session = session.with_log(Arc::new(log));
        }
        Some(Err(e)) => tracing::warn!(error = %e, "conversation journal disabled"),
        None => tracing::warn!("no data directory; conversation journal disabled"),
    }

    let options = cli.turn_options();
    let sink = TerminalSink::new();

    if !cli.question.is_empty() {
        let question = cli.question.join(" ");
        let phase = run_turn(&session, &question, &options, &sink).await;
        if matches!(phase, TurnPhase::Failed) {
            std::process::exit(1);
        }
        return Ok(());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read stdin")?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };
        match line.trim() {
            "" => continue,
            "/quit" => break,
            "/reset" => {
                session.reset();
                eprintln!("· History cleared");
            }
            question => {
                run_turn(&session, question, &options, &sink).await;
            }
        }
    }
    Ok(())
}

/// Run one turn, stopping it on Ctrl-C.
async fn run_turn(
    session: &Session,
    question: &str,
    options: &TurnOptions,
    sink: &TerminalSink,
) -> TurnPhase {
    let token = CancellationToken::new();
    let turn = session.ask(question, options, sink, &token);
    tokio::pin!(turn);

    let outcome = loop {
        tokio::select! {
            outcome = &mut turn => break outcome,
            _ = tokio::signal::ctrl_c(), if !token.is_stopped() => token.stop(),
        }
    };

    sink.end_turn();
    if outcome.phase == TurnPhase::Stopped {
        eprintln!("· {}", outcome.status_line());
    }
    outcome.phase
}
