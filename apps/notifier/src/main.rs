//! Reportify notifier entry point.

mod commands;
mod config;
mod console;

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use reportify_notifications::NoticeBoard;
use reportify_push_gate::NotificationGate;

use commands::Command;
use config::NotifierConfig;
use console::ConsoleSink;

/// How often expired notices are removed from the board.
const PRUNE_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Parser)]
#[command(version, about = "Keeps the report notification channel open")]
struct Args {
    /// Config file to read instead of the default location.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Push endpoint, overriding config and environment.
    #[arg(long)]
    ws_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "starting Reportify notifier"
    );

    let mut cfg = NotifierConfig::load(args.config.as_deref())?;
    cfg.apply_env(|key| std::env::var(key).ok());
    if let Some(url) = args.ws_url {
        cfg.ws_url = url;
    }
    if cfg.ws_url.is_empty() {
        tracing::warn!("no push endpoint configured; notifications are disabled");
    }

    let board = Arc::new(Mutex::new(NoticeBoard::new()));
    let gate = NotificationGate::new(
        cfg.ws_url.clone(),
        cfg.policy(),
        Arc::new(ConsoleSink::new(board.clone())),
    );
    gate.set_credential(cfg.token.as_deref());

    let pruner = tokio::spawn(prune_notices(board.clone()));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => match line? {
                Some(line) => {
                    if let Some(command) = Command::parse(&line) {
                        run_command(&gate, &board, command);
                    }
                }
                None => break,
            },
        }
    }

    tracing::info!("shutting down");
    gate.shutdown();
    pruner.abort();
    Ok(())
}

fn run_command(gate: &NotificationGate, board: &Mutex<NoticeBoard>, command: Command) {
    match command {
        Command::Login(token) => {
            gate.set_credential(Some(&token));
            if !gate.is_eligible() {
                println!("cannot connect: endpoint or token missing");
            }
        }
        Command::Logout => gate.set_credential(None),
        Command::Status => {
            let active = board.lock().unwrap_or_else(PoisonError::into_inner).len();
            println!(
                "eligible={} state={:?} queued={} notices={}",
                gate.is_eligible(),
                gate.state(),
                gate.queued(),
                active
            );
        }
        Command::Send(payload) => {
            if !gate.is_eligible() {
                println!("not signed in; message dropped");
            } else if !gate.send(payload) {
                println!("queued until connected");
            }
        }
    }
}

async fn prune_notices(board: Arc<Mutex<NoticeBoard>>) {
    let mut ticker = tokio::time::interval(PRUNE_INTERVAL);
    loop {
        ticker.tick().await;
        let removed = board
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .prune_expired(Instant::now());
        if removed > 0 {
            tracing::trace!(removed, "expired notices pruned");
        }
    }
}
