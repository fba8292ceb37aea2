//! Jamroom console - Main entry point
//!
//! Runs the playback session controller against the in-process loopback
//! engine and drives it from standard input. Outcome notifications are
//! printed to standard output as JSON lines.
//!
//! Input lines:
//! - `!play <query>`, `!skip`, ... : prefix commands (prefix from config)
//! - `button <id>` : a control button press
//! - `finish`, `fail`, `drain` : simulate the engine finishing the current
//!   track, failing it, or reporting an empty player
//! - `guild <id>`, `user <id>` : switch the simulated guild or user
//! - `sessions` : list guilds with a session
//! - `quit`

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use jamroom_bot::config::Overrides;
use jamroom_bot::engine::LoopbackEngine;
use jamroom_bot::{Action, ActionDispatcher, EngineEventBridge, SharedState};
use jamroom_common::{GuildId, UserId};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for jamroom
#[derive(Parser, Debug)]
#[command(name = "jamroom")]
#[command(about = "Collaborative music bot playback controller (console)")]
#[command(version)]
struct Args {
    /// Path to config file (overrides JAMROOM_CONFIG and platform defaults)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Prefix for text commands
    #[arg(short, long, env = "JAMROOM_PREFIX")]
    prefix: Option<String>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long)]
    log_level: Option<String>,

    /// Guild the console starts in
    #[arg(long, default_value = "1")]
    guild: u64,

    /// User the console acts as
    #[arg(long, default_value = "1")]
    user: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let overrides = Overrides {
        config_path: args.config.clone(),
        prefix: args.prefix.clone(),
        log_level: args.log_level.clone(),
    };
    let settings = overrides.load().context("Failed to load configuration")?;

    // Initialize tracing; logs go to stderr so stdout stays JSON only
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| settings.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting jamroom console");
    info!("Command prefix: {}", settings.prefix);

    let (engine, events) = LoopbackEngine::new();
    let engine = Arc::new(engine.with_synthetic_search());
    let state = Arc::new(SharedState::new(engine.clone(), settings));

    let bridge = EngineEventBridge::new(state.clone());
    tokio::spawn(bridge.run(events));

    let mut outcomes = state.subscribe();
    tokio::spawn(async move {
        loop {
            match outcomes.recv().await {
                Ok(outcome) => match serde_json::to_string(&outcome) {
                    Ok(line) => println!("{}", line),
                    Err(e) => error!("Failed to render outcome: {}", e),
                },
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Renderer lagged, {} outcomes dropped", n);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let console = Console {
        dispatcher: ActionDispatcher::new(state.clone()),
        engine,
        state,
        guild: GuildId(args.guild),
        user: UserId(args.user),
    };

    tokio::select! {
        result = console.run() => result?,
        _ = shutdown_signal() => {}
    }

    info!("Console shutdown complete");
    Ok(())
}

struct Console {
    dispatcher: ActionDispatcher,
    engine: Arc<LoopbackEngine>,
    state: Arc<SharedState>,
    guild: GuildId,
    user: UserId,
}

impl Console {
    async fn run(mut self) -> Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if line == "quit" {
                break;
            }
            self.handle_line(line).await;
        }
        Ok(())
    }

    async fn handle_line(&mut self, line: &str) {
        let prefix = self.state.settings.prefix.clone();
        if line.starts_with(&prefix) {
            match Action::command(self.guild, self.user, line, &prefix, false) {
                Some(action) => {
                    self.dispatcher.dispatch(action).await;
                }
                None => warn!("Ignored message {:?}", line),
            }
            return;
        }

        let (word, arg) = line.split_once(' ').unwrap_or((line, ""));
        match word {
            "button" => match Action::button(self.guild, self.user, arg.trim()) {
                Some(action) => {
                    self.dispatcher.dispatch(action).await;
                }
                None => info!("Navigation button {:?}", arg),
            },
            "finish" => self.simulate("finish", self.engine.finish(self.guild)),
            "fail" => self.simulate("fail", self.engine.fail_current(self.guild)),
            "drain" => self.simulate("drain", self.engine.drain(self.guild)),
            "guild" => match arg.trim().parse() {
                Ok(id) => self.guild = GuildId(id),
                Err(_) => warn!("Invalid guild id {:?}", arg),
            },
            "user" => match arg.trim().parse() {
                Ok(id) => self.user = UserId(id),
                Err(_) => warn!("Invalid user id {:?}", arg),
            },
            "sessions" => {
                let guilds = self.state.registry.guilds().await;
                info!("{} session(s): {:?}", guilds.len(), guilds);
            }
            _ => warn!("Unknown console input {:?}", line),
        }
    }

    fn simulate(&self, what: &str, happened: bool) {
        if !happened {
            warn!("Nothing to {} in guild {}", what, self.guild);
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
