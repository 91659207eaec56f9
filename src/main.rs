//! # Herald — durable Telegram broadcast scheduler
//!
//! Accepts a message, a target time, and an audience; persists the intent;
//! and delivers it exactly once, surviving restarts.
//!
//! Usage:
//!   herald                        # Run with ~/.herald/config.toml
//!   herald --config herald.toml   # Explicit config file
//!   herald --database ./news.db   # Override the database path
//!   HERALD_BOT_TOKEN=... herald   # Token from the environment

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use herald_core::HeraldConfig;
use herald_scheduler::{BroadcastController, BroadcastScheduler, Dispatcher, spawn_controller};
use herald_store::Database;
use herald_telegram::{Bot, TelegramApi, TelegramTransport};

#[derive(Parser)]
#[command(
    name = "herald",
    version,
    about = "📨 Herald — durable broadcast scheduler for Telegram"
)]
struct Cli {
    /// Config file path (default: ~/.herald/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Database path override
    #[arg(long)]
    database: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "herald=debug,herald_scheduler=debug,herald_store=debug,herald_telegram=debug"
    } else {
        "herald=info,herald_scheduler=info,herald_store=info,herald_telegram=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config = match &cli.config {
        Some(path) => HeraldConfig::load_from(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => HeraldConfig::load().context("loading config")?,
    };
    if config.bot_token.is_empty() {
        anyhow::bail!("No bot token. Set bot_token in the config or HERALD_BOT_TOKEN in the env.");
    }
    if config.admin_ids.is_empty() {
        tracing::warn!("Operator allow-list is empty — nobody can compose broadcasts");
    }

    let db_path = cli.database.unwrap_or_else(|| config.database_path());
    let db = Database::open(&db_path).context("opening database")?;

    let api = TelegramApi::new(config.bot_token.clone());
    let transport = Arc::new(TelegramTransport::new(api.clone()));
    let dispatcher = Dispatcher::new(transport, Duration::from_millis(config.send_delay_ms));
    let (scheduler, fires) = BroadcastScheduler::new();
    let controller = Arc::new(BroadcastController::new(
        db.jobs(),
        db.subscribers(),
        dispatcher,
        scheduler,
    ));

    // Rebuild timers for everything still pending; run anything that came
    // due while we were down.
    let report = controller
        .recover()
        .await
        .context("recovering pending jobs")?;
    tracing::info!(
        "Startup recovery: {} re-armed, {} executed",
        report.rearmed,
        report.executed
    );

    tokio::spawn(spawn_controller(controller.clone(), fires));

    let bot = Bot::new(api, controller, config);
    bot.run().await.context("bot polling loop")?;
    Ok(())
}
