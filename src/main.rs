use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::bot::LichessBot;
use crate::config::{BotConfig, Cli};

mod api;
mod board;
mod bot;
mod color;
mod config;
mod engine;
mod game;
mod ledger;
mod types;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = BotConfig::load(&cli.config)?;
    let mut bot = LichessBot::new(config).await?;

    let result = tokio::select! {
        result = bot.run() => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupt received, shutting down");
            Ok(())
        }
    };
    bot.shutdown().await;
    result
}
