mod bot;
mod config;
mod export;
mod keyboards;
mod lead;
mod ocr;
mod parser;
mod storage;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::bot::AppState;
use crate::config::Config;
use crate::storage::LeadStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,leadscan=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!("Configuration loaded successfully");
    info!("  Database: {}", config.database.path.display());
    info!("  OCR: {} ({})", config.ocr.command, config.ocr.languages);
    info!("  Admins: {:?}", config.telegram.admin_ids);
    match &config.export {
        Some(export) => info!("  CSV export: {}", export.master_csv.display()),
        None => info!("  CSV export: disabled"),
    }

    let store = LeadStore::open(&config.database.path)?;

    // Create shared state
    let state = Arc::new(AppState::new(config, store)?);

    // Run the Telegram bot
    info!("Bot is starting...");
    bot::run(state).await?;

    Ok(())
}
