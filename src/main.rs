mod config;
mod extract;
mod llm;
mod memory;
mod platform;
mod relay;
#[cfg(test)]
mod testing;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use teloxide::requests::Requester;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Config, TransportMode};
use crate::extract::{DocumentExtractor, MAX_EXTRACTED_CHARS};
use crate::llm::GeminiClient;
use crate::memory::MemoryStore;
use crate::platform::telegram::{self, TelegramTransport};
use crate::platform::webhook::{self, WebhookState};
use crate::relay::Relay;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,chatrelay=debug".into()),
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
    info!("  Transport: {}", config.transport);
    info!("  Model: {}", config.llm.model);
    info!("  Database: {}", config.memory.database_path.display());

    let store = MemoryStore::open(&config.memory.database_path)?;
    let generator = GeminiClient::new(config.llm.clone())?;

    let bot = teloxide::Bot::new(&config.telegram.bot_token);

    let mut relay = Relay::new(
        Arc::new(store.clone()),
        Arc::new(store),
        Arc::new(generator),
        Arc::new(DocumentExtractor::new(MAX_EXTRACTED_CHARS)),
    )
    .with_extraction_timeout(Duration::from_secs(config.extract.timeout_secs));
    match bot.get_me().await {
        Ok(me) => match me.user.username.clone() {
            Some(username) => {
                info!("  Bot username: @{}", username);
                relay = relay.with_bot_username(username);
            }
            None => warn!("Bot account has no username"),
        },
        Err(e) => warn!("Failed to fetch bot identity: {}", e),
    }
    let relay = Arc::new(relay);

    info!("Bot is starting...");
    match config.transport {
        TransportMode::Polling => telegram::run_polling(relay, bot).await?,
        TransportMode::Webhook => {
            let state = WebhookState::new(
                relay,
                Arc::new(TelegramTransport::new(bot)),
                config.telegram.bot_token.clone(),
                config.webhook_url(),
            );
            webhook::serve(state, &config.server.bind_address()).await?;
        }
    }

    Ok(())
}
