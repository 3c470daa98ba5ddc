//! Push mode: the platform POSTs each update to `/{bot_token}`.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Router,
};
use teloxide::types::{Update, UpdateKind};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::platform::{dedup::UpdateDedup, telegram::raw_from_message, ChatTransport};
use crate::relay::Relay;

pub const HEALTH_REPLY: &str = "Bot is running!";

#[derive(Clone)]
pub struct WebhookState {
    pub relay: Arc<Relay>,
    pub transport: Arc<dyn ChatTransport>,
    pub bot_token: String,
    /// Full callback URL, `None` when no public URL is configured
    pub webhook_url: Option<String>,
    /// Update ids already handled, so redelivered updates are acknowledged silently
    pub dedup: Arc<Mutex<UpdateDedup>>,
}

impl WebhookState {
    pub fn new(
        relay: Arc<Relay>,
        transport: Arc<dyn ChatTransport>,
        bot_token: String,
        webhook_url: Option<String>,
    ) -> Self {
        Self {
            relay,
            transport,
            bot_token,
            webhook_url,
            dedup: Arc::new(Mutex::new(UpdateDedup::default())),
        }
    }
}

pub fn router(state: WebhookState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/set_webhook", get(set_webhook))
        .route("/{token}", post(receive_update))
        .with_state(state)
}

/// Serve push mode until the process is stopped
pub async fn serve(state: WebhookState, bind_address: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;

    info!("Webhook server listening on {}", bind_address);
    axum::serve(listener, router(state))
        .await
        .context("Webhook server failed")?;
    Ok(())
}

async fn health() -> &'static str {
    HEALTH_REPLY
}

async fn set_webhook(State(state): State<WebhookState>) -> String {
    let success = match &state.webhook_url {
        Some(url) => match state.transport.register_webhook(url).await {
            Ok(ok) => {
                info!("Webhook registration returned {}", ok);
                ok
            }
            Err(e) => {
                error!("Webhook registration failed: {:#}", e);
                false
            }
        },
        None => {
            warn!("Cannot register webhook: no public URL configured");
            false
        }
    };
    format!("Webhook set: {}", success)
}

async fn receive_update(
    State(state): State<WebhookState>,
    Path(token): Path<String>,
    body: Bytes,
) -> (StatusCode, &'static str) {
    if token != state.bot_token {
        warn!("Rejected update posted to an unknown path");
        return (StatusCode::NOT_FOUND, "Not Found");
    }

    let update: Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            warn!("Failed to parse update: {}", e);
            return (StatusCode::BAD_REQUEST, "Bad Request");
        }
    };

    if state.dedup.lock().await.is_duplicate(update.id.0) {
        debug!("Ignoring redelivered update {:?}", update.id);
        return (StatusCode::OK, "OK");
    }

    let UpdateKind::Message(msg) = update.kind else {
        debug!("Ignoring non-message update {:?}", update.id);
        return (StatusCode::OK, "OK");
    };

    if let Some(raw) = raw_from_message(&msg) {
        if let Err(e) = state.relay.ingest(raw, state.transport.as_ref()).await {
            error!("Failed to deliver reply: {:#}", e);
        }
    }

    (StatusCode::OK, "OK")
}
