use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, FileId};
use tracing::{error, info, warn};

use crate::platform::{Attachment, ChatTransport, RawMessage};
use crate::relay::Relay;

/// Telegram Bot API transport backed by teloxide
#[derive(Clone)]
pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<()> {
        self.bot
            .send_message(ChatId(chat_id), text)
            .await
            .with_context(|| format!("Failed to send message to chat {}", chat_id))?;
        Ok(())
    }

    async fn send_typing(&self, chat_id: i64) -> Result<()> {
        self.bot
            .send_chat_action(ChatId(chat_id), ChatAction::Typing)
            .await
            .context("Failed to send typing indicator")?;
        Ok(())
    }

    async fn download(&self, file_id: &str) -> Result<Vec<u8>> {
        let file = self
            .bot
            .get_file(FileId(file_id.to_string()))
            .await
            .with_context(|| format!("Failed to look up file {}", file_id))?;

        let mut bytes = Vec::new();
        self.bot
            .download_file(&file.path, &mut bytes)
            .await
            .with_context(|| format!("Failed to download file {}", file.path))?;
        Ok(bytes)
    }

    async fn register_webhook(&self, url: &str) -> Result<bool> {
        let url = reqwest::Url::parse(url).with_context(|| format!("Invalid webhook URL: {}", url))?;
        self.bot
            .set_webhook(url)
            .await
            .context("Failed to register webhook")?;
        Ok(true)
    }
}

/// Normalize a Telegram message. Messages without a sender are skipped.
pub fn raw_from_message(msg: &Message) -> Option<RawMessage> {
    let user = msg.from.as_ref()?;

    let sender_name = user
        .username
        .clone()
        .unwrap_or_else(|| user.first_name.clone());

    let document = msg.document().map(|doc| Attachment {
        file_id: doc.file.id.to_string(),
        file_name: doc.file_name.clone(),
        bytes: Vec::new(),
    });

    Some(RawMessage {
        chat_id: msg.chat.id.0,
        sender_id: user.id.0,
        sender_name,
        text: msg.text().map(str::to_string),
        document,
    })
}

/// Run the relay in poll mode: long polling, one update at a time
pub async fn run_polling(relay: Arc<Relay>, bot: Bot) -> Result<()> {
    info!("Starting Telegram long polling...");

    // A webhook left over from a push deployment would make getUpdates fail
    if let Err(e) = bot.delete_webhook().await {
        warn!("Failed to delete webhook before polling: {}", e);
    }

    let handler = Update::filter_message().endpoint(handle_message);

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![relay])
        // Same key for every update: strictly serialized processing
        .distribution_function(|_| Some(()))
        .default_handler(|upd| async move {
            warn!("Unhandled update: {:?}", upd.id);
        })
        .error_handler(LoggingErrorHandler::with_custom_text("telegram"))
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn handle_message(bot: Bot, msg: Message, relay: Arc<Relay>) -> ResponseResult<()> {
    let Some(raw) = raw_from_message(&msg) else {
        return Ok(());
    };

    let transport = TelegramTransport::new(bot);
    if let Err(e) = relay.ingest(raw, &transport).await {
        error!("Failed to deliver reply: {:#}", e);
    }

    Ok(())
}
