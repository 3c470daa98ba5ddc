use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, error, info, warn};

use crate::extract::{truncate_chars, TextExtractor, MAX_EXTRACTED_CHARS};
use crate::llm::{TextGenerator, NO_CANDIDATE_REPLY};
use crate::memory::{FeedbackStore, UserStore};
use crate::platform::{
    classify, split_message, Attachment, ChatTransport, Command, EventKind, InboundEvent,
    RawMessage, MAX_REPLY_CHUNK,
};

pub const WELCOME_REPLY: &str = "Hi! The bot is up and running 🚀\n\n\
     Send me a question or a document (PDF or text) and I'll answer.\n\
     /feedback <message> - Tell us what you think";
pub const FEEDBACK_USAGE_REPLY: &str = "Usage: /feedback <your message>";
pub const FEEDBACK_THANKS_REPLY: &str = "Thank you for your feedback!";
pub const DOCUMENT_ERROR_REPLY: &str = "Sorry, I couldn't read that document.";
pub const DOCUMENT_PROMPT_PREFIX: &str = "Analyze this document: ";

/// Upper bound on text extraction for a single document
pub const DEFAULT_EXTRACTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Routes classified events to their handlers and guarantees one reply per event.
/// Holds no per-event state; safe to share across concurrent transports.
pub struct Relay {
    users: Arc<dyn UserStore>,
    feedback: Arc<dyn FeedbackStore>,
    generator: Arc<dyn TextGenerator>,
    extractor: Arc<dyn TextExtractor>,
    extraction_timeout: Duration,
    bot_username: Option<String>,
}

impl Relay {
    pub fn new(
        users: Arc<dyn UserStore>,
        feedback: Arc<dyn FeedbackStore>,
        generator: Arc<dyn TextGenerator>,
        extractor: Arc<dyn TextExtractor>,
    ) -> Self {
        Self {
            users,
            feedback,
            generator,
            extractor,
            extraction_timeout: DEFAULT_EXTRACTION_TIMEOUT,
            bot_username: None,
        }
    }

    pub fn with_extraction_timeout(mut self, timeout: Duration) -> Self {
        self.extraction_timeout = timeout;
        self
    }

    /// Commands addressed as `/cmd@other_bot` are ignored once this is set
    pub fn with_bot_username(mut self, username: impl Into<String>) -> Self {
        self.bot_username = Some(username.into());
        self
    }

    /// Resolve attachments, classify, handle and send the reply.
    /// Only a failure to deliver the reply is returned.
    pub async fn ingest(&self, mut raw: RawMessage, transport: &dyn ChatTransport) -> Result<()> {
        if let Some(document) = raw.document.as_mut() {
            if document.bytes.is_empty() {
                match transport.download(&document.file_id).await {
                    Ok(bytes) => document.bytes = bytes,
                    Err(e) => warn!("Failed to download file {}: {:#}", document.file_id, e),
                }
            }
        }

        let Some(event) = classify(raw, self.bot_username.as_deref()) else {
            debug!("Ignoring unclassifiable message");
            return Ok(());
        };

        let chat_id = event.chat_id;
        if matches!(event.kind, EventKind::Text(_) | EventKind::Document(_)) {
            transport.send_typing(chat_id).await.ok();
        }

        let mut reply = self.handle(event).await;
        if reply.trim().is_empty() {
            warn!("Handler produced an empty reply for chat {}", chat_id);
            reply = NO_CANDIDATE_REPLY.to_string();
        }
        for chunk in split_message(&reply, MAX_REPLY_CHUNK) {
            transport.send_text(chat_id, &chunk).await?;
        }

        Ok(())
    }

    /// Produce the reply for one event. Never fails.
    pub async fn handle(&self, event: InboundEvent) -> String {
        info!(
            "Event from {} ({}) in chat {}: {}",
            event.sender_name,
            event.sender_id,
            event.chat_id,
            describe(&event.kind)
        );

        match event.kind {
            EventKind::Command {
                command: Command::Start,
                ..
            } => WELCOME_REPLY.to_string(),
            EventKind::Command {
                command: Command::Feedback,
                argument,
            } => {
                self.handle_feedback(event.sender_id, &event.sender_name, &argument)
                    .await
            }
            EventKind::Document(attachment) => {
                self.handle_document(event.sender_id, &event.sender_name, attachment)
                    .await
            }
            EventKind::Text(text) => {
                self.handle_chat(event.sender_id, &event.sender_name, &text)
                    .await
            }
        }
    }

    async fn handle_feedback(&self, sender_id: u64, sender_name: &str, argument: &str) -> String {
        let message = argument.trim();
        if message.is_empty() {
            return FEEDBACK_USAGE_REPLY.to_string();
        }

        match self
            .feedback
            .save_feedback(sender_id, sender_name, message)
            .await
        {
            Ok(id) => info!("Saved feedback #{} from {}", id, sender_id),
            Err(e) => error!("Failed to save feedback from {}: {:#}", sender_id, e),
        }

        FEEDBACK_THANKS_REPLY.to_string()
    }

    async fn handle_document(
        &self,
        sender_id: u64,
        sender_name: &str,
        attachment: Attachment,
    ) -> String {
        self.record_visit(sender_id, sender_name).await;

        let extractor = Arc::clone(&self.extractor);
        let bytes = attachment.bytes;
        let task = tokio::task::spawn_blocking(move || extractor.extract(&bytes));
        let extracted = match tokio::time::timeout(self.extraction_timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(anyhow::anyhow!("Extraction task failed: {}", e)),
            Err(_) => Err(anyhow::anyhow!(
                "Extraction timed out after {:?}",
                self.extraction_timeout
            )),
        };

        let text = match extracted {
            Ok(text) => text,
            Err(e) => {
                warn!(
                    "Failed to extract text from {}: {:#}",
                    attachment.file_name.as_deref().unwrap_or(&attachment.file_id),
                    e
                );
                return DOCUMENT_ERROR_REPLY.to_string();
            }
        };

        let prompt = format!(
            "{}{}",
            DOCUMENT_PROMPT_PREFIX,
            truncate_chars(&text, MAX_EXTRACTED_CHARS)
        );
        self.generator.generate(&prompt).await
    }

    async fn handle_chat(&self, sender_id: u64, sender_name: &str, text: &str) -> String {
        self.record_visit(sender_id, sender_name).await;
        self.generator.generate(text).await
    }

    async fn record_visit(&self, sender_id: u64, sender_name: &str) {
        if let Err(e) = self.users.record_visit(sender_id, sender_name).await {
            error!("Failed to record visit for {}: {:#}", sender_id, e);
        }
    }
}

fn describe(kind: &EventKind) -> String {
    match kind {
        EventKind::Command { command, .. } => format!("command {:?}", command),
        EventKind::Document(a) => format!(
            "document {} ({} bytes)",
            a.file_name.as_deref().unwrap_or(&a.file_id),
            a.bytes.len()
        ),
        EventKind::Text(t) => format!("text ({} chars)", t.chars().count()),
    }
}
