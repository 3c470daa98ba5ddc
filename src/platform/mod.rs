pub mod dedup;
pub mod telegram;
pub mod webhook;

use anyhow::Result;
use async_trait::async_trait;

/// Telegram rejects messages above 4096 chars; stay below it
pub const MAX_REPLY_CHUNK: usize = 4000;

/// A message as the transport received it, before classification
#[derive(Debug, Clone, Default)]
pub struct RawMessage {
    pub chat_id: i64,
    pub sender_id: u64,
    pub sender_name: String,
    pub text: Option<String>,
    pub document: Option<Attachment>,
}

/// A file attached to a message. `bytes` is filled in by the transport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attachment {
    pub file_id: String,
    pub file_name: Option<String>,
    pub bytes: Vec<u8>,
}

/// Commands the relay understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Feedback,
}

impl Command {
    fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "start" => Some(Command::Start),
            "feedback" => Some(Command::Feedback),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Command { command: Command, argument: String },
    Document(Attachment),
    Text(String),
}

/// One classified inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub chat_id: i64,
    pub sender_id: u64,
    pub sender_name: String,
    pub kind: EventKind,
}

/// Assign a raw message to a handling route.
/// Returns `None` for noise: no text, no attachment, an unknown command, or a
/// command addressed to a bot other than `bot_username`.
pub fn classify(raw: RawMessage, bot_username: Option<&str>) -> Option<InboundEvent> {
    let kind = if let Some(document) = raw.document {
        EventKind::Document(document)
    } else {
        let text = raw.text.filter(|t| !t.trim().is_empty())?;
        match parse_command(&text, bot_username) {
            Some(Ok((command, argument))) => EventKind::Command { command, argument },
            Some(Err(())) => return None,
            None => EventKind::Text(text),
        }
    };

    Some(InboundEvent {
        chat_id: raw.chat_id,
        sender_id: raw.sender_id,
        sender_name: raw.sender_name,
        kind,
    })
}

/// `None` if the text is not a command, `Some(Err(()))` if it is not one of ours.
fn parse_command(
    text: &str,
    bot_username: Option<&str>,
) -> Option<std::result::Result<(Command, String), ()>> {
    let body = text.trim_start().strip_prefix('/')?;
    let (head, rest) = match body.find(char::is_whitespace) {
        Some(idx) => (&body[..idx], &body[idx..]),
        None => (body, ""),
    };
    // "/start@my_bot" addresses a specific bot in group chats
    let (name, target) = match head.split_once('@') {
        Some((name, target)) => (name, Some(target)),
        None => (head, None),
    };
    if let (Some(target), Some(own)) = (target, bot_username) {
        if !target.eq_ignore_ascii_case(own.trim_start_matches('@')) {
            return Some(Err(()));
        }
    }

    Some(
        Command::from_name(name)
            .map(|command| (command, rest.to_string()))
            .ok_or(()),
    )
}

/// Outbound side of a chat platform
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<()>;

    /// Show a "typing" indicator while a reply is generated
    async fn send_typing(&self, _chat_id: i64) -> Result<()> {
        Ok(())
    }

    /// Fetch the contents of a file attached to a message
    async fn download(&self, file_id: &str) -> Result<Vec<u8>>;

    /// Ask the platform to push updates to `url`
    async fn register_webhook(&self, url: &str) -> Result<bool>;
}

/// Split long messages for Telegram's 4096 char limit
pub fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < text.len() {
        let mut end = (start + max_len).min(text.len());
        // Walk back to a valid UTF-8 char boundary so slicing doesn't panic
        while end > start && !text.is_char_boundary(end) {
            end -= 1;
        }
        let actual_end = if end < text.len() {
            text[start..end]
                .rfind('\n')
                .or_else(|| text[start..end].rfind(' '))
                .map(|pos| start + pos + 1)
                .unwrap_or(end)
        } else {
            end
        };

        chunks.push(text[start..actual_end].to_string());
        start = actual_end;
    }

    chunks
}
