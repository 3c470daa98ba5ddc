//! In-crate fakes for the relay's collaborators.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::extract::TextExtractor;
use crate::llm::TextGenerator;
use crate::memory::{FeedbackStore, UserStore};
use crate::platform::{ChatTransport, RawMessage};

pub fn text_message(text: Option<&str>) -> RawMessage {
    RawMessage {
        chat_id: 100,
        sender_id: 7,
        sender_name: "ann".to_string(),
        text: text.map(String::from),
        document: None,
    }
}

/// Store that records calls and can be made to fail every write
#[derive(Default)]
pub struct FakeStore {
    fail: bool,
    writes: Mutex<usize>,
    visits: Mutex<HashMap<u64, u64>>,
    feedback: Mutex<Vec<(u64, String, String)>>,
}

impl FakeStore {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Number of write attempts, failed ones included
    pub fn write_count(&self) -> usize {
        *self.writes.lock().unwrap()
    }

    pub fn visits(&self, sender_id: u64) -> u64 {
        self.visits
            .lock()
            .unwrap()
            .get(&sender_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn feedback(&self) -> Vec<(u64, String, String)> {
        self.feedback.lock().unwrap().clone()
    }
}

#[async_trait]
impl UserStore for FakeStore {
    async fn record_visit(&self, sender_id: u64, _sender_name: &str) -> Result<()> {
        *self.writes.lock().unwrap() += 1;
        if self.fail {
            anyhow::bail!("database is locked");
        }
        *self.visits.lock().unwrap().entry(sender_id).or_default() += 1;
        Ok(())
    }
}

#[async_trait]
impl FeedbackStore for FakeStore {
    async fn save_feedback(
        &self,
        sender_id: u64,
        sender_name: &str,
        message: &str,
    ) -> Result<i64> {
        *self.writes.lock().unwrap() += 1;
        if self.fail {
            anyhow::bail!("database is locked");
        }
        let mut feedback = self.feedback.lock().unwrap();
        feedback.push((sender_id, sender_name.to_string(), message.to_string()));
        Ok(feedback.len() as i64)
    }
}

/// Generator that returns a fixed reply and records every prompt
pub struct ScriptedGenerator {
    reply: String,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> String {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.reply.clone()
    }
}

pub struct FakeExtractor {
    text: Option<String>,
    delay: Option<Duration>,
}

impl FakeExtractor {
    pub fn ok(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            delay: None,
        }
    }

    pub fn failing() -> Self {
        Self {
            text: None,
            delay: None,
        }
    }

    /// Blocks the calling thread for `delay` before answering
    pub fn slow(text: &str, delay: Duration) -> Self {
        Self {
            text: Some(text.to_string()),
            delay: Some(delay),
        }
    }
}

impl TextExtractor for FakeExtractor {
    fn extract(&self, _bytes: &[u8]) -> Result<String> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        match &self.text {
            Some(text) => Ok(text.clone()),
            None => anyhow::bail!("unreadable document"),
        }
    }
}

/// Transport that records outbound traffic instead of talking to a platform
#[derive(Default)]
pub struct RecordingTransport {
    fail_sends: bool,
    files: HashMap<String, Vec<u8>>,
    webhook_result: bool,
    sent: Mutex<Vec<(i64, String)>>,
    typing: Mutex<usize>,
    downloads: Mutex<Vec<String>>,
    webhooks: Mutex<Vec<String>>,
}

impl RecordingTransport {
    pub fn with_file(file_id: &str, bytes: &[u8]) -> Self {
        let mut transport = Self::default();
        transport.files.insert(file_id.to_string(), bytes.to_vec());
        transport
    }

    pub fn failing_sends() -> Self {
        Self {
            fail_sends: true,
            ..Self::default()
        }
    }

    pub fn accepting_webhooks() -> Self {
        Self {
            webhook_result: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<(i64, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn typing_count(&self) -> usize {
        *self.typing.lock().unwrap()
    }

    pub fn downloads(&self) -> Vec<String> {
        self.downloads.lock().unwrap().clone()
    }

    pub fn webhooks(&self) -> Vec<String> {
        self.webhooks.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<()> {
        if self.fail_sends {
            anyhow::bail!("chat not found");
        }
        self.sent.lock().unwrap().push((chat_id, text.to_string()));
        Ok(())
    }

    async fn send_typing(&self, _chat_id: i64) -> Result<()> {
        *self.typing.lock().unwrap() += 1;
        Ok(())
    }

    async fn download(&self, file_id: &str) -> Result<Vec<u8>> {
        self.downloads.lock().unwrap().push(file_id.to_string());
        match self.files.get(file_id) {
            Some(bytes) => Ok(bytes.clone()),
            None => anyhow::bail!("file {} not found", file_id),
        }
    }

    async fn register_webhook(&self, url: &str) -> Result<bool> {
        self.webhooks.lock().unwrap().push(url.to_string());
        Ok(self.webhook_result)
    }
}
