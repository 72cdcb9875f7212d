//! Voice assistant replies from a local chat model.
//!
//! [`OllamaAssistant`] speaks the Ollama `/api/chat` protocol with streaming
//! off. The conversation is shared by every caller: a fixed system prompt
//! followed by the most recent `max_history` user/assistant messages. A turn
//! is recorded only once the model has answered, so a failed request leaves
//! the history as it was.

use async_trait::async_trait;
use domo_settings::ChatSettings;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::errors::{AssistantError, Result};
use crate::{check_status, decode_json, http_client, trim_base};

const SERVICE: &str = "chat";

const SYSTEM_RULES: &str = "\
You are the voice assistant of the mobile application described below.
Your answers are read aloud, so:
1. Never use markdown, bullet points, asterisks, or hashtags.
2. Only answer questions about the application. Politely decline anything else.
3. Speak naturally, in short fluent sentences.

Application information:
";

/// One message in the conversation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// `system`, `user`, or `assistant`.
    pub role: String,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
        }
    }
}

/// Produces a spoken-style reply to a user utterance.
#[async_trait]
pub trait ChatAssistant: Send + Sync {
    /// Reply to `prompt`, continuing the shared conversation.
    async fn reply(&self, prompt: &str) -> Result<String>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f64,
    top_p: f64,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: Option<ChatMessage>,
}

/// [`ChatAssistant`] backed by an Ollama-compatible server.
pub struct OllamaAssistant {
    client: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f64,
    top_p: f64,
    max_history: usize,
    system: ChatMessage,
    history: Mutex<Vec<ChatMessage>>,
}

impl OllamaAssistant {
    /// Build a client from chat settings.
    pub fn new(settings: &ChatSettings) -> Result<Self> {
        Ok(Self {
            client: http_client(settings.timeout_ms)?,
            base_url: trim_base(&settings.base_url),
            model: settings.model.clone(),
            temperature: settings.temperature,
            top_p: settings.top_p,
            max_history: settings.max_history,
            system: ChatMessage::new("system", format!("{SYSTEM_RULES}{}", settings.app_context)),
            history: Mutex::new(Vec::new()),
        })
    }

    /// Current conversation without the system prompt.
    pub fn history(&self) -> Vec<ChatMessage> {
        self.history.lock().clone()
    }

    fn record_turn(&self, user: ChatMessage, assistant: ChatMessage) {
        let mut history = self.history.lock();
        history.push(user);
        history.push(assistant);
        let excess = history.len().saturating_sub(self.max_history);
        drop(history.drain(..excess));
    }
}

#[async_trait]
impl ChatAssistant for OllamaAssistant {
    #[instrument(skip_all, fields(model = %self.model))]
    async fn reply(&self, prompt: &str) -> Result<String> {
        let user = ChatMessage::new("user", prompt);

        let mut messages = Vec::with_capacity(self.max_history + 2);
        messages.push(self.system.clone());
        messages.extend(self.history.lock().iter().cloned());
        messages.push(user.clone());

        let request = ChatRequest {
            model: &self.model,
            messages,
            stream: false,
            options: ChatOptions {
                temperature: self.temperature,
                top_p: self.top_p,
            },
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await?;
        let body: ChatResponse = decode_json(SERVICE, check_status(SERVICE, response).await?).await?;

        let content = body
            .message
            .map(|m| m.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(AssistantError::EmptyReply)?;

        debug!(chars = content.len(), "chat reply received");
        self.record_turn(user, ChatMessage::new("assistant", content.clone()));
        Ok(content)
    }
}
