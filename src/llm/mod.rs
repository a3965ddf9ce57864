//! LLM provider integration: non-streaming generation with retries,
//! streaming chat deltas, and embedding generation, for Ollama or
//! OpenAI-compatible APIs.

pub mod chat_stream;
pub mod client;
pub mod embeddings;

use serde::{Deserialize, Serialize};

use crate::models::ChatMessage;

/// Role/content pair in the shape both provider chat APIs accept.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct WireMessage {
    pub role: String,
    pub content: String,
}

impl From<ChatMessage> for WireMessage {
    fn from(m: ChatMessage) -> Self {
        Self {
            role: m.role,
            content: m.content,
        }
    }
}

pub(crate) fn to_wire(messages: Vec<ChatMessage>) -> Vec<WireMessage> {
    messages.into_iter().map(WireMessage::from).collect()
}

pub(crate) fn user_message(content: &str) -> Vec<WireMessage> {
    vec![WireMessage {
        role: "user".to_string(),
        content: content.to_string(),
    }]
}
