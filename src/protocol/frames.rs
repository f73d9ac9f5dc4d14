use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Inbound chat frame. A missing or empty `text` is dropped without a reply.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatInbound {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessagePayload {
    pub id: String,
    pub text: String,
    pub sender: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatBroadcast {
    #[serde(rename = "type")]
    pub frame_type: &'static str,
    pub message: ChatMessagePayload,
}

impl ChatBroadcast {
    #[must_use]
    pub fn new(message: ChatMessagePayload) -> Self {
        Self {
            frame_type: "chat.message",
            message,
        }
    }
}

/// Inbound document co-edit frame. Content is opaque to the hub.
#[derive(Debug, Clone, Deserialize)]
pub struct DocInbound {
    #[serde(default)]
    pub content: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocBroadcast {
    #[serde(rename = "type")]
    pub frame_type: &'static str,
    pub content: Value,
    pub sender: String,
}

impl DocBroadcast {
    #[must_use]
    pub fn new(content: Value, sender: String) -> Self {
        Self {
            frame_type: "doc.update",
            content,
            sender,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TerminalInbound {
    Input {
        #[serde(default)]
        data: String,
    },
    Resize {
        #[serde(default)]
        cols: u16,
        #[serde(default)]
        rows: u16,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TerminalOutbound {
    Output { data: String },
    Error { message: String },
}
