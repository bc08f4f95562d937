//! Wire types for the generation endpoint.
//!
//! The request body is `{ "message": ..., "history": [{ "role", "content" }] }`.
//! The response is a raw UTF-8 text stream with no framing.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::chat::{ChatMessage, MessageRole};

/// Role of a history entry on the wire. `System` is accepted by the
/// endpoint but never produced from a committed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryRole {
    System,
    User,
    Assistant,
}

impl fmt::Display for HistoryRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistoryRole::System => write!(f, "system"),
            HistoryRole::User => write!(f, "user"),
            HistoryRole::Assistant => write!(f, "assistant"),
        }
    }
}

impl From<MessageRole> for HistoryRole {
    fn from(role: MessageRole) -> Self {
        match role {
            MessageRole::User => HistoryRole::User,
            MessageRole::Assistant => HistoryRole::Assistant,
        }
    }
}

/// One prior turn sent alongside a new message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: HistoryRole,
    pub content: String,
}

impl From<&ChatMessage> for HistoryEntry {
    fn from(message: &ChatMessage) -> Self {
        Self {
            role: message.role.into(),
            content: message.text.clone(),
        }
    }
}

/// Body of a generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub message: String,
    pub history: Vec<HistoryEntry>,
}
