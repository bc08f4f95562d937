//! Engine state and notification types.
//!
//! `SessionEvent` is broadcast by the session engine to every UI surface
//! and to the session list controller. All variants are Clone + Send + Sync
//! for use with tokio broadcast channels.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::chat::SessionId;

/// Lifecycle state of a session engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Idle,
    AwaitingSessionCreation,
    StreamingResponse,
    Faulted,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineState::Idle => write!(f, "idle"),
            EngineState::AwaitingSessionCreation => write!(f, "awaiting_session_creation"),
            EngineState::StreamingResponse => write!(f, "streaming_response"),
            EngineState::Faulted => write!(f, "faulted"),
        }
    }
}

impl Default for EngineState {
    fn default() -> Self {
        EngineState::Idle
    }
}

/// Persistence operation named in a [`SessionEvent::PersistenceFailed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistenceOp {
    CreateSession,
    AppendMessage,
}

impl fmt::Display for PersistenceOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistenceOp::CreateSession => write!(f, "create_session"),
            PersistenceOp::AppendMessage => write!(f, "append_message"),
        }
    }
}

/// Notifications published by the session engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A session was created or a message was persisted; session lists
    /// should be re-read.
    SessionListChanged,

    /// The in-flight reply grew. Carries the full accumulated text.
    ProgressiveText { text: String },

    /// The engine moved to a new state.
    StateChanged { state: EngineState },

    /// The generation request or stream failed. The partial reply was
    /// discarded.
    SendFailed { error: String },

    /// A best-effort write did not reach the store. The in-memory
    /// conversation is unaffected.
    PersistenceFailed { operation: PersistenceOp, error: String },

    /// The store was replaced with another session (or emptied for a new
    /// one when `session_id` is `None`).
    SessionLoaded { session_id: Option<SessionId> },
}
