//! In-memory conversation state for one UI surface.

use bluebox_types::chat::{ChatMessage, SessionId};
use bluebox_types::error::EngineError;
use bluebox_types::generation::HistoryEntry;

/// The assistant reply currently being received.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamingTurn {
    text: String,
    complete: bool,
}

impl StreamingTurn {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }
}

/// Active session ID, committed messages, and at most one streaming turn.
///
/// Single writer: only the owning `SessionEngine` mutates it.
#[derive(Debug, Default)]
pub struct SessionStore {
    session_id: Option<SessionId>,
    messages: Vec<ChatMessage>,
    streaming: Option<StreamingTurn>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace everything, dropping any in-flight streaming turn.
    pub fn reset(&mut self, session_id: Option<SessionId>, messages: Vec<ChatMessage>) {
        self.session_id = session_id;
        self.messages = messages;
        self.streaming = None;
    }

    /// Attach the ID of a session that was just created for this conversation.
    pub fn bind_session(&mut self, session_id: SessionId) -> Result<(), EngineError> {
        if let Some(existing) = &self.session_id {
            return Err(EngineError::InvalidState(format!(
                "store already bound to session {existing}"
            )));
        }
        self.session_id = Some(session_id);
        Ok(())
    }

    pub fn append_committed(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn begin_streaming(&mut self) -> Result<(), EngineError> {
        if self.streaming.is_some() {
            return Err(EngineError::InvalidState(
                "a streaming turn is already active".to_string(),
            ));
        }
        self.streaming = Some(StreamingTurn::default());
        Ok(())
    }

    /// Append a decoded fragment and return the accumulated text.
    pub fn append_fragment(&mut self, fragment: &str) -> Result<&str, EngineError> {
        let turn = self
            .streaming
            .as_mut()
            .ok_or_else(|| EngineError::InvalidState("no streaming turn to append to".into()))?;
        turn.text.push_str(fragment);
        Ok(&turn.text)
    }

    /// Close the streaming turn and hand back its final text.
    pub fn end_streaming(&mut self) -> Result<String, EngineError> {
        let mut turn = self
            .streaming
            .take()
            .ok_or_else(|| EngineError::InvalidState("no streaming turn to end".into()))?;
        turn.complete = true;
        Ok(turn.text)
    }

    /// Drop the streaming turn without committing it.
    pub fn discard_streaming(&mut self) -> Option<StreamingTurn> {
        self.streaming.take()
    }

    /// Committed messages in wire form, oldest first.
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.messages.iter().map(HistoryEntry::from).collect()
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn streaming(&self) -> Option<&StreamingTurn> {
        self.streaming.as_ref()
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bluebox_types::generation::HistoryRole;

    #[test]
    fn streaming_lifecycle_accumulates_and_clears() {
        let mut store = SessionStore::new();
        store.begin_streaming().unwrap();
        assert_eq!(store.append_fragment("Base").unwrap(), "Base");
        assert_eq!(store.append_fragment("d on").unwrap(), "Based on");

        assert_eq!(store.end_streaming().unwrap(), "Based on");
        assert!(!store.is_streaming());
        assert!(store.messages().is_empty());
    }

    #[test]
    fn second_begin_is_invalid_state() {
        let mut store = SessionStore::new();
        store.begin_streaming().unwrap();
        assert!(matches!(
            store.begin_streaming(),
            Err(EngineError::InvalidState(_))
        ));
    }

    #[test]
    fn fragment_without_turn_is_invalid_state() {
        let mut store = SessionStore::new();
        assert!(store.append_fragment("x").is_err());
        assert!(store.end_streaming().is_err());
    }

    #[test]
    fn reset_discards_streaming_turn() {
        let mut store = SessionStore::new();
        store.append_committed(ChatMessage::user("hello"));
        store.begin_streaming().unwrap();
        store.append_fragment("partial").unwrap();

        let loaded = vec![ChatMessage::user("older"), ChatMessage::assistant("reply")];
        store.reset(Some(SessionId::new("s-2")), loaded.clone());

        assert_eq!(store.session_id(), Some(&SessionId::new("s-2")));
        assert_eq!(store.messages(), loaded.as_slice());
        assert!(store.streaming().is_none());
    }

    #[test]
    fn bind_session_only_once() {
        let mut store = SessionStore::new();
        store.bind_session(SessionId::new("a")).unwrap();
        assert!(store.bind_session(SessionId::new("b")).is_err());
        assert_eq!(store.session_id(), Some(&SessionId::new("a")));
    }

    #[test]
    fn history_mirrors_committed_messages() {
        let mut store = SessionStore::new();
        store.append_committed(ChatMessage::user("q"));
        store.append_committed(ChatMessage::assistant("a"));
        store.begin_streaming().unwrap();
        store.append_fragment("not yet").unwrap();

        let history = store.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, HistoryRole::User);
        assert_eq!(history[1].content, "a");
    }

    #[test]
    fn discard_returns_partial_turn() {
        let mut store = SessionStore::new();
        store.begin_streaming().unwrap();
        store.append_fragment("half").unwrap();
        let turn = store.discard_streaming().unwrap();
        assert_eq!(turn.text(), "half");
        assert!(!turn.is_complete());
    }
}
