//! Memory-backed persistence gateway.

use bluebox_types::chat::{
    ChatMessage, ChatSession, DEFAULT_TITLE, MessageRole, OwnerId, SessionId, derive_title,
};
use bluebox_types::error::StoreError;
use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use super::repository::PersistenceGateway;

/// `PersistenceGateway` that keeps every session in a concurrent map.
///
/// Nothing survives the process. Used by hosts without a database and as
/// the reference gateway in tests.
#[derive(Debug, Default)]
pub struct InMemoryPersistence {
    sessions: DashMap<SessionId, ChatSession>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions across all owners.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl PersistenceGateway for InMemoryPersistence {
    async fn create_session(&self, owner_id: &OwnerId) -> Result<SessionId, StoreError> {
        let now = Utc::now();
        let id = SessionId::new(Uuid::now_v7().to_string());
        self.sessions.insert(
            id.clone(),
            ChatSession {
                id: id.clone(),
                owner_id: owner_id.clone(),
                title: DEFAULT_TITLE.to_string(),
                created_at: now,
                updated_at: now,
                messages: Vec::new(),
            },
        );
        Ok(id)
    }

    async fn list_sessions(&self, owner_id: &OwnerId) -> Vec<ChatSession> {
        let mut sessions: Vec<ChatSession> = self
            .sessions
            .iter()
            .filter(|entry| &entry.owner_id == owner_id)
            .map(|entry| entry.value().clone())
            .collect();
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        sessions
    }

    async fn get_session(&self, session_id: &SessionId) -> Option<ChatSession> {
        self.sessions.get(session_id).map(|entry| entry.value().clone())
    }

    async fn append_message(
        &self,
        session_id: &SessionId,
        message: &ChatMessage,
    ) -> Result<(), StoreError> {
        let mut session = self
            .sessions
            .get_mut(session_id)
            .ok_or(StoreError::NotFound)?;

        session.messages.push(message.clone());
        session.updated_at = Utc::now().max(session.created_at);
        if message.role == MessageRole::User {
            if let Some(title) = derive_title(&message.text) {
                session.title = title;
            }
        }
        Ok(())
    }
}
