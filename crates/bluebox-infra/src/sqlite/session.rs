//! SQLite session repository.
//!
//! Implements `PersistenceGateway` from `bluebox-core` using sqlx with split
//! read/write pools: raw queries, private Row structs, writes on the single
//! writer connection.

use std::collections::{HashMap, HashSet};

use bluebox_core::session::PersistenceGateway;
use bluebox_types::chat::{
    ChatMessage, ChatSession, DEFAULT_TITLE, MessageRole, OwnerId, SessionId, derive_title,
};
use bluebox_types::error::StoreError;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::Row;
use tracing::warn;
use uuid::Uuid;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `PersistenceGateway`.
pub struct SqliteSessionRepository {
    pool: DatabasePool,
}

impl SqliteSessionRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    async fn fetch_messages(&self, session_id: &SessionId) -> Result<Vec<ChatMessage>, StoreError> {
        let rows = sqlx::query(
            "SELECT session_id, role, text, created_at FROM chat_messages WHERE session_id = ? ORDER BY seq",
        )
        .bind(session_id.as_str())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(unavailable)?;

        rows.iter()
            .map(|row| {
                MessageRow::from_row(row)
                    .map_err(|e| StoreError::Malformed(e.to_string()))?
                    .into_message()
            })
            .collect()
    }

    async fn try_get_session(&self, session_id: &SessionId) -> Result<Option<ChatSession>, StoreError> {
        let row = sqlx::query("SELECT * FROM chat_sessions WHERE id = ?")
            .bind(session_id.as_str())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(unavailable)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let session_row =
            SessionRow::from_row(&row).map_err(|e| StoreError::Malformed(e.to_string()))?;
        let messages = self.fetch_messages(session_id).await?;
        Ok(Some(session_row.into_session(messages)?))
    }

    async fn try_list_sessions(&self, owner_id: &OwnerId) -> Result<Vec<ChatSession>, StoreError> {
        let session_rows = sqlx::query(
            "SELECT * FROM chat_sessions WHERE owner_id = ? ORDER BY updated_at DESC, id DESC",
        )
        .bind(owner_id.as_str())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(unavailable)?;

        let message_rows = sqlx::query(
            r#"SELECT m.session_id, m.role, m.text, m.created_at
               FROM chat_messages m
               JOIN chat_sessions s ON s.id = m.session_id
               WHERE s.owner_id = ?
               ORDER BY m.seq"#,
        )
        .bind(owner_id.as_str())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(unavailable)?;

        let mut messages: HashMap<String, Vec<ChatMessage>> = HashMap::new();
        let mut broken: HashSet<String> = HashSet::new();
        for row in &message_rows {
            let parsed = MessageRow::from_row(row)
                .map_err(|e| StoreError::Malformed(e.to_string()))
                .and_then(|r| {
                    let session_id = r.session_id.clone();
                    r.into_message().map(|m| (session_id, m))
                });
            match parsed {
                Ok((session_id, message)) => messages.entry(session_id).or_default().push(message),
                Err(e) => {
                    if let Ok(session_id) = row.try_get::<String, _>("session_id") {
                        warn!(session_id = %session_id, error = %e, "skipping session with malformed message");
                        broken.insert(session_id);
                    }
                }
            }
        }

        let mut sessions = Vec::with_capacity(session_rows.len());
        for row in &session_rows {
            let parsed = SessionRow::from_row(row)
                .map_err(|e| StoreError::Malformed(e.to_string()))
                .and_then(|r| {
                    let own = messages.remove(&r.id).unwrap_or_default();
                    if broken.contains(&r.id) {
                        return Err(StoreError::Malformed(format!("session {}", r.id)));
                    }
                    r.into_session(own)
                });
            match parsed {
                Ok(session) => sessions.push(session),
                Err(e) => warn!(owner = %owner_id, error = %e, "skipping malformed session"),
            }
        }
        Ok(sessions)
    }
}

// ---------------------------------------------------------------------------
// Private Row types for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct SessionRow {
    id: String,
    owner_id: String,
    title: String,
    created_at: String,
    updated_at: String,
}

impl SessionRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            owner_id: row.try_get("owner_id")?,
            title: row.try_get("title")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_session(self, messages: Vec<ChatMessage>) -> Result<ChatSession, StoreError> {
        let created_at = parse_datetime(&self.created_at)?;
        let updated_at = parse_datetime(&self.updated_at)?;
        if updated_at < created_at {
            return Err(StoreError::Malformed(format!(
                "session {} updated before it was created",
                self.id
            )));
        }

        Ok(ChatSession {
            id: SessionId::new(self.id),
            owner_id: OwnerId::new(self.owner_id),
            title: self.title,
            created_at,
            updated_at,
            messages,
        })
    }
}

struct MessageRow {
    session_id: String,
    role: String,
    text: String,
    created_at: String,
}

impl MessageRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            session_id: row.try_get("session_id")?,
            role: row.try_get("role")?,
            text: row.try_get("text")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_message(self) -> Result<ChatMessage, StoreError> {
        let role: MessageRole = self.role.parse().map_err(StoreError::Malformed)?;
        let timestamp = parse_datetime(&self.created_at)?;
        Ok(ChatMessage {
            text: self.text,
            role,
            timestamp,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Malformed(format!("invalid datetime '{s}': {e}")))
}

/// Fixed-width RFC 3339 so string order matches time order.
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn unavailable(e: sqlx::Error) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

// ---------------------------------------------------------------------------
// PersistenceGateway implementation
// ---------------------------------------------------------------------------

impl PersistenceGateway for SqliteSessionRepository {
    async fn create_session(&self, owner_id: &OwnerId) -> Result<SessionId, StoreError> {
        let id = SessionId::new(Uuid::now_v7().to_string());
        let now = format_datetime(&Utc::now());

        sqlx::query(
            r#"INSERT INTO chat_sessions (id, owner_id, title, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?)"#,
        )
        .bind(id.as_str())
        .bind(owner_id.as_str())
        .bind(DEFAULT_TITLE)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool.writer)
        .await
        .map_err(unavailable)?;

        Ok(id)
    }

    async fn list_sessions(&self, owner_id: &OwnerId) -> Vec<ChatSession> {
        match self.try_list_sessions(owner_id).await {
            Ok(sessions) => sessions,
            Err(e) => {
                warn!(owner = %owner_id, error = %e, "listing sessions failed, showing none");
                Vec::new()
            }
        }
    }

    async fn get_session(&self, session_id: &SessionId) -> Option<ChatSession> {
        match self.try_get_session(session_id).await {
            Ok(session) => session,
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "session unreadable");
                None
            }
        }
    }

    async fn append_message(
        &self,
        session_id: &SessionId,
        message: &ChatMessage,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.writer.begin().await.map_err(unavailable)?;

        let created: Option<(String,)> =
            sqlx::query_as("SELECT created_at FROM chat_sessions WHERE id = ?")
                .bind(session_id.as_str())
                .fetch_optional(&mut *tx)
                .await
                .map_err(unavailable)?;
        let Some((created_at,)) = created else {
            return Err(StoreError::NotFound);
        };

        let now = Utc::now();
        let updated_at = match parse_datetime(&created_at) {
            Ok(created_at) => now.max(created_at),
            Err(_) => now,
        };

        sqlx::query(
            r#"INSERT INTO chat_messages (session_id, role, text, created_at)
               VALUES (?, ?, ?, ?)"#,
        )
        .bind(session_id.as_str())
        .bind(message.role.to_string())
        .bind(&message.text)
        .bind(format_datetime(&message.timestamp))
        .execute(&mut *tx)
        .await
        .map_err(unavailable)?;

        let title = match message.role {
            MessageRole::User => derive_title(&message.text),
            MessageRole::Assistant => None,
        };
        sqlx::query(
            "UPDATE chat_sessions SET updated_at = ?, title = COALESCE(?, title) WHERE id = ?",
        )
        .bind(format_datetime(&updated_at))
        .bind(title)
        .bind(session_id.as_str())
        .execute(&mut *tx)
        .await
        .map_err(unavailable)?;

        tx.commit().await.map_err(unavailable)?;
        Ok(())
    }
}
