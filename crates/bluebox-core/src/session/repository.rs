//! PersistenceGateway trait definition.
//!
//! Four operations over durable session records. Read paths degrade to
//! "nothing there" instead of failing; write paths report `StoreError` so the
//! engine can surface the failure without losing the in-memory turn.

use bluebox_types::chat::{ChatMessage, ChatSession, OwnerId, SessionId};
use bluebox_types::error::StoreError;

/// Durable storage for chat sessions and their messages.
///
/// Implementations live in bluebox-infra (`SqliteSessionRepository`) and in
/// this crate (`InMemoryPersistence`).
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
pub trait PersistenceGateway: Send + Sync {
    /// Create an empty session titled "New Chat" with both timestamps set to
    /// now. Either the full record is written or nothing is.
    fn create_session(
        &self,
        owner_id: &OwnerId,
    ) -> impl std::future::Future<Output = Result<SessionId, StoreError>> + Send;

    /// Sessions owned by `owner_id`, most recently updated first.
    ///
    /// Returns an empty list when the owner has none or the store cannot be
    /// read.
    fn list_sessions(
        &self,
        owner_id: &OwnerId,
    ) -> impl std::future::Future<Output = Vec<ChatSession>> + Send;

    /// A session with its messages, or `None` when it does not exist or the
    /// stored record is malformed.
    fn get_session(
        &self,
        session_id: &SessionId,
    ) -> impl std::future::Future<Output = Option<ChatSession>> + Send;

    /// Append a committed message, bump `updated_at`, and retitle the session
    /// when the message is user-authored and non-empty.
    ///
    /// Not idempotent: calling twice stores the message twice.
    fn append_message(
        &self,
        session_id: &SessionId,
        message: &ChatMessage,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;
}
