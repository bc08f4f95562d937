//! Visible session list for a signed-in owner.

use std::sync::Arc;

use bluebox_types::chat::{ChatSession, OwnerId};
use bluebox_types::event::SessionEvent;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::debug;

use super::repository::PersistenceGateway;

/// Keeps an owner's session list current.
///
/// Every refresh replaces the whole list. Observers read it through a
/// `watch` receiver and see only the latest set.
pub struct SessionListController<P> {
    gateway: Arc<P>,
    sessions: watch::Sender<Vec<ChatSession>>,
}

impl<P> SessionListController<P>
where
    P: PersistenceGateway + 'static,
{
    pub fn new(gateway: Arc<P>) -> Self {
        let (sessions, _) = watch::channel(Vec::new());
        Self { gateway, sessions }
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<ChatSession>> {
        self.sessions.subscribe()
    }

    /// Current visible set, newest-updated first.
    pub fn sessions(&self) -> Vec<ChatSession> {
        self.sessions.borrow().clone()
    }

    /// Re-read the owner's sessions and replace the visible set.
    pub async fn refresh(&self, owner_id: &OwnerId) -> usize {
        let sessions = self.gateway.list_sessions(owner_id).await;
        let count = sessions.len();
        self.sessions.send_replace(sessions);
        debug!(owner = %owner_id, count, "session list refreshed");
        count
    }

    /// Empty the visible set, e.g. on sign-out.
    pub fn clear(&self) {
        self.sessions.send_replace(Vec::new());
    }

    /// Refresh now and again after every `SessionListChanged`.
    ///
    /// A lagged receiver refreshes as well, since a change may have been
    /// skipped. The task ends when the bus closes; abort the handle to stop it
    /// earlier (for example when the owner changes).
    pub fn spawn_listener(
        self: Arc<Self>,
        mut events: broadcast::Receiver<SessionEvent>,
        owner_id: OwnerId,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.refresh(&owner_id).await;
            loop {
                match events.recv().await {
                    Ok(SessionEvent::SessionListChanged) => {
                        self.refresh(&owner_id).await;
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "session list listener lagged");
                        self.refresh(&owner_id).await;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}
