//! SessionEngine: the send/stream state machine for one UI surface.
//!
//! A send appends the user message, lazily creates the durable session,
//! persists the user message, then opens the generation stream and surfaces
//! every fragment through the event bus. Store and transport failures are
//! absorbed into state transitions and notifications; only rejections and
//! invariant violations come back as `EngineError`.
//!
//! All mutable state sits behind one `tokio::sync::Mutex` that is never held
//! across an await. Each send holds a ticket (the epoch at acceptance) and a
//! `CancellationToken`. Switching sessions, starting a new one or changing
//! the owner bumps the epoch and fires the token, so a stale send can neither
//! write into the replacement state nor keep its connection open. `cancel`
//! does the same once the reply is streaming; before that it only fires the
//! token and the send stops after the user message is saved.

use std::sync::Arc;

use bluebox_types::chat::{ChatMessage, OwnerId, SessionId};
use bluebox_types::error::{EngineError, TransportError};
use bluebox_types::event::{EngineState, PersistenceOp, SessionEvent};
use bluebox_types::generation::GenerationRequest;
use futures_util::StreamExt;
use tokio::sync::{Mutex, broadcast};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::event::EventBus;
use crate::generation::GenerationBackend;

use super::repository::PersistenceGateway;
use super::store::SessionStore;

/// How an accepted send ended.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// The reply was committed. `persisted` is false when the surface is
    /// memory-only or the write failed.
    Completed { reply: ChatMessage, persisted: bool },
    /// The request or stream failed; no assistant message was committed.
    Faulted { error: TransportError },
    /// The turn was superseded by a session switch, owner change, or cancel.
    Abandoned,
}

/// Point-in-time view of an engine for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSnapshot {
    pub state: EngineState,
    pub owner: Option<OwnerId>,
    pub session_id: Option<SessionId>,
    pub messages: Vec<ChatMessage>,
    pub streaming_text: Option<String>,
}

struct EngineInner {
    state: EngineState,
    store: SessionStore,
    owner: Option<OwnerId>,
    epoch: u64,
    cancel: Option<CancellationToken>,
}

impl EngineInner {
    fn is_current(&self, ticket: u64) -> bool {
        self.epoch == ticket
    }
}

/// Orchestrates one conversation surface.
///
/// Generic over the persistence gateway and the generation backend so hosts
/// can plug in SQLite and HTTP while tests use in-memory fakes.
pub struct SessionEngine<P, B> {
    gateway: Arc<P>,
    backend: B,
    bus: EventBus,
    inner: Mutex<EngineInner>,
}

impl<P, B> SessionEngine<P, B>
where
    P: PersistenceGateway,
    B: GenerationBackend,
{
    /// Create an engine. `owner` is `None` for an anonymous, memory-only
    /// surface.
    pub fn new(gateway: Arc<P>, backend: B, bus: EventBus, owner: Option<OwnerId>) -> Self {
        Self {
            gateway,
            backend,
            bus,
            inner: Mutex::new(EngineInner {
                state: EngineState::Idle,
                store: SessionStore::new(),
                owner,
                epoch: 0,
                cancel: None,
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.bus.subscribe()
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn gateway(&self) -> &Arc<P> {
        &self.gateway
    }

    pub async fn state(&self) -> EngineState {
        self.inner.lock().await.state
    }

    pub async fn snapshot(&self) -> EngineSnapshot {
        let inner = self.inner.lock().await;
        EngineSnapshot {
            state: inner.state,
            owner: inner.owner.clone(),
            session_id: inner.store.session_id().cloned(),
            messages: inner.store.messages().to_vec(),
            streaming_text: inner.store.streaming().map(|turn| turn.text().to_string()),
        }
    }

    /// Send a user message and drive the reply stream to its end.
    ///
    /// Rejected with `EmptyMessage` for blank text and `Busy` while another
    /// send is in flight; a rejected send changes nothing.
    #[tracing::instrument(skip(self, text), fields(chars = text.chars().count()))]
    pub async fn send(&self, text: &str) -> Result<TurnOutcome, EngineError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(EngineError::EmptyMessage);
        }
        let user_message = ChatMessage::user(text);

        let (ticket, token, history, create_for) = {
            let mut inner = self.inner.lock().await;
            if inner.state != EngineState::Idle {
                debug!(state = %inner.state, "rejecting send while busy");
                return Err(EngineError::Busy { state: inner.state });
            }

            let history = inner.store.history();
            inner.store.append_committed(user_message.clone());
            inner.epoch += 1;
            let token = CancellationToken::new();
            inner.cancel = Some(token.clone());

            let create_for = match inner.store.session_id() {
                None => inner.owner.clone(),
                Some(_) => None,
            };
            let next = if create_for.is_some() {
                EngineState::AwaitingSessionCreation
            } else {
                EngineState::StreamingResponse
            };
            self.transition(&mut inner, next);
            (inner.epoch, token, history, create_for)
        };

        if let Some(owner) = create_for {
            match self.gateway.create_session(&owner).await {
                Ok(session_id) => {
                    let mut inner = self.inner.lock().await;
                    if !inner.is_current(ticket) {
                        warn!(session_id = %session_id, "session created for an abandoned send");
                        return Ok(TurnOutcome::Abandoned);
                    }
                    if let Err(e) = inner.store.bind_session(session_id.clone()) {
                        self.abandon_in_flight(&mut inner);
                        return Err(e);
                    }
                    info!(session_id = %session_id, owner = %owner, "created chat session");
                    self.bus.publish(SessionEvent::SessionListChanged);
                }
                Err(e) => {
                    warn!(owner = %owner, error = %e, "session creation failed, continuing in memory");
                    self.bus.publish(SessionEvent::PersistenceFailed {
                        operation: PersistenceOp::CreateSession,
                        error: e.to_string(),
                    });
                }
            }
        }

        let session_id = {
            let inner = self.inner.lock().await;
            if !inner.is_current(ticket) {
                return Ok(TurnOutcome::Abandoned);
            }
            inner.store.session_id().cloned()
        };
        if let Some(session_id) = &session_id {
            self.persist(session_id, &user_message).await;
        }

        {
            let mut inner = self.inner.lock().await;
            if !inner.is_current(ticket) {
                return Ok(TurnOutcome::Abandoned);
            }
            if token.is_cancelled() {
                inner.cancel = None;
                self.transition(&mut inner, EngineState::Idle);
                info!("send stopped before the reply stream opened");
                return Ok(TurnOutcome::Abandoned);
            }
            if let Err(e) = inner.store.begin_streaming() {
                self.abandon_in_flight(&mut inner);
                return Err(e);
            }
            self.transition(&mut inner, EngineState::StreamingResponse);
        }

        let request = GenerationRequest {
            message: text.to_string(),
            history,
        };
        let opened = tokio::select! {
            biased;
            _ = token.cancelled() => return Ok(TurnOutcome::Abandoned),
            opened = self.backend.open(&request) => opened,
        };
        let mut stream = match opened {
            Ok(stream) => stream,
            Err(e) => return Ok(self.fault(ticket, e).await),
        };

        loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => return Ok(TurnOutcome::Abandoned),
                next = stream.next() => next,
            };
            match next {
                Some(Ok(fragment)) => {
                    let mut inner = self.inner.lock().await;
                    if !inner.is_current(ticket) {
                        return Ok(TurnOutcome::Abandoned);
                    }
                    let accumulated = match inner.store.append_fragment(&fragment) {
                        Ok(text) => text.to_string(),
                        Err(e) => {
                            self.abandon_in_flight(&mut inner);
                            return Err(e);
                        }
                    };
                    self.bus
                        .publish(SessionEvent::ProgressiveText { text: accumulated });
                }
                Some(Err(e)) => return Ok(self.fault(ticket, e).await),
                None => break,
            }
        }
        drop(stream);

        let reply = {
            let mut inner = self.inner.lock().await;
            if !inner.is_current(ticket) {
                return Ok(TurnOutcome::Abandoned);
            }
            let final_text = match inner.store.end_streaming() {
                Ok(text) => text,
                Err(e) => {
                    self.abandon_in_flight(&mut inner);
                    return Err(e);
                }
            };
            if final_text.is_empty() {
                drop(inner);
                return Ok(self.fault(ticket, TransportError::EmptyResponse).await);
            }
            let reply = ChatMessage::assistant(final_text);
            inner.store.append_committed(reply.clone());
            // Committed: from here on `cancel` has nothing to stop.
            inner.cancel = None;
            reply
        };

        let persisted = match &session_id {
            Some(session_id) => self.persist(session_id, &reply).await,
            None => false,
        };

        let mut inner = self.inner.lock().await;
        if inner.is_current(ticket) {
            inner.cancel = None;
            self.transition(&mut inner, EngineState::Idle);
        }
        debug!(persisted, chars = reply.text.chars().count(), "turn completed");
        Ok(TurnOutcome::Completed { reply, persisted })
    }

    /// Replace the conversation with a stored session owned by this surface.
    ///
    /// Returns `false` and leaves everything untouched when the surface is
    /// anonymous or the session is missing, malformed, or someone else's.
    #[tracing::instrument(skip(self, session_id), fields(session_id = %session_id))]
    pub async fn load_session(&self, session_id: &SessionId) -> bool {
        let Some(owner) = self.inner.lock().await.owner.clone() else {
            debug!("anonymous surface cannot load sessions");
            return false;
        };

        let Some(session) = self.gateway.get_session(session_id).await else {
            debug!("session not available");
            return false;
        };
        if session.owner_id != owner {
            warn!(owner = %owner, "refusing to load a session owned by someone else");
            return false;
        }

        let mut inner = self.inner.lock().await;
        if inner.owner.as_ref() != Some(&owner) {
            return false;
        }
        self.abandon_in_flight(&mut inner);
        inner
            .store
            .reset(Some(session.id.clone()), session.messages);
        info!(messages = inner.store.messages().len(), "loaded chat session");
        self.bus.publish(SessionEvent::SessionLoaded {
            session_id: Some(session.id),
        });
        true
    }

    /// Start an empty, unsaved conversation. The durable record is created on
    /// the first send.
    pub async fn new_session(&self) {
        let mut inner = self.inner.lock().await;
        self.abandon_in_flight(&mut inner);
        inner.store.reset(None, Vec::new());
        debug!("started new conversation");
        self.bus
            .publish(SessionEvent::SessionLoaded { session_id: None });
    }

    /// Load the owner's most recently updated session, if any.
    pub async fn resume_latest(&self) -> Option<SessionId> {
        let owner = self.inner.lock().await.owner.clone()?;
        let latest = self.gateway.list_sessions(&owner).await.into_iter().next()?;
        if self.load_session(&latest.id).await {
            Some(latest.id)
        } else {
            None
        }
    }

    /// Sign in (`Some`) or out (`None`). Any change clears the conversation.
    pub async fn set_owner(&self, owner: Option<OwnerId>) {
        let mut inner = self.inner.lock().await;
        if inner.owner == owner {
            return;
        }
        self.abandon_in_flight(&mut inner);
        inner.store.reset(None, Vec::new());
        match &owner {
            Some(owner) => info!(owner = %owner, "surface identified"),
            None => info!("surface signed out"),
        }
        inner.owner = owner;
        self.bus
            .publish(SessionEvent::SessionLoaded { session_id: None });
    }

    /// Stop the in-flight send. Returns whether there was anything to stop.
    ///
    /// A streaming reply is discarded at once and the engine is `Idle` on
    /// return. Before the stream opens, the send still finishes creating the
    /// session and saving the user message, then ends as `Abandoned` without
    /// requesting a reply; the engine stays busy until then. Once the reply
    /// is committed this is a no-op.
    pub async fn cancel(&self) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.state == EngineState::Idle {
            return false;
        }
        let Some(token) = inner.cancel.clone() else {
            debug!("reply already committed, nothing to cancel");
            return false;
        };
        if inner.store.is_streaming() {
            self.abandon_in_flight(&mut inner);
            info!("send cancelled");
        } else {
            token.cancel();
            info!("send cancelled before the reply stream opened");
        }
        true
    }

    /// Best-effort write of a committed message.
    async fn persist(&self, session_id: &SessionId, message: &ChatMessage) -> bool {
        match self.gateway.append_message(session_id, message).await {
            Ok(()) => {
                self.bus.publish(SessionEvent::SessionListChanged);
                true
            }
            Err(e) => {
                warn!(
                    session_id = %session_id,
                    role = %message.role,
                    error = %e,
                    "failed to persist message"
                );
                self.bus.publish(SessionEvent::PersistenceFailed {
                    operation: PersistenceOp::AppendMessage,
                    error: e.to_string(),
                });
                false
            }
        }
    }

    async fn fault(&self, ticket: u64, error: TransportError) -> TurnOutcome {
        let mut inner = self.inner.lock().await;
        if !inner.is_current(ticket) {
            return TurnOutcome::Abandoned;
        }
        warn!(error = %error, "generation failed");
        inner.store.discard_streaming();
        inner.cancel = None;
        self.transition(&mut inner, EngineState::Faulted);
        self.bus.publish(SessionEvent::SendFailed {
            error: error.to_string(),
        });
        self.transition(&mut inner, EngineState::Idle);
        TurnOutcome::Faulted { error }
    }

    /// Invalidate the running send, if any, and return to `Idle`.
    fn abandon_in_flight(&self, inner: &mut EngineInner) {
        inner.epoch += 1;
        if let Some(token) = inner.cancel.take() {
            token.cancel();
        }
        if let Some(turn) = inner.store.discard_streaming() {
            debug!(chars = turn.text().chars().count(), "discarded partial reply");
        }
        self.transition(inner, EngineState::Idle);
    }

    fn transition(&self, inner: &mut EngineInner, next: EngineState) {
        if inner.state == next {
            return;
        }
        debug!(from = %inner.state, to = %next, "engine state change");
        inner.state = next;
        self.bus.publish(SessionEvent::StateChanged { state: next });
    }
}
