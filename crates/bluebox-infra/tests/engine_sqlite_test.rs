//! End-to-end session engine tests over the SQLite gateway.
//!
//! The HTTP tests run the real `HttpGenerationClient` against a `wiremock`
//! server; the failure tests use a scripted backend so a stream can break
//! after a known set of fragments.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use bluebox_core::event::EventBus;
use bluebox_core::generation::{GenerationBackend, TextStream, text_stream};
use bluebox_core::session::{
    PersistenceGateway, SessionEngine, SessionListController, TurnOutcome,
};
use bluebox_infra::generation::HttpGenerationClient;
use bluebox_infra::sqlite::pool::DatabasePool;
use bluebox_infra::sqlite::session::SqliteSessionRepository;
use bluebox_types::chat::{MessageRole, OwnerId};
use bluebox_types::error::TransportError;
use bluebox_types::event::{EngineState, SessionEvent};
use bluebox_types::generation::GenerationRequest;
use futures_util::stream;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn repository() -> (tempfile::TempDir, Arc<SqliteSessionRepository>) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("bluebox.db").display());
    let pool = DatabasePool::new(&url).await.unwrap();
    (dir, Arc::new(SqliteSessionRepository::new(pool)))
}

fn owner() -> OwnerId {
    OwnerId::new("patient-1")
}

/// Replays one scripted chunk list per request.
struct ScriptedBackend {
    replies: Mutex<Vec<Vec<Result<Vec<u8>, TransportError>>>>,
}

impl ScriptedBackend {
    fn new(mut replies: Vec<Vec<Result<Vec<u8>, TransportError>>>) -> Self {
        replies.reverse();
        Self {
            replies: Mutex::new(replies),
        }
    }
}

impl GenerationBackend for ScriptedBackend {
    async fn open(&self, _request: &GenerationRequest) -> Result<TextStream, TransportError> {
        let chunks = self.replies.lock().unwrap().pop().unwrap_or_default();
        Ok(text_stream(stream::iter(chunks)))
    }
}

#[tokio::test]
async fn http_turns_persist_and_refresh_session_list() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Rest and drink fluids."))
        .mount(&server)
        .await;

    let (_dir, repo) = repository().await;
    let client = HttpGenerationClient::new(
        format!("{}/api/chat", server.uri()),
        Duration::from_secs(5),
        None,
    )
    .unwrap();
    let bus = EventBus::new(64);
    let list = Arc::new(SessionListController::new(repo.clone()));
    let mut visible = list.subscribe();
    let listener = list.clone().spawn_listener(bus.subscribe(), owner());

    let engine = SessionEngine::new(repo.clone(), client, bus, Some(owner()));
    let outcome = engine
        .send("Is this rash dangerous and should I see a doctor today?")
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        TurnOutcome::Completed {
            persisted: true,
            ..
        }
    ));

    let session_id = engine.snapshot().await.session_id.unwrap();
    let stored = repo.get_session(&session_id).await.unwrap();
    assert_eq!(stored.title, "Is this rash dangerous and sho...");
    assert_eq!(stored.messages.len(), 2);
    assert_eq!(stored.messages[1].text, "Rest and drink fluids.");

    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if visible
                .borrow_and_update()
                .iter()
                .any(|s| s.id == session_id && s.messages.len() == 2)
            {
                break;
            }
            visible.changed().await.unwrap();
        }
    })
    .await
    .unwrap();

    listener.abort();
}

#[tokio::test]
async fn persisted_transcript_replays_in_order_and_alternates() {
    let (_dir, repo) = repository().await;
    let backend = ScriptedBackend::new(vec![
        vec![Ok(b"How long have you had it?".to_vec())],
        vec![Ok(b"Any fever?".to_vec())],
    ]);
    let engine = SessionEngine::new(repo.clone(), backend, EventBus::new(64), Some(owner()));

    engine.send("I have a cough").await.unwrap();
    engine.send("Three days").await.unwrap();

    let snapshot = engine.snapshot().await;
    let stored = repo
        .get_session(snapshot.session_id.as_ref().unwrap())
        .await
        .unwrap();

    assert_eq!(stored.messages.len(), snapshot.messages.len());
    for (i, (stored, live)) in stored.messages.iter().zip(&snapshot.messages).enumerate() {
        assert_eq!(stored.text, live.text);
        assert_eq!(stored.role, live.role);
        assert_eq!(
            stored.timestamp.timestamp_micros(),
            live.timestamp.timestamp_micros()
        );
        let expected = if i % 2 == 0 {
            MessageRole::User
        } else {
            MessageRole::Assistant
        };
        assert_eq!(stored.role, expected);
    }
    assert_eq!(stored.title, "Three days");
}

#[tokio::test]
async fn mid_stream_failure_persists_no_partial_reply() {
    let (_dir, repo) = repository().await;
    let backend = ScriptedBackend::new(vec![vec![
        Ok(b"Base".to_vec()),
        Ok(b"d on".to_vec()),
        Err(TransportError::Stream("connection reset".into())),
    ]]);
    let bus = EventBus::new(64);
    let mut events = bus.subscribe();
    let engine = SessionEngine::new(repo.clone(), backend, bus, Some(owner()));

    let outcome = engine.send("Is this serious?").await.unwrap();
    assert!(matches!(outcome, TurnOutcome::Faulted { .. }));
    assert_eq!(engine.state().await, EngineState::Idle);

    let mut progress = Vec::new();
    let mut saw_fault = false;
    while let Ok(event) = events.try_recv() {
        match event {
            SessionEvent::ProgressiveText { text } => {
                assert!(!saw_fault, "progress after fault");
                progress.push(text);
            }
            SessionEvent::StateChanged {
                state: EngineState::Faulted,
            } => saw_fault = true,
            _ => {}
        }
    }
    assert!(saw_fault);
    assert_eq!(progress, vec!["Base", "Based on"]);

    let session_id = engine.snapshot().await.session_id.unwrap();
    let stored = repo.get_session(&session_id).await.unwrap();
    assert_eq!(stored.messages.len(), 1);
    assert_eq!(stored.messages[0].role, MessageRole::User);
}

#[tokio::test]
async fn http_error_status_faults_without_assistant_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let (_dir, repo) = repository().await;
    let client = HttpGenerationClient::new(server.uri(), Duration::from_secs(5), None).unwrap();
    let engine = SessionEngine::new(repo.clone(), client, EventBus::new(64), Some(owner()));

    let outcome = engine.send("hello").await.unwrap();
    assert_eq!(
        outcome,
        TurnOutcome::Faulted {
            error: TransportError::Status {
                status: 502,
                body: "bad gateway".into()
            }
        }
    );
    let sessions = repo.list_sessions(&owner()).await;
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].messages.len(), 1);
}

#[tokio::test]
async fn resume_latest_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("bluebox.db").display());

    let first_id = {
        let repo = Arc::new(SqliteSessionRepository::new(
            DatabasePool::new(&url).await.unwrap(),
        ));
        let engine = SessionEngine::new(
            repo,
            ScriptedBackend::new(vec![vec![Ok(b"Noted.".to_vec())]]),
            EventBus::new(64),
            Some(owner()),
        );
        engine.send("Headache since noon").await.unwrap();
        engine.snapshot().await.session_id.unwrap()
    };

    let repo = Arc::new(SqliteSessionRepository::new(
        DatabasePool::new(&url).await.unwrap(),
    ));
    let engine = SessionEngine::new(
        repo,
        ScriptedBackend::new(vec![]),
        EventBus::new(64),
        Some(owner()),
    );
    assert_eq!(engine.resume_latest().await, Some(first_id));
    let snapshot = engine.snapshot().await;
    assert_eq!(snapshot.messages.len(), 2);
    assert_eq!(snapshot.messages[0].text, "Headache since noon");
}
