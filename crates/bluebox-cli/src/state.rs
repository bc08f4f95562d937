//! Application state wiring the engine to its concrete infrastructure.
//!
//! The engine is generic over its gateway and backend; `AppState` pins it to
//! SQLite and the HTTP generation client.

use std::sync::Arc;

use anyhow::Context;
use bluebox_core::event::EventBus;
use bluebox_core::session::SessionEngine;
use bluebox_infra::config::{apply_env_overrides, database_url, load_config, resolve_data_dir};
use bluebox_infra::generation::HttpGenerationClient;
use bluebox_infra::sqlite::pool::DatabasePool;
use bluebox_infra::sqlite::session::SqliteSessionRepository;
use bluebox_types::chat::OwnerId;
use bluebox_types::config::BlueboxConfig;

/// Engine pinned to the infra implementations.
pub type ChatEngine = SessionEngine<SqliteSessionRepository, HttpGenerationClient>;

/// Shared state for every command.
#[derive(Clone)]
pub struct AppState {
    pub config: BlueboxConfig,
    pub sessions: Arc<SqliteSessionRepository>,
}

impl AppState {
    /// Resolve the data directory, load config, and open the database.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        tokio::fs::create_dir_all(&data_dir)
            .await
            .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

        let config = apply_env_overrides(load_config(&data_dir).await);

        let db_url = database_url(&config, &data_dir);
        let db_pool = DatabasePool::new(&db_url)
            .await
            .context("failed to open the session database")?;

        tracing::debug!(
            data_dir = %data_dir.display(),
            endpoint = %config.generation.endpoint,
            "application state initialized"
        );

        Ok(Self {
            sessions: Arc::new(SqliteSessionRepository::new(db_pool)),
            config,
        })
    }

    /// Build one engine for one chat surface.
    pub fn engine(&self, owner: Option<OwnerId>) -> anyhow::Result<Arc<ChatEngine>> {
        let client = HttpGenerationClient::from_config(&self.config.generation)
            .context("failed to create the generation client")?;
        let bus = EventBus::new(self.config.event_capacity);
        Ok(Arc::new(SessionEngine::new(
            self.sessions.clone(),
            client,
            bus,
            owner,
        )))
    }
}
