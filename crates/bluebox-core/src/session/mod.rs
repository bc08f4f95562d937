//! Conversation state, the send state machine, and persistence ports.

pub mod engine;
pub mod list;
pub mod memory;
pub mod repository;
pub mod store;

pub use engine::{EngineSnapshot, SessionEngine, TurnOutcome};
pub use list::SessionListController;
pub use memory::InMemoryPersistence;
pub use repository::PersistenceGateway;
pub use store::{SessionStore, StreamingTurn};
