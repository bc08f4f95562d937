//! Shared domain types for Bluebox.
//!
//! Sessions, messages, engine state and notifications, generation wire
//! types, configuration, and the error taxonomy shared by every crate.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror.

pub mod chat;
pub mod config;
pub mod error;
pub mod event;
pub mod generation;
