//! Infrastructure layer for Bluebox.
//!
//! Implementations of the ports defined in `bluebox-core`: the SQLite
//! persistence gateway and the HTTP generation client, plus configuration
//! loading and data directory resolution.

pub mod config;
pub mod generation;
pub mod sqlite;
