//! Session engine and port definitions for Bluebox.
//!
//! This crate defines the traits (persistence gateway, generation backend)
//! that the infrastructure layer implements, plus the engine that drives a
//! conversation through them. It depends only on `bluebox-types`, never on
//! `bluebox-infra` or any database/IO crate.

pub mod event;
pub mod generation;
pub mod session;
