//! Generation backend implementations.

pub mod http;

pub use http::HttpGenerationClient;
