//! Generation backend trait.
//!
//! Implementations open one streaming request per turn. The HTTP client in
//! `bluebox-infra` is the production implementation; tests use scripted
//! backends.

use bluebox_types::error::TransportError;
use bluebox_types::generation::GenerationRequest;

use super::decoder::TextStream;

/// Opens a text stream for a single generation request.
///
/// Uses RPITIT (native async fn in traits, Rust 2024 edition).
pub trait GenerationBackend: Send + Sync {
    /// Start a streaming request.
    ///
    /// Errors here mean the request never produced a readable body
    /// (connection failure, non-success status, missing body). Failures
    /// after the first byte arrive through the stream itself.
    fn open(
        &self,
        request: &GenerationRequest,
    ) -> impl std::future::Future<Output = Result<TextStream, TransportError>> + Send;
}
