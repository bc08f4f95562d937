use thiserror::Error;

use crate::event::EngineState;

/// Errors from the durable session store.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("session not found")]
    NotFound,

    #[error("malformed record: {0}")]
    Malformed(String),
}

/// Errors from the generation backend, raised when opening or reading the
/// response stream.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("generation endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("response carried no stream body")]
    MissingBody,

    #[error("stream read failed: {0}")]
    Stream(String),

    #[error("stream ended without any text")]
    EmptyResponse,
}

/// Errors returned directly by the session engine.
///
/// Store and transport failures never appear here: the engine absorbs them
/// into state transitions and notifications.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("message is empty")]
    EmptyMessage,

    #[error("a send is already in progress (state: {state})")]
    Busy { state: EngineState },

    #[error("invalid state: {0}")]
    InvalidState(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display() {
        let err = StoreError::Unavailable("connection refused".to_string());
        assert_eq!(err.to_string(), "store unavailable: connection refused");
    }

    #[test]
    fn test_transport_error_display() {
        let err = TransportError::Status {
            status: 502,
            body: "bad gateway".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "generation endpoint returned HTTP 502: bad gateway"
        );
    }

    #[test]
    fn test_busy_error_names_state() {
        let err = EngineError::Busy {
            state: EngineState::StreamingResponse,
        };
        assert!(err.to_string().contains("streaming_response"));
    }
}
