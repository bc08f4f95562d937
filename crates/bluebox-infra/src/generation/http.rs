//! HttpGenerationClient -- concrete [`GenerationBackend`] over HTTP.
//!
//! POSTs `{ message, history }` as JSON and reads the reply as a chunked,
//! unframed UTF-8 body. The optional bearer token is held in a
//! [`SecretString`] and only exposed while building the request headers.

use std::time::Duration;

use bluebox_core::generation::{GenerationBackend, TextStream, text_stream};
use bluebox_types::config::GenerationConfig;
use bluebox_types::error::TransportError;
use bluebox_types::generation::GenerationRequest;
use futures_util::StreamExt;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};

/// Streaming client for the generation endpoint.
///
/// No `Debug` impl: the token must never reach logs.
pub struct HttpGenerationClient {
    client: reqwest::Client,
    endpoint: String,
    api_token: Option<SecretString>,
}

impl HttpGenerationClient {
    pub fn new(
        endpoint: impl Into<String>,
        timeout: Duration,
        api_token: Option<SecretString>,
    ) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_token,
        })
    }

    /// Build a client from the `[generation]` config section.
    pub fn from_config(config: &GenerationConfig) -> Result<Self, TransportError> {
        Self::new(
            config.endpoint.clone(),
            Duration::from_secs(config.timeout_secs),
            config.api_token.clone(),
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl GenerationBackend for HttpGenerationClient {
    async fn open(&self, request: &GenerationRequest) -> Result<TextStream, TransportError> {
        let mut builder = self.client.post(&self.endpoint).json(request);
        if let Some(token) = &self.api_token {
            builder = builder.bearer_auth(token.expose_secret());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "generation endpoint rejected request");
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }
        if status == StatusCode::NO_CONTENT {
            return Err(TransportError::MissingBody);
        }

        tracing::debug!(
            status = status.as_u16(),
            history = request.history.len(),
            "generation stream opened"
        );
        let bytes = response.bytes_stream().map(|chunk| {
            chunk
                .map(|bytes| bytes.to_vec())
                .map_err(|e| TransportError::Stream(e.to_string()))
        });
        Ok(text_stream(bytes))
    }
}

#[cfg(test)]
mod tests {
    use bluebox_types::generation::{HistoryEntry, HistoryRole};
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn request() -> GenerationRequest {
        GenerationRequest {
            message: "Should I worry?".to_string(),
            history: vec![
                HistoryEntry {
                    role: HistoryRole::User,
                    content: "I have a cough".to_string(),
                },
                HistoryEntry {
                    role: HistoryRole::Assistant,
                    content: "How long?".to_string(),
                },
            ],
        }
    }

    fn client(server: &MockServer, token: Option<&str>) -> HttpGenerationClient {
        HttpGenerationClient::new(
            format!("{}/api/chat", server.uri()),
            Duration::from_secs(5),
            token.map(|t| SecretString::from(t.to_string())),
        )
        .unwrap()
    }

    async fn collect(mut stream: TextStream) -> Result<String, TransportError> {
        let mut text = String::new();
        while let Some(fragment) = stream.next().await {
            text.push_str(&fragment?);
        }
        Ok(text)
    }

    #[tokio::test]
    async fn streams_body_as_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_json(serde_json::json!({
                "message": "Should I worry?",
                "history": [
                    {"role": "user", "content": "I have a cough"},
                    {"role": "assistant", "content": "How long?"}
                ]
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("Based on your symptoms, résumé".as_bytes().to_vec(), "text/plain"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let stream = client(&server, None).open(&request()).await.unwrap();
        assert_eq!(collect(stream).await.unwrap(), "Based on your symptoms, résumé");
    }

    #[tokio::test]
    async fn sends_bearer_token_when_configured() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer s3cret"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let stream = client(&server, Some("s3cret"))
            .open(&request())
            .await
            .unwrap();
        assert_eq!(collect(stream).await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn non_success_status_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("model crashed"))
            .mount(&server)
            .await;

        let err = client(&server, None).open(&request()).await.err().unwrap();
        assert_eq!(
            err,
            TransportError::Status {
                status: 500,
                body: "model crashed".to_string()
            }
        );
    }

    #[tokio::test]
    async fn no_content_is_missing_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let err = client(&server, None).open(&request()).await.err().unwrap();
        assert_eq!(err, TransportError::MissingBody);
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_request_error() {
        // Port 1 is privileged and never served by the mock server pool.
        let client = HttpGenerationClient::new(
            "http://127.0.0.1:1/api/chat",
            Duration::from_secs(2),
            None,
        )
        .unwrap();
        let err = client.open(&request()).await.err().unwrap();
        assert!(matches!(err, TransportError::Request(_)));
    }

    #[test]
    fn from_config_uses_endpoint() {
        let config = GenerationConfig::default();
        let client = HttpGenerationClient::from_config(&config).unwrap();
        assert_eq!(client.endpoint(), config.endpoint);
    }
}
