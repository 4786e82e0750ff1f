//! Client for OpenAI-compatible `/embeddings` endpoints.

use crate::config::{ApiKey, EmbeddingSettings};
use crate::embeddings::EmbeddingProvider;
use crate::error::{ConfigError, EmbeddingError};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use url::Url;

const MAX_ERROR_BODY_CHARS: usize = 512;

pub struct OpenAiEmbeddingClient {
    client: Client,
    endpoint: Url,
    model: String,
    api_key: ApiKey,
}

impl OpenAiEmbeddingClient {
    pub fn new(settings: &EmbeddingSettings, api_key: ApiKey) -> Result<Self, ConfigError> {
        settings.validate()?;
        let client = Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|error| ConfigError::HttpClient(error.to_string()))?;

        Ok(Self {
            client,
            endpoint: settings.endpoint()?,
            model: settings.model.clone(),
            api_key,
        })
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

fn classify_status(status: StatusCode, body: String) -> EmbeddingError {
    let code = status.as_u16();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        EmbeddingError::Unauthorized { status: code }
    } else if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::REQUEST_TIMEOUT {
        EmbeddingError::RateLimited { status: code, body }
    } else if status.is_server_error() {
        EmbeddingError::Server { status: code, body }
    } else {
        EmbeddingError::Rejected { status: code, body }
    }
}

/// Orders response entries by `index` and checks every input got exactly one.
fn into_ordered_vectors(
    mut data: Vec<EmbeddingData>,
    expected: usize,
) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    if data.len() != expected {
        return Err(EmbeddingError::CountMismatch {
            expected,
            actual: data.len(),
        });
    }

    data.sort_by_key(|entry| entry.index);
    for (position, entry) in data.iter().enumerate() {
        if entry.index != position {
            return Err(EmbeddingError::InvalidResponse(format!(
                "response indices are not a permutation of 0..{expected}"
            )));
        }
    }

    Ok(data.into_iter().map(|entry| entry.embedding).collect())
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn embed_batch(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(self.api_key.expose())
            .json(&EmbeddingRequest {
                model: &self.model,
                input: inputs,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string())
                .chars()
                .take(MAX_ERROR_BODY_CHARS)
                .collect();
            return Err(classify_status(status, body));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|error| EmbeddingError::InvalidResponse(error.to_string()))?;

        into_ordered_vectors(parsed.data, inputs.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::{BatchEmbedder, BatchLimits};
    use crate::retry::RetryPolicy;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const LIMITS: BatchLimits = BatchLimits {
        max_items: 8,
        max_chars: 1_000,
    };

    fn settings_for(server: &mockito::Server) -> EmbeddingSettings {
        EmbeddingSettings {
            base_url: server.url(),
            request_timeout: Duration::from_secs(5),
            ..EmbeddingSettings::default()
        }
    }

    fn client_for(server: &mockito::Server) -> Result<OpenAiEmbeddingClient, ConfigError> {
        OpenAiEmbeddingClient::new(&settings_for(server), ApiKey::new("test-key")?)
    }

    fn quick_retry(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts).with_initial_delay(Duration::from_millis(1))
    }

    /// Counts how many times the wrapped client is actually called.
    struct CountingProvider<P> {
        inner: P,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl<P: EmbeddingProvider> EmbeddingProvider for CountingProvider<P> {
        fn model(&self) -> &str {
            self.inner.model()
        }

        async fn embed_batch(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.embed_batch(inputs).await
        }
    }

    #[tokio::test]
    async fn response_is_reordered_by_index() -> Result<(), Box<dyn std::error::Error>> {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/embeddings")
            .match_header("authorization", "Bearer test-key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "data": [
                        {"index": 1, "embedding": [0.0, 1.0]},
                        {"index": 0, "embedding": [1.0, 0.0]}
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = client_for(&server)?;
        let vectors = client.embed_batch(&["first", "second"]).await?;

        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
        mock.assert_async().await;
        Ok(())
    }

    #[tokio::test]
    async fn unauthorized_is_permanent_and_not_retried() -> Result<(), Box<dyn std::error::Error>> {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/embeddings")
            .with_status(401)
            .with_body("invalid api key")
            .expect(1)
            .create_async()
            .await;

        let embedder = BatchEmbedder::new(client_for(&server)?, LIMITS, quick_retry(3));
        let result = embedder.embed_all(&["text"]).await;

        assert!(matches!(
            result,
            Err(EmbeddingError::Unauthorized { status: 401 })
        ));
        mock.assert_async().await;
        Ok(())
    }

    #[tokio::test]
    async fn server_errors_are_retried_until_attempts_run_out(
    ) -> Result<(), Box<dyn std::error::Error>> {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/embeddings")
            .with_status(503)
            .with_body("overloaded")
            .expect(3)
            .create_async()
            .await;

        let embedder = BatchEmbedder::new(client_for(&server)?, LIMITS, quick_retry(3));
        let result = embedder.embed_all(&["text"]).await;

        assert!(matches!(
            result,
            Err(EmbeddingError::Server { status: 503, .. })
        ));
        mock.assert_async().await;
        Ok(())
    }

    #[tokio::test]
    async fn unusable_credential_fails_on_the_first_attempt(
    ) -> Result<(), Box<dyn std::error::Error>> {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/embeddings")
            .expect(0)
            .create_async()
            .await;

        let client = OpenAiEmbeddingClient::new(
            &settings_for(&server),
            ApiKey::new("sk-bad\u{1}key")?,
        )?;
        let provider = CountingProvider {
            inner: client,
            calls: AtomicUsize::new(0),
        };
        let retry = RetryPolicy::new(4).with_initial_delay(Duration::from_millis(200));
        let embedder = BatchEmbedder::new(provider, LIMITS, retry);

        match embedder.embed_all(&["x"]).await {
            Err(error) => {
                assert!(matches!(error, EmbeddingError::InvalidRequest(_)));
                assert!(!error.is_transient());
            }
            Ok(vectors) => panic!("expected a request error, got {} vectors", vectors.len()),
        }
        assert_eq!(embedder.provider().calls.load(Ordering::SeqCst), 1);
        mock.assert_async().await;
        Ok(())
    }

    #[tokio::test]
    async fn missing_vectors_are_an_integrity_failure() -> Result<(), Box<dyn std::error::Error>> {
        let mut server = mockito::Server::new_async().await;
        let data = (0..4)
            .map(|index| json!({"index": index, "embedding": [index as f32]}))
            .collect::<Vec<_>>();
        let _mock = server
            .mock("POST", "/embeddings")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({ "data": data }).to_string())
            .create_async()
            .await;

        let client = client_for(&server)?;
        let result = client.embed_batch(&["a", "b", "c", "d", "e"]).await;

        assert!(matches!(
            result,
            Err(EmbeddingError::CountMismatch {
                expected: 5,
                actual: 4
            })
        ));
        Ok(())
    }

    #[test]
    fn status_classification() {
        assert!(classify_status(StatusCode::TOO_MANY_REQUESTS, String::new()).is_transient());
        assert!(classify_status(StatusCode::BAD_GATEWAY, String::new()).is_transient());
        assert!(!classify_status(StatusCode::FORBIDDEN, String::new()).is_transient());
        assert!(!classify_status(StatusCode::BAD_REQUEST, String::new()).is_transient());
    }

    #[test]
    fn duplicate_indices_are_rejected() {
        let data = vec![
            EmbeddingData {
                index: 0,
                embedding: vec![1.0],
            },
            EmbeddingData {
                index: 0,
                embedding: vec![2.0],
            },
        ];
        assert!(matches!(
            into_ordered_vectors(data, 2),
            Err(EmbeddingError::InvalidResponse(_))
        ));
    }
}
