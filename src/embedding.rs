//! Embedding provider abstraction and implementations.
//!
//! Defines the [`EmbeddingProvider`] trait and two concrete backends:
//! - **[`OpenAiProvider`]** — calls the OpenAI embeddings API with batching,
//!   retry, and backoff.
//! - **[`OllamaProvider`]** — calls a local Ollama instance's `/api/embed`
//!   endpoint; the local/dev variant.
//!
//! Use [`create_provider`] to instantiate the configured backend.
//!
//! # Retry Strategy
//!
//! Both providers retry transient failures with exponential backoff:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)
//!
//! The retry budget (`max_attempts`, default 3) belongs to the provider;
//! the orchestrator never retries a whole ingest on top of it.
//!
//! All vectors for a deployment share one fixed dimensionality. Providers
//! verify every returned vector against the configured `dims` and fail
//! fast on a mismatch rather than letting a bad vector reach storage.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use crate::config::EmbeddingConfig;
use crate::error::EmbeddingError;

/// Converts text into fixed-dimension vectors, singly or batched.
///
/// `embed_documents` is order-preserving: output `i` embeds input `i`.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;

    /// Returns the embedding vector dimensionality (e.g. `1536`).
    fn dims(&self) -> usize;

    /// Embed a batch of texts, one vector per input, in input order.
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Embed a single query text.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vectors = self.embed_documents(&[text.to_string()]).await?;
        if vectors.len() != 1 {
            return Err(EmbeddingError::CountMismatch {
                provider: self.model_name().to_string(),
                expected: 1,
                actual: vectors.len(),
            });
        }
        Ok(vectors.remove(0))
    }
}

/// Create the configured [`EmbeddingProvider`].
///
/// | Config value | Provider |
/// |--------------|----------|
/// | `"openai"` | [`OpenAiProvider`] |
/// | `"ollama"` | [`OllamaProvider`] |
pub fn create_provider(
    config: &EmbeddingConfig,
) -> Result<Arc<dyn EmbeddingProvider>, EmbeddingError> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAiProvider::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaProvider::new(config)?)),
        other => Err(EmbeddingError::Config(format!(
            "unknown embedding provider: '{other}'"
        ))),
    }
}

fn required_model(config: &EmbeddingConfig) -> Result<String, EmbeddingError> {
    config
        .model
        .clone()
        .ok_or_else(|| EmbeddingError::Config("embedding.model is required".into()))
}

fn required_dims(config: &EmbeddingConfig) -> Result<usize, EmbeddingError> {
    match config.dims {
        Some(dims) if dims > 0 => Ok(dims),
        _ => Err(EmbeddingError::Config("embedding.dims must be > 0".into())),
    }
}

fn build_client(timeout_secs: u64) -> Result<reqwest::Client, EmbeddingError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| EmbeddingError::Config(format!("failed to construct HTTP client: {e}")))
}

/// Verify a provider response against the batch size and dimensionality.
fn check_vectors(
    provider: &str,
    dims: usize,
    expected: usize,
    vectors: Vec<Vec<f32>>,
) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    if vectors.len() != expected {
        return Err(EmbeddingError::CountMismatch {
            provider: provider.to_string(),
            expected,
            actual: vectors.len(),
        });
    }
    for vector in &vectors {
        if vector.len() != dims {
            return Err(EmbeddingError::DimensionMismatch {
                expected: dims,
                actual: vector.len(),
            });
        }
    }
    Ok(vectors)
}

/// Exponential backoff delay before retry `attempt` (1-based).
fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1 << (attempt - 1).min(5))
}

// ============ OpenAI Provider ============

/// Embedding provider using the OpenAI embeddings API.
///
/// Calls `POST <base>/embeddings` with the configured model. Requires the
/// `OPENAI_API_KEY` environment variable.
pub struct OpenAiProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    dims: usize,
    max_attempts: u32,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    data: Vec<OpenAiEmbedding>,
}

#[derive(Deserialize)]
struct OpenAiEmbedding {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiProvider {
    /// Create a provider from configuration.
    ///
    /// Fails if `model`, `dims`, or `OPENAI_API_KEY` is missing.
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let model = required_model(config)?;
        let dims = required_dims(config)?;
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| EmbeddingError::Config("OPENAI_API_KEY not set".into()))?;
        let base = config
            .url
            .clone()
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string());

        Ok(Self {
            client: build_client(config.timeout_secs)?,
            endpoint: format!("{}/embeddings", base.trim_end_matches('/')),
            api_key,
            model,
            dims,
            max_attempts: config.max_attempts.max(1),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let mut last_err = String::new();

        for attempt in 0..self.max_attempts {
            if attempt > 0 {
                tokio::time::sleep(backoff_delay(attempt)).await;
            }

            let resp = self
                .client
                .post(&self.endpoint)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let parsed: OpenAiResponse = response.json().await.map_err(|e| {
                            EmbeddingError::Rejected {
                                provider: self.model.clone(),
                                message: format!("invalid response body: {e}"),
                            }
                        })?;
                        let mut data = parsed.data;
                        data.sort_by_key(|item| item.index);
                        let vectors = data.into_iter().map(|item| item.embedding).collect();
                        return check_vectors(&self.model, self.dims, texts.len(), vectors);
                    }

                    let message = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = format!("HTTP {status}: {message}");
                        continue;
                    }

                    return Err(EmbeddingError::Rejected {
                        provider: self.model.clone(),
                        message: format!("HTTP {status}: {message}"),
                    });
                }
                Err(e) => {
                    last_err = e.to_string();
                    continue;
                }
            }
        }

        Err(EmbeddingError::Exhausted {
            provider: self.model.clone(),
            attempts: self.max_attempts,
            message: last_err,
        })
    }
}

// ============ Ollama Provider ============

/// Embedding provider using a local Ollama instance — the local/dev
/// variant.
///
/// Calls `POST <url>/api/embed` (default `http://localhost:11434`).
pub struct OllamaProvider {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    dims: usize,
    max_attempts: u32,
}

#[derive(Deserialize)]
struct OllamaResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let model = required_model(config)?;
        let dims = required_dims(config)?;
        let base = config
            .url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434".to_string());

        Ok(Self {
            client: build_client(config.timeout_secs)?,
            endpoint: format!("{}/api/embed", base.trim_end_matches('/')),
            model,
            dims,
            max_attempts: config.max_attempts.max(1),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let mut last_err = String::new();

        for attempt in 0..self.max_attempts {
            if attempt > 0 {
                tokio::time::sleep(backoff_delay(attempt)).await;
            }

            let resp = self.client.post(&self.endpoint).json(&body).send().await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let parsed: OllamaResponse = response.json().await.map_err(|e| {
                            EmbeddingError::Rejected {
                                provider: self.model.clone(),
                                message: format!("invalid response body: {e}"),
                            }
                        })?;
                        return check_vectors(
                            &self.model,
                            self.dims,
                            texts.len(),
                            parsed.embeddings,
                        );
                    }

                    let message = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = format!("HTTP {status}: {message}");
                        continue;
                    }

                    return Err(EmbeddingError::Rejected {
                        provider: self.model.clone(),
                        message: format!("HTTP {status}: {message}"),
                    });
                }
                Err(e) => {
                    last_err = format!("connection error (is Ollama running?): {e}");
                    continue;
                }
            }
        }

        Err(EmbeddingError::Exhausted {
            provider: self.model.clone(),
            attempts: self.max_attempts,
            message: last_err,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn ollama_config(url: String, dims: usize) -> EmbeddingConfig {
        EmbeddingConfig {
            provider: "ollama".into(),
            model: Some("nomic-embed-text".into()),
            dims: Some(dims),
            url: Some(url),
            max_attempts: 1,
            timeout_secs: 5,
        }
    }

    #[tokio::test]
    async fn test_ollama_embeds_batch_in_order() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/embed");
                then.status(200).json_body(json!({
                    "embeddings": [[1.0, 0.0], [0.0, 1.0]]
                }));
            })
            .await;

        let provider = OllamaProvider::new(&ollama_config(server.base_url(), 2)).unwrap();
        let vectors = provider
            .embed_documents(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_fails_fast() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/embed");
                then.status(200)
                    .json_body(json!({"embeddings": [[1.0, 0.0, 0.0]]}));
            })
            .await;

        let provider = OllamaProvider::new(&ollama_config(server.base_url(), 2)).unwrap();
        let err = provider
            .embed_documents(&["a".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EmbeddingError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
    }

    #[tokio::test]
    async fn test_client_error_rejected_without_retry() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/api/embed");
                then.status(400).body("bad model");
            })
            .await;

        let mut config = ollama_config(server.base_url(), 2);
        config.max_attempts = 3;
        let provider = OllamaProvider::new(&config).unwrap();
        let err = provider
            .embed_documents(&["a".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, EmbeddingError::Rejected { .. }));
        assert_eq!(mock.hits_async().await, 1);
    }

    #[tokio::test]
    async fn test_server_error_exhausts_budget() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/api/embed");
                then.status(500).body("boom");
            })
            .await;

        let mut config = ollama_config(server.base_url(), 2);
        config.max_attempts = 2;
        let provider = OllamaProvider::new(&config).unwrap();
        let err = provider
            .embed_documents(&["a".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, EmbeddingError::Exhausted { attempts: 2, .. }));
        assert_eq!(mock.hits_async().await, 2);
    }

    #[tokio::test]
    async fn test_empty_batch_is_a_no_op() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/api/embed");
                then.status(200).json_body(json!({"embeddings": []}));
            })
            .await;

        let provider = OllamaProvider::new(&ollama_config(server.base_url(), 2)).unwrap();
        let vectors = provider.embed_documents(&[]).await.unwrap();
        assert!(vectors.is_empty());
        assert_eq!(mock.hits_async().await, 0);
    }
}
