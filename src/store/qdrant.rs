//! Managed vector-database [`VectorStore`] backend.
//!
//! Speaks the Qdrant REST API directly over `reqwest` — the filter grammar
//! in [`crate::filter`] serializes to the wire shape verbatim, so no client
//! library is needed. An optional API key is read from the
//! `QDRANT_API_KEY` environment variable.
//!
//! Transient failures (HTTP 429, 5xx, network errors) are retried with
//! exponential backoff up to the configured attempt budget; other client
//! errors fail immediately.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::filter::Filter;
use crate::models::{ContentPayload, ScoredPoint, VectorPoint};

use super::VectorStore;

/// Vector store backed by a Qdrant deployment.
pub struct QdrantStore {
    client: reqwest::Client,
    base_url: String,
    collection: String,
    api_key: Option<String>,
    dims: usize,
    max_attempts: u32,
}

impl QdrantStore {
    pub fn new(config: &StoreConfig, dims: usize) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| StoreError::Unavailable(format!("failed to construct HTTP client: {e}")))?;

        let base_url = config
            .url
            .clone()
            .unwrap_or_else(|| "http://localhost:6333".to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            client,
            base_url,
            collection: config.collection.clone(),
            api_key: std::env::var("QDRANT_API_KEY").ok(),
            dims,
            max_attempts: config.max_attempts.max(1),
        })
    }

    /// Create the collection with the configured dimensionality if it does
    /// not exist yet. Idempotent.
    pub async fn ensure_collection(&self) -> Result<(), StoreError> {
        let path = format!("collections/{}", self.collection);
        match self.request(reqwest::Method::GET, &path, None).await {
            Ok(_) => return Ok(()),
            Err(StoreError::Status { status: 404, .. }) => {}
            Err(e) => return Err(e),
        }

        let body = json!({
            "vectors": { "size": self.dims, "distance": "Cosine" }
        });
        self.request(reqwest::Method::PUT, &path, Some(&body))
            .await?;
        tracing::info!(collection = %self.collection, dims = self.dims, "created collection");
        Ok(())
    }

    /// Send one API request with the retry/backoff policy, returning the
    /// parsed JSON body.
    async fn request(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, StoreError> {
        let url = format!("{}/{}", self.base_url, path);
        let mut last_err = String::new();

        for attempt in 0..self.max_attempts {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let mut builder = self.client.request(method.clone(), &url);
            if let Some(key) = &self.api_key {
                builder = builder.header("api-key", key);
            }
            if let Some(body) = body {
                builder = builder.json(body);
            }

            match builder.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return response.json::<Value>().await.map_err(|e| {
                            StoreError::Rejected(format!("invalid response body: {e}"))
                        });
                    }

                    let message = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = format!("HTTP {status}: {message}");
                        continue;
                    }

                    return Err(StoreError::Status {
                        status: status.as_u16(),
                        message: message.chars().take(500).collect(),
                    });
                }
                Err(e) => {
                    last_err = e.to_string();
                    continue;
                }
            }
        }

        Err(StoreError::Unavailable(format!(
            "{url} failed after {} attempts: {last_err}",
            self.max_attempts
        )))
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn upsert(&self, points: Vec<VectorPoint>) -> Result<(), StoreError> {
        if points.is_empty() {
            return Ok(());
        }
        for point in &points {
            if point.vector.len() != self.dims {
                return Err(StoreError::DimensionMismatch {
                    expected: self.dims,
                    actual: point.vector.len(),
                });
            }
        }

        let wire_points: Vec<Value> = points
            .iter()
            .map(|p| {
                Ok(json!({
                    "id": p.id.to_string(),
                    "vector": p.vector,
                    "payload": serde_json::to_value(&p.payload)
                        .map_err(|e| StoreError::Rejected(format!("unserializable payload: {e}")))?,
                }))
            })
            .collect::<Result<_, StoreError>>()?;

        let path = format!("collections/{}/points?wait=true", self.collection);
        self.request(
            reqwest::Method::PUT,
            &path,
            Some(&json!({ "points": wire_points })),
        )
        .await?;
        Ok(())
    }

    async fn delete(&self, filter: &Filter) -> Result<(), StoreError> {
        let path = format!("collections/{}/points/delete?wait=true", self.collection);
        let filter_value = serde_json::to_value(filter)
            .map_err(|e| StoreError::Rejected(format!("unserializable filter: {e}")))?;
        self.request(
            reqwest::Method::POST,
            &path,
            Some(&json!({ "filter": filter_value })),
        )
        .await?;
        Ok(())
    }

    async fn search(
        &self,
        vector: &[f32],
        filter: &Filter,
        top_k: usize,
    ) -> Result<Vec<ScoredPoint>, StoreError> {
        if vector.len() != self.dims {
            return Err(StoreError::DimensionMismatch {
                expected: self.dims,
                actual: vector.len(),
            });
        }

        let path = format!("collections/{}/points/search", self.collection);
        let filter_value = serde_json::to_value(filter)
            .map_err(|e| StoreError::Rejected(format!("unserializable filter: {e}")))?;
        let body = json!({
            "vector": vector,
            "filter": filter_value,
            "limit": top_k,
            "with_payload": true,
            "with_vector": true,
        });

        let response = self
            .request(reqwest::Method::POST, &path, Some(&body))
            .await?;

        let hits = response
            .get("result")
            .and_then(|r| r.as_array())
            .ok_or_else(|| StoreError::Rejected("missing result array".into()))?;

        let mut results = Vec::with_capacity(hits.len());
        for hit in hits {
            let id_text = hit
                .get("id")
                .and_then(|v| v.as_str())
                .ok_or_else(|| StoreError::Corrupt("hit missing string id".into()))?;
            let id = Uuid::parse_str(id_text)
                .map_err(|e| StoreError::Corrupt(format!("point id '{id_text}': {e}")))?;

            let score = hit
                .get("score")
                .and_then(|v| v.as_f64())
                .ok_or_else(|| StoreError::Corrupt("hit missing score".into()))?
                as f32;

            let payload: ContentPayload = hit
                .get("payload")
                .cloned()
                .map(serde_json::from_value)
                .transpose()
                .map_err(|e| StoreError::Corrupt(format!("payload for point {id}: {e}")))?
                .ok_or_else(|| StoreError::Corrupt(format!("point {id} has no payload")))?;

            let vector = hit
                .get("vector")
                .and_then(|v| v.as_array())
                .map(|values| {
                    values
                        .iter()
                        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
                        .collect::<Vec<f32>>()
                })
                .unwrap_or_default();

            results.push(ScoredPoint {
                point: VectorPoint {
                    id,
                    vector,
                    payload,
                },
                score,
            });
        }

        Ok(results)
    }
}
