//! Remote content fetching through a reader endpoint, with an in-process
//! cache.
//!
//! The reader endpoint turns any public URL into clean JSON
//! (`GET <endpoint>/<url>` with `Accept: application/json`). Successful
//! results are cached in a capacity-bounded concurrent cache so repeated
//! ingestion of the same URL never refetches; failures are surfaced as
//! [`RetrievalError`] and never cached. Concurrent misses for the same URL
//! may each fetch — requests are not coalesced.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use serde::{Deserialize, Serialize};

use crate::config::ReaderConfig;
use crate::error::RetrievalError;

/// The cleaned result of fetching one URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchResult {
    pub url: String,
    pub title: String,
    pub content: String,
}

/// Reader endpoint response envelope: `{ code, status, data: { … } }`.
#[derive(Debug, Deserialize)]
struct ReaderEnvelope {
    data: Option<ReaderData>,
}

#[derive(Debug, Deserialize)]
struct ReaderData {
    url: Option<String>,
    title: Option<String>,
    content: Option<String>,
}

/// URL-keyed fetch cache over the reader endpoint.
///
/// Process-wide shared state: create once at startup with a fixed capacity
/// and share via `Arc`. The underlying cache evicts least-recently-used
/// entries once `cache_capacity` is reached and is safe for concurrent
/// readers and writers.
pub struct FetchCache {
    client: reqwest::Client,
    endpoint: String,
    cache: Cache<String, Arc<FetchResult>>,
}

impl FetchCache {
    pub fn new(config: &ReaderConfig) -> Result<Self, RetrievalError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(RetrievalError::Client)?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            cache: Cache::new(config.cache_capacity),
        })
    }

    /// Fetch `url` through the reader endpoint, returning the cached result
    /// when present.
    ///
    /// On a miss, a non-success upstream status or a body that does not
    /// match the reader envelope fails with [`RetrievalError`]; nothing is
    /// cached in that case.
    pub async fn fetch(&self, url: &str) -> Result<Arc<FetchResult>, RetrievalError> {
        if let Some(hit) = self.cache.get(url).await {
            tracing::debug!(url, "fetch cache hit");
            return Ok(hit);
        }

        let result = Arc::new(self.fetch_remote(url).await?);
        self.cache.insert(url.to_string(), result.clone()).await;
        Ok(result)
    }

    /// Number of cached entries (approximate under concurrency).
    pub fn len(&self) -> u64 {
        self.cache.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn fetch_remote(&self, url: &str) -> Result<FetchResult, RetrievalError> {
        let target = format!("{}/{}", self.endpoint, url);
        tracing::debug!(url, "fetching remote content");

        let response = self
            .client
            .get(&target)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|source| RetrievalError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RetrievalError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                message: message.chars().take(500).collect(),
            });
        }

        let envelope: ReaderEnvelope =
            response
                .json()
                .await
                .map_err(|e| RetrievalError::MalformedPayload {
                    url: url.to_string(),
                    message: e.to_string(),
                })?;

        let data = envelope.data.ok_or_else(|| RetrievalError::MalformedPayload {
            url: url.to_string(),
            message: "missing data object".to_string(),
        })?;

        let content = data.content.ok_or_else(|| RetrievalError::MalformedPayload {
            url: url.to_string(),
            message: "missing content field".to_string(),
        })?;

        Ok(FetchResult {
            url: data.url.unwrap_or_else(|| url.to_string()),
            title: data.title.unwrap_or_default(),
            content,
        })
    }
}
