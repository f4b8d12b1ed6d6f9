//! In-process, per-run similarity index.
//!
//! [`EphemeralIndex`] holds embedded documents in memory for short-lived
//! exploratory retrieval (scratch workspaces), as distinct from the durable
//! path. It is rebuilt per process lifetime and has no persistence.
//!
//! Concurrent `add` and `search` may interleave — a search is not
//! guaranteed to see a concurrently added document, only documents added
//! before it on the same call path. The index itself is never corrupted by
//! concurrent use.

use std::sync::{Arc, RwLock};

use crate::embedding::EmbeddingProvider;
use crate::error::EmbeddingError;
use crate::models::Document;
use crate::vector::cosine_similarity;

struct IndexEntry {
    document: Document,
    vector: Vec<f32>,
}

/// Brute-force cosine-similarity index over in-memory documents.
pub struct EphemeralIndex {
    provider: Arc<dyn EmbeddingProvider>,
    entries: RwLock<Vec<IndexEntry>>,
}

impl EphemeralIndex {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            provider,
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Embed and index a batch of documents.
    ///
    /// The whole batch is embedded in one provider call; on failure nothing
    /// is added.
    pub async fn add(&self, documents: Vec<Document>) -> Result<(), EmbeddingError> {
        if documents.is_empty() {
            return Ok(());
        }

        let texts: Vec<String> = documents.iter().map(|d| d.content.clone()).collect();
        let vectors = self.provider.embed_documents(&texts).await?;

        let mut entries = self.entries.write().unwrap();
        for (document, vector) in documents.into_iter().zip(vectors) {
            entries.push(IndexEntry { document, vector });
        }
        Ok(())
    }

    /// Return up to `k` documents most similar to `query`, filtered to
    /// those satisfying `predicate`, ranked by similarity descending.
    pub async fn search<F>(
        &self,
        query: &str,
        k: usize,
        predicate: F,
    ) -> Result<Vec<Document>, EmbeddingError>
    where
        F: Fn(&Document) -> bool,
    {
        let query_vec = self.provider.embed_query(query).await?;

        let entries = self.entries.read().unwrap();
        let mut scored: Vec<(f32, &Document)> = entries
            .iter()
            .filter(|entry| predicate(&entry.document))
            .map(|entry| {
                (
                    cosine_similarity(&query_vec, &entry.vector),
                    &entry.document,
                )
            })
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(_, doc)| doc.clone())
            .collect())
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
