//! End-to-end pipeline scenarios over the in-memory backends.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use recall::embedding::EmbeddingProvider;
use recall::engine::RetrievalEngine;
use recall::error::{EmbeddingError, PipelineError};
use recall::models::{
    Document, DocumentMetadata, NodeType, OwnerKind, SearchFilter, SearchRequest,
};
use recall::object_store::MemoryObjectStore;
use recall::store::memory::MemoryVectorStore;

const DIMS: usize = 8;

/// Deterministic embedder: each text maps to a byte-class histogram, so
/// equal texts embed identically and similar texts overlap.
struct HashEmbedder {
    calls: AtomicUsize,
}

impl HashEmbedder {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    fn embed_one(text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; DIMS];
        for &b in text.as_bytes() {
            v[(b as usize) % DIMS] += 1.0;
        }
        v
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    fn model_name(&self) -> &str {
        "hash-test"
    }
    fn dims(&self) -> usize {
        DIMS
    }
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| Self::embed_one(t)).collect())
    }
}

/// An embedder that always fails, for abort-path tests.
struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    fn model_name(&self) -> &str {
        "failing-test"
    }
    fn dims(&self) -> usize {
        DIMS
    }
    async fn embed_documents(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Err(EmbeddingError::Exhausted {
            provider: "failing-test".into(),
            attempts: 3,
            message: "synthetic outage".into(),
        })
    }
}

fn engine_over(
    provider: Arc<dyn EmbeddingProvider>,
    store: Arc<MemoryVectorStore>,
) -> RetrievalEngine {
    RetrievalEngine::new(provider, store, 1000, 12)
}

fn note(content: impl Into<String>, note_id: &str) -> Document {
    Document {
        content: content.into(),
        metadata: DocumentMetadata {
            node_type: NodeType::Note,
            note_id: Some(note_id.into()),
            ..Default::default()
        },
    }
}

fn resource(content: impl Into<String>, resource_id: &str) -> Document {
    Document {
        content: content.into(),
        metadata: DocumentMetadata {
            node_type: NodeType::Resource,
            resource_id: Some(resource_id.into()),
            ..Default::default()
        },
    }
}

fn query(text: &str, filter: Option<SearchFilter>) -> SearchRequest {
    SearchRequest {
        query: text.into(),
        vector: None,
        filter,
    }
}

#[tokio::test]
async fn test_ingest_then_retrieve() {
    let store = Arc::new(MemoryVectorStore::new(DIMS));
    let engine = engine_over(Arc::new(HashEmbedder::new()), store.clone());

    let document = note("A".repeat(1200), "n1");
    let receipt = engine.ingest("u1", &document).await.unwrap();
    assert!(receipt.chunks >= 2, "1200 chars must yield >= 2 chunks");
    assert!(receipt.size_bytes > 0);
    assert_eq!(store.len(), receipt.chunks);

    let results = engine
        .retrieve(
            "u1",
            &query(
                "A",
                Some(SearchFilter {
                    note_ids: vec!["n1".into()],
                    ..Default::default()
                }),
            ),
        )
        .await
        .unwrap();

    assert!(!results.is_empty());
    for payload in &results {
        assert_eq!(payload.tenant_id, "u1");
        assert_eq!(payload.metadata.note_id.as_deref(), Some("n1"));
    }
}

#[tokio::test]
async fn test_cross_tenant_leak_prevention() {
    let store = Arc::new(MemoryVectorStore::new(DIMS));
    let engine = engine_over(Arc::new(HashEmbedder::new()), store.clone());

    let content = "Shared secret knowledge about deployments.";
    engine.ingest("u1", &note(content, "n1")).await.unwrap();
    assert!(store.len() > 0);

    // Identical query text, different tenant, no filter at all.
    let results = engine.retrieve("u2", &query(content, None)).await.unwrap();
    assert!(
        results.is_empty(),
        "u2 must never see u1's points, got {results:?}"
    );
}

#[tokio::test]
async fn test_delete_scoping_leaves_other_owners() {
    let store = Arc::new(MemoryVectorStore::new(DIMS));
    let engine = engine_over(Arc::new(HashEmbedder::new()), store.clone());

    engine
        .ingest("u1", &resource("First resource body.", "r1"))
        .await
        .unwrap();
    engine
        .ingest("u1", &resource("Second resource body.", "r2"))
        .await
        .unwrap();

    engine
        .delete_by_owner("u1", OwnerKind::Resource, "r1")
        .await
        .unwrap();

    let r1_hits = engine
        .retrieve(
            "u1",
            &query(
                "resource body",
                Some(SearchFilter {
                    resource_ids: vec!["r1".into()],
                    ..Default::default()
                }),
            ),
        )
        .await
        .unwrap();
    assert!(r1_hits.is_empty());

    let r2_hits = engine
        .retrieve(
            "u1",
            &query(
                "resource body",
                Some(SearchFilter {
                    resource_ids: vec!["r2".into()],
                    ..Default::default()
                }),
            ),
        )
        .await
        .unwrap();
    assert!(!r2_hits.is_empty());
}

#[tokio::test]
async fn test_embedding_failure_aborts_before_any_write() {
    let store = Arc::new(MemoryVectorStore::new(DIMS));
    let engine = engine_over(Arc::new(FailingEmbedder), store.clone());

    let err = engine
        .ingest("u1", &note("Some content.", "n1"))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Embedding(_)));
    assert_eq!(store.len(), 0, "no point may reach the store");
}

#[tokio::test]
async fn test_reingest_overwrites_instead_of_duplicating() {
    let store = Arc::new(MemoryVectorStore::new(DIMS));
    let engine = engine_over(Arc::new(HashEmbedder::new()), store.clone());

    engine
        .ingest("u1", &note("original wording", "n1"))
        .await
        .unwrap();
    engine
        .ingest("u1", &note("revised wording", "n1"))
        .await
        .unwrap();

    assert_eq!(store.len(), 1, "same (document, sequence) must overwrite");

    let results = engine
        .retrieve(
            "u1",
            &query(
                "wording",
                Some(SearchFilter {
                    note_ids: vec!["n1".into()],
                    ..Default::default()
                }),
            ),
        )
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].content, "revised wording");
}

#[tokio::test]
async fn test_empty_document_is_a_noop() {
    let store = Arc::new(MemoryVectorStore::new(DIMS));
    let engine = engine_over(Arc::new(HashEmbedder::new()), store.clone());

    let receipt = engine.ingest("u1", &note("   ", "n1")).await.unwrap();
    assert_eq!(receipt.chunks, 0);
    assert_eq!(receipt.size_bytes, 0);
    assert_eq!(store.len(), 0);
}

#[tokio::test]
async fn test_document_without_owner_id_is_rejected() {
    let store = Arc::new(MemoryVectorStore::new(DIMS));
    let engine = engine_over(Arc::new(HashEmbedder::new()), store.clone());

    let document = Document {
        content: "text".into(),
        metadata: DocumentMetadata {
            node_type: NodeType::Note,
            ..Default::default()
        },
    };
    let err = engine.ingest("u1", &document).await.unwrap_err();
    assert!(matches!(err, PipelineError::Validation(_)));
}

#[tokio::test]
async fn test_query_without_text_or_vector_is_rejected() {
    let store = Arc::new(MemoryVectorStore::new(DIMS));
    let engine = engine_over(Arc::new(HashEmbedder::new()), store.clone());

    let err = engine.retrieve("u1", &query("  ", None)).await.unwrap_err();
    assert!(matches!(err, PipelineError::Validation(_)));
}

#[tokio::test]
async fn test_archive_then_restore_skips_embedding() {
    let objects = Arc::new(MemoryObjectStore::new());

    // Ingest with archival enabled.
    let store = Arc::new(MemoryVectorStore::new(DIMS));
    let engine = engine_over(Arc::new(HashEmbedder::new()), store.clone())
        .with_archive(objects.clone(), "cold/");
    let receipt = engine
        .ingest("u1", &note("Archived body text. More text here.", "n1"))
        .await
        .unwrap();

    // Restore into a fresh store with an embedder that cannot run: the
    // vectors must come from the archive.
    let fresh_store = Arc::new(MemoryVectorStore::new(DIMS));
    let restorer = engine_over(Arc::new(FailingEmbedder), fresh_store.clone())
        .with_archive(objects, "cold/");
    let restored = restorer.restore("u1", "n1").await.unwrap();

    assert_eq!(restored.chunks, receipt.chunks);
    assert_eq!(fresh_store.len(), receipt.chunks);

    // Retrieval with a caller-supplied vector also avoids the embedder.
    let request = SearchRequest {
        query: String::new(),
        vector: Some(vec![1.0; DIMS]),
        filter: Some(SearchFilter {
            note_ids: vec!["n1".into()],
            ..Default::default()
        }),
    };
    let results = restorer.retrieve("u1", &request).await.unwrap();
    assert!(!results.is_empty());
    assert_eq!(results[0].metadata.note_id.as_deref(), Some("n1"));
}

#[tokio::test]
async fn test_ingest_url_pulls_through_reader() {
    use httpmock::prelude::*;
    use recall::config::ReaderConfig;
    use recall::fetch::FetchCache;

    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/https://example.com/article");
            then.status(200).json_body(serde_json::json!({
                "code": 200,
                "data": {
                    "url": "https://example.com/article",
                    "title": "An Article",
                    "content": "Fetched article body."
                }
            }));
        })
        .await;

    let fetcher = FetchCache::new(&ReaderConfig {
        endpoint: server.base_url(),
        cache_capacity: 16,
        timeout_secs: 5,
    })
    .unwrap();

    let store = Arc::new(MemoryVectorStore::new(DIMS));
    let engine = engine_over(Arc::new(HashEmbedder::new()), store.clone())
        .with_fetcher(Arc::new(fetcher));

    let metadata = DocumentMetadata {
        node_type: NodeType::Resource,
        resource_id: Some("r1".into()),
        ..Default::default()
    };
    let receipt = engine
        .ingest_url("u1", "https://example.com/article", metadata)
        .await
        .unwrap();
    assert_eq!(receipt.chunks, 1);

    let results = engine
        .retrieve("u1", &query("article body", None))
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].content, "Fetched article body.");
    assert_eq!(
        results[0].metadata.url.as_deref(),
        Some("https://example.com/article")
    );
    assert_eq!(results[0].metadata.title.as_deref(), Some("An Article"));
}

#[tokio::test]
async fn test_batched_embedding_single_call_per_document() {
    let store = Arc::new(MemoryVectorStore::new(DIMS));
    let embedder = Arc::new(HashEmbedder::new());
    let engine = engine_over(embedder.clone(), store);

    let text = "One. ".repeat(600); // several chunks
    engine.ingest("u1", &note(text, "n1")).await.unwrap();
    assert_eq!(
        embedder.calls.load(Ordering::SeqCst),
        1,
        "all chunks must be embedded in one batch call"
    );
}
