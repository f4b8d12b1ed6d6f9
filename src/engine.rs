//! Retrieval orchestrator: the façade over fetching, chunking, embedding,
//! and storage.
//!
//! [`RetrievalEngine`] coordinates one logical task per request as a
//! sequential pipeline of suspension points (fetch → chunk → embed →
//! store); cancelling the owning request drops the future and abandons
//! in-flight I/O. Ingestion moves `Received → Chunked → Embedded → Stored`
//! with no externally observable intermediate state — a retry restarts
//! from the beginning, which is safe because point ids are deterministic.
//!
//! # Tenant isolation
//!
//! Every stored point is stamped with the caller's tenant id, and every
//! search or delete conjoins a tenant-equality condition built from the
//! authenticated caller — never from caller-supplied filters. No query can
//! return, and no delete can touch, another tenant's points.

use std::sync::Arc;

use crate::chunk::chunk_text;
use crate::codec::{self, ContentChunk, ContentChunks};
use crate::embedding::EmbeddingProvider;
use crate::error::{PipelineError, ValidationError};
use crate::fetch::FetchCache;
use crate::filter::{Condition, Filter};
use crate::models::{
    point_id, ContentPayload, Document, DocumentMetadata, IngestReceipt, NodeType, OwnerKind,
    SearchFilter, SearchRequest, VectorPoint,
};
use crate::object_store::ObjectStore;
use crate::store::VectorStore;

/// Where archival copies go: the object store plus a key prefix.
pub struct ArchiveSink {
    pub store: Arc<dyn ObjectStore>,
    pub prefix: String,
}

impl ArchiveSink {
    fn key(&self, tenant_id: &str, document_id: &str) -> String {
        format!("{}{}/{}.bin", self.prefix, tenant_id, document_id)
    }
}

/// The ingestion and retrieval façade.
///
/// Capabilities (embedding provider, vector store, optional fetcher and
/// archive) are injected at construction; concrete variants are selected
/// by deployment configuration.
pub struct RetrievalEngine {
    provider: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    fetcher: Option<Arc<FetchCache>>,
    archive: Option<ArchiveSink>,
    max_chunk_chars: usize,
    top_k: usize,
}

impl RetrievalEngine {
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        max_chunk_chars: usize,
        top_k: usize,
    ) -> Self {
        Self {
            provider,
            store,
            fetcher: None,
            archive: None,
            max_chunk_chars,
            top_k,
        }
    }

    /// Wire a fetch cache so [`ingest_url`](Self::ingest_url) can pull
    /// remote content.
    #[must_use]
    pub fn with_fetcher(mut self, fetcher: Arc<FetchCache>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Wire an object store for archival copies of ingested chunk sets.
    #[must_use]
    pub fn with_archive(mut self, store: Arc<dyn ObjectStore>, prefix: impl Into<String>) -> Self {
        self.archive = Some(ArchiveSink {
            store,
            prefix: prefix.into(),
        });
        self
    }

    /// Chunk, embed, and store a document for `tenant_id`.
    ///
    /// The whole chunk batch is embedded in one provider call; if embedding
    /// fails, nothing is written. If the upsert fails, the call fails as a
    /// whole — no compensation is attempted, and a retry is safe because
    /// re-ingesting the same `(document, sequence)` pairs overwrites rather
    /// than duplicates.
    pub async fn ingest(
        &self,
        tenant_id: &str,
        document: &Document,
    ) -> Result<IngestReceipt, PipelineError> {
        let document_id = document.identity().ok_or_else(|| {
            ValidationError::MissingOwnerId(match document.metadata.node_type {
                NodeType::Note => "noteId",
                NodeType::Resource => "resourceId",
                NodeType::Other => "url",
            })
        })?;

        tracing::debug!(tenant_id, document_id, "ingest received");

        let chunks = chunk_text(document_id, &document.content, self.max_chunk_chars);
        if chunks.is_empty() {
            return Ok(IngestReceipt {
                size_bytes: 0,
                chunks: 0,
            });
        }
        tracing::debug!(tenant_id, document_id, chunks = chunks.len(), "chunked");

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = self.provider.embed_documents(&texts).await?;
        tracing::debug!(tenant_id, document_id, "embedded");

        let points: Vec<VectorPoint> = chunks
            .iter()
            .zip(&vectors)
            .map(|(chunk, vector)| VectorPoint {
                id: point_id(document_id, chunk.sequence),
                vector: vector.clone(),
                payload: ContentPayload {
                    tenant_id: tenant_id.to_string(),
                    sequence: chunk.sequence,
                    content: chunk.content.clone(),
                    metadata: document.metadata.clone(),
                },
            })
            .collect();

        let size_bytes = self.store.estimate_size(&points);
        let chunk_count = points.len();
        self.store.upsert(points).await?;
        tracing::debug!(tenant_id, document_id, size_bytes, "stored");

        if let Some(archive) = &self.archive {
            let record = archive_record(document_id, &document.metadata, &chunks, &vectors);
            let key = archive.key(tenant_id, document_id);
            archive.store.put(&key, codec::encode(&record)).await?;
            tracing::debug!(tenant_id, document_id, key = %key, "archived");
        }

        Ok(IngestReceipt {
            size_bytes,
            chunks: chunk_count,
        })
    }

    /// Fetch `url` through the reader endpoint (cache permitting) and
    /// ingest the result for `tenant_id`.
    ///
    /// `metadata` supplies the node identity; the fetched URL and title
    /// fill any gaps.
    pub async fn ingest_url(
        &self,
        tenant_id: &str,
        url: &str,
        mut metadata: DocumentMetadata,
    ) -> Result<IngestReceipt, PipelineError> {
        let fetcher = self
            .fetcher
            .as_ref()
            .ok_or(ValidationError::FetcherNotConfigured)?;

        let fetched = fetcher.fetch(url).await?;
        if metadata.url.is_none() {
            metadata.url = Some(fetched.url.clone());
        }
        if metadata.title.is_none() && !fetched.title.is_empty() {
            metadata.title = Some(fetched.title.clone());
        }

        let document = Document {
            content: fetched.content.clone(),
            metadata,
        };
        self.ingest(tenant_id, &document).await
    }

    /// Delete every point belonging to `tenant_id` whose owner-id field
    /// matches.
    pub async fn delete_by_owner(
        &self,
        tenant_id: &str,
        kind: OwnerKind,
        owner_id: &str,
    ) -> Result<(), PipelineError> {
        let filter = Filter::new()
            .and(Condition::matches("tenantId", tenant_id))
            .and(Condition::matches(kind.payload_key(), owner_id));
        self.store.delete(&filter).await?;
        tracing::debug!(tenant_id, owner_id, key = kind.payload_key(), "deleted");
        Ok(())
    }

    /// Run a hybrid (vector + metadata-filter) query scoped to `tenant_id`.
    ///
    /// If the request carries no precomputed vector, the query text is
    /// embedded first; a request with neither fails validation. Results are
    /// payloads ranked by similarity descending; scores are internal.
    pub async fn retrieve(
        &self,
        tenant_id: &str,
        request: &SearchRequest,
    ) -> Result<Vec<ContentPayload>, PipelineError> {
        let vector = match &request.vector {
            Some(vector) if !vector.is_empty() => vector.clone(),
            _ => {
                if request.query.trim().is_empty() {
                    return Err(ValidationError::EmptyQuery.into());
                }
                self.provider.embed_query(&request.query).await?
            }
        };

        let filter = scoped_filter(tenant_id, request.filter.as_ref());
        let hits = self.store.search(&vector, &filter, self.top_k).await?;
        Ok(hits.into_iter().map(|hit| hit.point.payload).collect())
    }

    /// Rehydrate a document's points from its archival copy, without
    /// calling the embedding provider — the vectors travel inside the
    /// archive.
    pub async fn restore(
        &self,
        tenant_id: &str,
        document_id: &str,
    ) -> Result<IngestReceipt, PipelineError> {
        let archive = self
            .archive
            .as_ref()
            .ok_or(ValidationError::ArchiveNotConfigured)?;

        let key = archive.key(tenant_id, document_id);
        let bytes = archive.store.get(&key).await?;
        let record = codec::decode(&bytes)?;

        let points = record
            .chunks
            .iter()
            .enumerate()
            .map(|(sequence, chunk)| rehydrate_point(tenant_id, document_id, sequence as u32, chunk))
            .collect::<Result<Vec<_>, PipelineError>>()?;

        let size_bytes = self.store.estimate_size(&points);
        let chunk_count = points.len();
        self.store.upsert(points).await?;
        tracing::debug!(tenant_id, document_id, chunks = chunk_count, "restored");

        Ok(IngestReceipt {
            size_bytes,
            chunks: chunk_count,
        })
    }
}

/// Build the storage filter for a request: tenant equality first, then one
/// "any of" condition per populated facet, all conjoined.
fn scoped_filter(tenant_id: &str, facets: Option<&SearchFilter>) -> Filter {
    let mut filter = Filter::new().and(Condition::matches("tenantId", tenant_id));

    let Some(facets) = facets else {
        return filter;
    };

    if !facets.node_types.is_empty() {
        filter = filter.and(Condition::any_of(
            "nodeType",
            facets.node_types.iter().map(|t| t.as_str().into()),
        ));
    }
    if !facets.urls.is_empty() {
        filter = filter.and(any_of_strings("url", &facets.urls));
    }
    if !facets.note_ids.is_empty() {
        filter = filter.and(any_of_strings("noteId", &facets.note_ids));
    }
    if !facets.resource_ids.is_empty() {
        filter = filter.and(any_of_strings("resourceId", &facets.resource_ids));
    }
    if !facets.collection_ids.is_empty() {
        filter = filter.and(any_of_strings("collectionId", &facets.collection_ids));
    }

    filter
}

fn any_of_strings(key: &str, values: &[String]) -> Condition {
    Condition::any_of(key, values.iter().map(|v| v.as_str().into()))
}

fn archive_record(
    document_id: &str,
    metadata: &DocumentMetadata,
    chunks: &[crate::models::Chunk],
    vectors: &[Vec<f32>],
) -> ContentChunks {
    ContentChunks {
        chunks: chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| ContentChunk {
                id: point_id(document_id, chunk.sequence).to_string(),
                url: metadata.url.clone().unwrap_or_default(),
                kind: metadata.node_type.as_str().to_string(),
                title: metadata.title.clone().unwrap_or_default(),
                content: chunk.content.clone(),
                vector: vector.clone(),
            })
            .collect(),
    }
}

fn rehydrate_point(
    tenant_id: &str,
    document_id: &str,
    sequence: u32,
    chunk: &ContentChunk,
) -> Result<VectorPoint, PipelineError> {
    let node_type = match chunk.kind.as_str() {
        "note" => NodeType::Note,
        "resource" => NodeType::Resource,
        _ => NodeType::Other,
    };

    let metadata = DocumentMetadata {
        node_type,
        note_id: (node_type == NodeType::Note).then(|| document_id.to_string()),
        resource_id: (node_type == NodeType::Resource).then(|| document_id.to_string()),
        collection_id: None,
        url: (!chunk.url.is_empty()).then(|| chunk.url.clone()),
        title: (!chunk.title.is_empty()).then(|| chunk.title.clone()),
        extra: Default::default(),
    };

    Ok(VectorPoint {
        id: uuid::Uuid::parse_str(&chunk.id).map_err(|e| {
            crate::error::CodecError::InvalidRecord(format!("chunk id '{}': {e}", chunk.id))
        })?,
        vector: chunk.vector.clone(),
        payload: ContentPayload {
            tenant_id: tenant_id.to_string(),
            sequence,
            content: chunk.content.clone(),
            metadata,
        },
    })
}
