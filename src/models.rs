//! Core data models used throughout the pipeline.
//!
//! These types represent the documents, chunks, and vector points that flow
//! through ingestion and retrieval, plus the request/response shapes of the
//! hybrid search boundary. Wire-facing types serialize in camelCase to match
//! the payload schema stored in the vector database.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The kind of node a document belongs to in the owning product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Note,
    Resource,
    #[default]
    Other,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Note => "note",
            NodeType::Resource => "resource",
            NodeType::Other => "other",
        }
    }
}

/// Metadata attached to a document at ingestion time.
///
/// Exactly one of `note_id` / `resource_id` is populated depending on
/// `node_type`; any additional fields supplied by the caller are carried
/// through to the stored payload untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    #[serde(default)]
    pub node_type: NodeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A raw document handed to the pipeline. Ephemeral: constructed by the
/// caller, consumed by ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    #[serde(default)]
    pub metadata: DocumentMetadata,
}

impl Document {
    /// The identity this document is indexed under: `note_id` for notes,
    /// `resource_id` for resources, the source URL otherwise.
    pub fn identity(&self) -> Option<&str> {
        match self.metadata.node_type {
            NodeType::Note => self.metadata.note_id.as_deref(),
            NodeType::Resource => self.metadata.resource_id.as_deref(),
            NodeType::Other => self.metadata.url.as_deref(),
        }
    }
}

/// A bounded slice of a document's text — the unit of embedding and storage.
///
/// `start`/`end` are byte offsets into the original content (always on
/// `char` boundaries). Spans are non-overlapping and monotonically
/// increasing; concatenating them reconstructs the input exactly.
/// `content` is the trimmed text of the span.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub content: String,
    pub start: usize,
    pub end: usize,
    pub sequence: u32,
    pub source_document_id: String,
}

/// The payload stored alongside every vector: the document metadata plus
/// the tenant stamp, chunk sequence, and chunk text.
///
/// `tenant_id` is always set by the orchestrator from the authenticated
/// caller — never from caller-supplied metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentPayload {
    pub tenant_id: String,
    pub sequence: u32,
    pub content: String,
    #[serde(flatten)]
    pub metadata: DocumentMetadata,
}

/// One stored unit in the durable vector store.
///
/// The id is deterministically derived from `(document_id, sequence)`, so
/// re-ingesting the same chunk replaces the prior point rather than
/// duplicating it.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorPoint {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub payload: ContentPayload,
}

/// Derive the stable point id for a `(document_id, sequence)` pair.
pub fn point_id(document_id: &str, sequence: u32) -> Uuid {
    Uuid::new_v5(
        &Uuid::NAMESPACE_OID,
        format!("{document_id}:{sequence}").as_bytes(),
    )
}

/// A search hit: the stored point plus its similarity score.
#[derive(Debug, Clone)]
pub struct ScoredPoint {
    pub point: VectorPoint,
    pub score: f32,
}

/// Metadata facets of a hybrid search request. Each populated list is an
/// independent "any of these values" condition; facets are conjoined with
/// AND.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchFilter {
    pub node_types: Vec<NodeType>,
    pub urls: Vec<String>,
    pub note_ids: Vec<String>,
    pub resource_ids: Vec<String>,
    pub collection_ids: Vec<String>,
}

/// A hybrid search request: query text (embedded on demand), an optional
/// precomputed vector, and optional metadata facets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    #[serde(default)]
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector: Option<Vec<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<SearchFilter>,
}

/// Which owner-id field a scoped delete targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerKind {
    Note,
    Resource,
}

impl OwnerKind {
    /// The payload key the owner id lives under.
    pub fn payload_key(&self) -> &'static str {
        match self {
            OwnerKind::Note => "noteId",
            OwnerKind::Resource => "resourceId",
        }
    }
}

/// What an ingest call produced: chunk count and the estimated storage
/// footprint, for quota accounting by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestReceipt {
    pub size_bytes: usize,
    pub chunks: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_id_deterministic() {
        let a = point_id("doc-1", 0);
        let b = point_id("doc-1", 0);
        assert_eq!(a, b);
    }

    #[test]
    fn test_point_id_distinct_per_sequence() {
        assert_ne!(point_id("doc-1", 0), point_id("doc-1", 1));
        assert_ne!(point_id("doc-1", 0), point_id("doc-2", 0));
    }

    #[test]
    fn test_payload_wire_shape_is_camel_case() {
        let payload = ContentPayload {
            tenant_id: "u1".into(),
            sequence: 3,
            content: "hello".into(),
            metadata: DocumentMetadata {
                node_type: NodeType::Note,
                note_id: Some("n1".into()),
                ..Default::default()
            },
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["tenantId"], "u1");
        assert_eq!(value["sequence"], 3);
        assert_eq!(value["nodeType"], "note");
        assert_eq!(value["noteId"], "n1");
        assert!(value.get("resourceId").is_none());
    }

    #[test]
    fn test_search_request_accepts_partial_filter() {
        let request: SearchRequest =
            serde_json::from_str(r#"{"query":"rust","filter":{"noteIds":["n1","n2"]}}"#).unwrap();
        let filter = request.filter.unwrap();
        assert_eq!(filter.note_ids, vec!["n1", "n2"]);
        assert!(filter.urls.is_empty());
    }

    #[test]
    fn test_document_identity_follows_node_type() {
        let doc = Document {
            content: "x".into(),
            metadata: DocumentMetadata {
                node_type: NodeType::Resource,
                note_id: Some("n1".into()),
                resource_id: Some("r1".into()),
                ..Default::default()
            },
        };
        assert_eq!(doc.identity(), Some("r1"));
    }
}
