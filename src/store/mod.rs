//! Durable vector storage abstraction.
//!
//! The [`VectorStore`] trait defines the persistent, filterable vector
//! database the pipeline writes to, enabling pluggable backends:
//!
//! - [`qdrant::QdrantStore`] — managed vector database over its REST API
//! - [`sqlite::SqliteVectorStore`] — embedded, vectors as BLOBs
//! - [`memory::MemoryVectorStore`] — in-memory, for development and tests
//!
//! Implementations must be `Send + Sync` to work with async runtimes.
//! Upserts are idempotent by point id; batch-level atomicity is NOT
//! guaranteed (a mid-batch failure may leave some points written), which is
//! safe because deterministic ids make a full retry convergent.

pub mod memory;
pub mod qdrant;
pub mod sqlite;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::filter::Filter;
use crate::models::{ScoredPoint, VectorPoint};

/// Abstract persistent vector store.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`upsert`](VectorStore::upsert) | Insert or replace points by id |
/// | [`delete`](VectorStore::delete) | Delete all points matching a filter |
/// | [`search`](VectorStore::search) | Filtered nearest-neighbor search |
/// | [`estimate_size`](VectorStore::estimate_size) | Serialized footprint of points |
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or replace points. Idempotent per point id: re-upserting an
    /// id replaces the prior vector and payload. Per-point atomic only —
    /// batch atomicity is not guaranteed.
    async fn upsert(&self, points: Vec<VectorPoint>) -> Result<(), StoreError>;

    /// Delete every point whose payload matches the filter conjunction.
    async fn delete(&self, filter: &Filter) -> Result<(), StoreError>;

    /// Nearest-neighbor search constrained to points matching the filter,
    /// ranked by similarity descending, at most `top_k` results.
    async fn search(
        &self,
        vector: &[f32],
        filter: &Filter,
        top_k: usize,
    ) -> Result<Vec<ScoredPoint>, StoreError>;

    /// Estimated serialized footprint of `points` in bytes. Pure — no I/O,
    /// no side effects. Used for storage-quota accounting by callers.
    fn estimate_size(&self, points: &[VectorPoint]) -> usize {
        estimate_payload_size(points)
    }
}

/// Serialized JSON payload bytes plus raw vector bytes, per point.
pub fn estimate_payload_size(points: &[VectorPoint]) -> usize {
    points
        .iter()
        .map(|p| {
            let payload_bytes = serde_json::to_vec(&p.payload)
                .map(|b| b.len())
                .unwrap_or(0);
            payload_bytes + p.vector.len() * 4 + 16
        })
        .sum()
}

/// Create the configured [`VectorStore`] backend.
///
/// `dims` is the deployment-wide vector dimensionality; every backend
/// rejects writes that do not match it.
pub async fn create_store(
    config: &StoreConfig,
    dims: usize,
) -> Result<Arc<dyn VectorStore>, StoreError> {
    match config.backend.as_str() {
        "qdrant" => {
            let store = qdrant::QdrantStore::new(config, dims)?;
            store.ensure_collection().await?;
            Ok(Arc::new(store))
        }
        "sqlite" => Ok(Arc::new(
            sqlite::SqliteVectorStore::open(&config.path, dims).await?,
        )),
        "memory" => Ok(Arc::new(memory::MemoryVectorStore::new(dims))),
        other => Err(StoreError::Rejected(format!(
            "unknown store backend: '{other}'"
        ))),
    }
}
