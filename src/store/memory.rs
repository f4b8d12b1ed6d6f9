//! In-memory [`VectorStore`] implementation for development and tests.
//!
//! Uses a `HashMap` behind `std::sync::RwLock` for thread safety. Search is
//! brute-force cosine similarity over all stored points.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StoreError;
use crate::filter::Filter;
use crate::models::{ScoredPoint, VectorPoint};
use crate::vector::cosine_similarity;

use super::VectorStore;

/// In-memory store keyed by point id.
pub struct MemoryVectorStore {
    dims: usize,
    points: RwLock<HashMap<Uuid, VectorPoint>>,
}

impl MemoryVectorStore {
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            points: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored points.
    pub fn len(&self) -> usize {
        self.points.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn upsert(&self, points: Vec<VectorPoint>) -> Result<(), StoreError> {
        for point in &points {
            if point.vector.len() != self.dims {
                return Err(StoreError::DimensionMismatch {
                    expected: self.dims,
                    actual: point.vector.len(),
                });
            }
        }

        let mut stored = self.points.write().unwrap();
        for point in points {
            stored.insert(point.id, point);
        }
        Ok(())
    }

    async fn delete(&self, filter: &Filter) -> Result<(), StoreError> {
        let mut stored = self.points.write().unwrap();
        stored.retain(|_, point| {
            serde_json::to_value(&point.payload)
                .map(|payload| !filter.matches(&payload))
                .unwrap_or(true)
        });
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

        let stored = self.points.read().unwrap();
        let mut hits: Vec<ScoredPoint> = stored
            .values()
            .filter(|point| {
                serde_json::to_value(&point.payload)
                    .map(|payload| filter.matches(&payload))
                    .unwrap_or(false)
            })
            .map(|point| ScoredPoint {
                point: point.clone(),
                score: cosine_similarity(vector, &point.vector),
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(top_k);
        Ok(hits)
    }
}
