//! Embedded SQLite [`VectorStore`] backend.
//!
//! Points live in a single `points` table: id, vector as a little-endian
//! f32 BLOB, payload as JSON text. Filters are evaluated in Rust against
//! the parsed payload, and similarity is computed in Rust over all
//! candidate vectors — the same brute-force approach the search path uses
//! elsewhere in the pipeline. Suitable for single-node deployments and
//! integration tests; the managed backend covers larger corpora.

use std::path::Path;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::StoreError;
use crate::filter::Filter;
use crate::models::{ContentPayload, ScoredPoint, VectorPoint};
use crate::vector::{blob_to_vec, cosine_similarity, vec_to_blob};

use super::VectorStore;

/// SQLite-backed vector store.
pub struct SqliteVectorStore {
    pool: SqlitePool,
    dims: usize,
}

impl SqliteVectorStore {
    /// Open (creating if missing) the database at `path` and ensure the
    /// schema exists. Idempotent.
    pub async fn open(path: &Path, dims: usize) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Unavailable(format!("cannot create data dir: {e}")))?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .map_err(StoreError::Database)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS points (
                id TEXT PRIMARY KEY,
                vector BLOB NOT NULL,
                payload TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool, dims })
    }

    fn decode_row(row: &sqlx::sqlite::SqliteRow) -> Result<VectorPoint, StoreError> {
        let id_text: String = row.get("id");
        let id = Uuid::parse_str(&id_text)
            .map_err(|e| StoreError::Corrupt(format!("point id '{id_text}': {e}")))?;

        let blob: Vec<u8> = row.get("vector");
        let payload_text: String = row.get("payload");
        let payload: ContentPayload = serde_json::from_str(&payload_text)
            .map_err(|e| StoreError::Corrupt(format!("payload for point {id}: {e}")))?;

        Ok(VectorPoint {
            id,
            vector: blob_to_vec(&blob),
            payload,
        })
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn upsert(&self, points: Vec<VectorPoint>) -> Result<(), StoreError> {
        for point in &points {
            if point.vector.len() != self.dims {
                return Err(StoreError::DimensionMismatch {
                    expected: self.dims,
                    actual: point.vector.len(),
                });
            }
        }

        let mut tx = self.pool.begin().await?;
        for point in &points {
            let payload = serde_json::to_string(&point.payload)
                .map_err(|e| StoreError::Rejected(format!("unserializable payload: {e}")))?;
            sqlx::query(
                r#"
                INSERT INTO points (id, vector, payload) VALUES (?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    vector = excluded.vector,
                    payload = excluded.payload
                "#,
            )
            .bind(point.id.to_string())
            .bind(vec_to_blob(&point.vector))
            .bind(payload)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn delete(&self, filter: &Filter) -> Result<(), StoreError> {
        let rows = sqlx::query("SELECT id, payload FROM points")
            .fetch_all(&self.pool)
            .await?;

        let mut doomed: Vec<String> = Vec::new();
        for row in &rows {
            let payload_text: String = row.get("payload");
            let payload: serde_json::Value = serde_json::from_str(&payload_text)
                .map_err(|e| StoreError::Corrupt(format!("payload: {e}")))?;
            if filter.matches(&payload) {
                doomed.push(row.get("id"));
            }
        }

        let mut tx = self.pool.begin().await?;
        for id in &doomed {
            sqlx::query("DELETE FROM points WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
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

        let rows = sqlx::query("SELECT id, vector, payload FROM points")
            .fetch_all(&self.pool)
            .await?;

        let mut hits = Vec::new();
        for row in &rows {
            let point = Self::decode_row(row)?;
            let payload = serde_json::to_value(&point.payload)
                .map_err(|e| StoreError::Corrupt(format!("payload: {e}")))?;
            if !filter.matches(&payload) {
                continue;
            }
            let score = cosine_similarity(vector, &point.vector);
            hits.push(ScoredPoint { point, score });
        }

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(top_k);
        Ok(hits)
    }
}
