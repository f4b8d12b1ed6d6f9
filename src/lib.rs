//! # Recall
//!
//! A tenant-isolated content ingestion and hybrid retrieval pipeline.
//!
//! Recall turns raw documents (crawled pages, user notes, resources) into
//! searchable vector representations and answers similarity queries against
//! them with metadata filtering. Every stored point carries its tenant;
//! every query is scoped to the requesting tenant by construction.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────────┐   ┌───────────────┐
//! │ Fetch    │──▶│  Chunk + Embed   │──▶│ Vector Store  │
//! │ Cache    │   │  (one batch per  │   │ qdrant/sqlite │
//! └──────────┘   │   document)      │   └──────┬────────┘
//!                └────────┬─────────┘          │
//!                         │              ┌─────▼─────┐
//!                  ┌──────▼───────┐      │ Filtered  │
//!                  │ Archival     │      │ retrieval │
//!                  │ codec + S3   │      └───────────┘
//!                  └──────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`filter`] | Payload filter grammar |
//! | [`chunk`] | Span-preserving text chunking |
//! | [`fetch`] | Reader-endpoint fetch cache |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | Ephemeral in-process similarity index |
//! | [`store`] | Durable vector store abstraction |
//! | [`codec`] | Binary archival codec |
//! | [`object_store`] | Object-storage boundary |
//! | [`engine`] | Ingestion/retrieval orchestrator |

pub mod chunk;
pub mod codec;
pub mod config;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod filter;
pub mod index;
pub mod models;
pub mod object_store;
pub mod store;
pub mod vector;
