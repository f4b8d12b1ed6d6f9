//! Error taxonomy for the ingestion and retrieval pipeline.
//!
//! Each external boundary has its own error type so callers can match on
//! the failure class: [`RetrievalError`] (remote fetch), [`EmbeddingError`]
//! (embedding provider), [`CodecError`] (archival encode/decode),
//! [`StoreError`] (durable vector store and object storage), and
//! [`ValidationError`] (malformed documents or queries). [`PipelineError`]
//! is the umbrella the orchestrator surfaces; nothing is swallowed or
//! downgraded on the way up.

use thiserror::Error;

/// Failure while fetching remote content through the reader endpoint.
///
/// A failed fetch never poisons the cache — only successful results are
/// stored.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// The upstream returned a non-success status.
    #[error("fetch of '{url}' failed with status {status}: {message}")]
    Status {
        url: String,
        status: u16,
        message: String,
    },

    /// The request could not be completed (connect, timeout, TLS).
    #[error("fetch of '{url}' failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The upstream answered 200 but the body did not match the expected
    /// reader envelope.
    #[error("fetch of '{url}' returned a malformed payload: {message}")]
    MalformedPayload { url: String, message: String },

    /// The HTTP client itself could not be constructed.
    #[error("failed to construct HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// Failure from an embedding provider.
///
/// Providers own their retry budget; [`EmbeddingError::Exhausted`] means
/// the budget ran out. Any embedding error aborts the enclosing ingest or
/// query before a single point is written.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// The provider is missing required configuration (model, dims, key).
    #[error("embedding provider misconfigured: {0}")]
    Config(String),

    /// A non-retryable rejection (4xx other than 429).
    #[error("embedding provider '{provider}' rejected the request: {message}")]
    Rejected { provider: String, message: String },

    /// All attempts failed (rate limits, server errors, network errors).
    #[error("embedding provider '{provider}' failed after {attempts} attempts: {message}")]
    Exhausted {
        provider: String,
        attempts: u32,
        message: String,
    },

    /// The provider returned a different number of vectors than inputs.
    #[error("embedding provider '{provider}' returned {actual} vectors for {expected} inputs")]
    CountMismatch {
        provider: String,
        expected: usize,
        actual: usize,
    },

    /// A returned vector does not match the configured dimensionality.
    #[error("embedding dimensionality mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Failure while encoding or decoding an archival record.
///
/// Decoders are strict: any mismatch is a data-corruption signal and no
/// partially populated record is ever returned.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    /// The buffer does not start with the expected magic bytes.
    #[error("archival buffer does not carry the expected magic bytes")]
    BadMagic,

    /// The buffer carries a schema version this build cannot decode.
    #[error("unsupported archival schema version {0}")]
    UnsupportedVersion(u16),

    /// The buffer ended before the record was complete.
    #[error("archival buffer truncated at offset {0}")]
    UnexpectedEof(usize),

    /// A string field is not valid UTF-8.
    #[error("archival field '{0}' is not valid UTF-8")]
    InvalidUtf8(&'static str),

    /// Bytes remain after the record was fully decoded.
    #[error("{0} trailing bytes after archival record")]
    TrailingBytes(usize),

    /// The decoded record holds values that cannot be rehydrated
    /// (e.g. a chunk id that is not a UUID).
    #[error("archived record is invalid: {0}")]
    InvalidRecord(String),
}

/// Failure from the durable vector store or the object-storage boundary.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend returned a non-success status.
    #[error("vector store request failed with status {status}: {message}")]
    Status { status: u16, message: String },

    /// The backend could not be reached after the retry budget.
    #[error("vector store unavailable: {0}")]
    Unavailable(String),

    /// The backend rejected the operation (bad collection, bad request).
    #[error("vector store rejected operation: {0}")]
    Rejected(String),

    /// A point's vector does not match the store's dimensionality.
    #[error("vector dimensionality mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A stored row could not be read back into a point.
    #[error("stored point is corrupt: {0}")]
    Corrupt(String),

    /// Embedded database error.
    #[error(transparent)]
    Database(#[from] sqlx::Error),

    /// Object-storage put/get failure.
    #[error("object storage operation failed for key '{key}': {message}")]
    Object { key: String, message: String },
}

/// The caller handed the pipeline something it cannot work with.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A retrieval request carried neither query text nor a vector.
    #[error("query has neither text nor a precomputed vector")]
    EmptyQuery,

    /// Document metadata does not identify its owner for its node type.
    #[error("document metadata is missing the '{0}' owner id")]
    MissingOwnerId(&'static str),

    /// An archival operation was requested but no object store is wired.
    #[error("object archive is not configured")]
    ArchiveNotConfigured,

    /// A URL ingest was requested but no fetch cache is wired.
    #[error("remote fetcher is not configured")]
    FetcherNotConfigured,
}

/// Umbrella error surfaced by the retrieval orchestrator.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}
