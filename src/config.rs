//! TOML configuration parsing and validation.
//!
//! All pipeline settings live in one file: the reader endpoint and cache,
//! chunking, the embedding provider, the vector-store backend, retrieval
//! limits, and the optional object-storage archive. [`load_config`] rejects
//! invalid values eagerly so misconfiguration fails at startup, not
//! mid-ingest.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub reader: ReaderConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub archive: Option<ArchiveConfig>,
}

/// Remote-fetch settings: the reader endpoint that turns a URL into clean
/// JSON content, plus the in-process cache bound.
#[derive(Debug, Deserialize, Clone)]
pub struct ReaderConfig {
    #[serde(default = "default_reader_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            endpoint: default_reader_endpoint(),
            cache_capacity: default_cache_capacity(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_reader_endpoint() -> String {
    "https://r.jina.ai".to_string()
}
fn default_cache_capacity() -> u64 {
    1000
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
        }
    }
}

fn default_max_chars() -> usize {
    crate::chunk::DEFAULT_MAX_CHARS
}

/// Embedding provider selection and limits.
///
/// `provider` is `"openai"` (cloud) or `"ollama"` (local). `model` and
/// `dims` are required; `url` overrides the provider's default endpoint.
#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            url: None,
            max_attempts: default_max_attempts(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_provider() -> String {
    "openai".to_string()
}
fn default_max_attempts() -> u32 {
    3
}

/// Durable vector store backend selection.
///
/// `backend` is `"qdrant"` (managed), `"sqlite"` (embedded), or `"memory"`
/// (dev/test). The Qdrant API key, when needed, is read from the
/// `QDRANT_API_KEY` environment variable.
#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_store_backend")]
    pub backend: String,
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            path: default_store_path(),
            url: None,
            collection: default_collection(),
            max_attempts: default_max_attempts(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_store_backend() -> String {
    "sqlite".to_string()
}
fn default_store_path() -> PathBuf {
    PathBuf::from("./data/recall.sqlite")
}
fn default_collection() -> String {
    "content".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    12
}

/// Object-storage archive for cold copies of ingested chunk sets.
///
/// Credentials are read from `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY`
/// (and optionally `AWS_SESSION_TOKEN`). `endpoint_url` supports
/// S3-compatible services (MinIO, LocalStack).
#[derive(Debug, Deserialize, Clone)]
pub struct ArchiveConfig {
    pub bucket: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub endpoint_url: Option<String>,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

/// Load and validate a configuration file.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let config: Config = toml::from_str(&content)?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.chunking.max_chars == 0 {
        return Err(ConfigError::Invalid(
            "chunking.max_chars must be > 0".into(),
        ));
    }

    if config.retrieval.top_k == 0 {
        return Err(ConfigError::Invalid("retrieval.top_k must be >= 1".into()));
    }

    if config.reader.cache_capacity == 0 {
        return Err(ConfigError::Invalid(
            "reader.cache_capacity must be > 0".into(),
        ));
    }

    match config.embedding.provider.as_str() {
        "openai" | "ollama" => {}
        other => {
            return Err(ConfigError::Invalid(format!(
                "unknown embedding provider: '{other}'. Must be openai or ollama."
            )))
        }
    }

    if config.embedding.model.is_none() {
        return Err(ConfigError::Invalid(format!(
            "embedding.model must be specified for provider '{}'",
            config.embedding.provider
        )));
    }
    if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
        return Err(ConfigError::Invalid(format!(
            "embedding.dims must be > 0 for provider '{}'",
            config.embedding.provider
        )));
    }
    if config.embedding.max_attempts == 0 {
        return Err(ConfigError::Invalid(
            "embedding.max_attempts must be >= 1".into(),
        ));
    }

    match config.store.backend.as_str() {
        "qdrant" | "sqlite" | "memory" => {}
        other => {
            return Err(ConfigError::Invalid(format!(
                "unknown store backend: '{other}'. Must be qdrant, sqlite, or memory."
            )))
        }
    }

    Ok(())
}
