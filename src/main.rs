//! # Recall CLI (`rcl`)
//!
//! The `rcl` binary drives the ingestion and retrieval pipeline from the
//! command line. Every command is tenant-scoped via `--user`.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `rcl ingest <file>` | Chunk, embed, and store a local document |
//! | `rcl ingest --url <url>` | Fetch through the reader endpoint, then ingest |
//! | `rcl search "<query>"` | Filtered similarity search |
//! | `rcl delete` | Delete a note's or resource's vectors |
//! | `rcl restore <id>` | Rehydrate a document from its archival copy |
//! | `rcl fetch <url>` | Fetch a URL through the reader endpoint |
//!
//! ## Examples
//!
//! ```bash
//! rcl --config ./config/recall.toml ingest notes.md --user u1 --note-id n1
//! rcl search "deployment checklist" --user u1 --note-id n1
//! rcl delete --user u1 --resource-id r1
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use recall::config::{load_config, Config};
use recall::embedding::create_provider;
use recall::engine::RetrievalEngine;
use recall::fetch::FetchCache;
use recall::models::{
    Document, DocumentMetadata, NodeType, OwnerKind, SearchFilter, SearchRequest,
};
use recall::object_store::S3ObjectStore;
use recall::store::create_store;

/// Recall — a tenant-isolated content ingestion and hybrid retrieval
/// pipeline.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/recall.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "rcl",
    about = "Recall — tenant-isolated content ingestion and hybrid retrieval",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/recall.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a document from a file or a URL.
    Ingest {
        /// Path to a cleaned text file to ingest.
        file: Option<PathBuf>,

        /// Fetch this URL through the reader endpoint instead of reading a
        /// file.
        #[arg(long, conflicts_with = "file")]
        url: Option<String>,

        /// Tenant (user) id the document belongs to.
        #[arg(long)]
        user: String,

        /// Node type: note, resource, or other.
        #[arg(long, default_value = "note")]
        node_type: String,

        /// Note id (required for --node-type note).
        #[arg(long)]
        note_id: Option<String>,

        /// Resource id (required for --node-type resource).
        #[arg(long)]
        resource_id: Option<String>,

        /// Collection the document belongs to.
        #[arg(long)]
        collection_id: Option<String>,

        /// Document title.
        #[arg(long)]
        title: Option<String>,
    },

    /// Search the tenant's indexed content.
    Search {
        /// Query text.
        query: String,

        /// Tenant (user) id to search as.
        #[arg(long)]
        user: String,

        /// Restrict to these node types (repeatable).
        #[arg(long = "node-type")]
        node_types: Vec<String>,

        /// Restrict to these note ids (repeatable).
        #[arg(long = "note-id")]
        note_ids: Vec<String>,

        /// Restrict to these resource ids (repeatable).
        #[arg(long = "resource-id")]
        resource_ids: Vec<String>,

        /// Restrict to these collection ids (repeatable).
        #[arg(long = "collection-id")]
        collection_ids: Vec<String>,
    },

    /// Delete all vectors for one note or resource.
    Delete {
        /// Tenant (user) id.
        #[arg(long)]
        user: String,

        /// Delete by note id.
        #[arg(long, conflicts_with = "resource_id")]
        note_id: Option<String>,

        /// Delete by resource id.
        #[arg(long)]
        resource_id: Option<String>,
    },

    /// Rehydrate a document's vectors from its archival copy.
    Restore {
        /// The document (note/resource) id to restore.
        document_id: String,

        /// Tenant (user) id.
        #[arg(long)]
        user: String,
    },

    /// Fetch a URL through the reader endpoint and print the result.
    Fetch {
        /// The URL to fetch.
        url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;

    match cli.command {
        Commands::Ingest {
            file,
            url,
            user,
            node_type,
            note_id,
            resource_id,
            collection_id,
            title,
        } => {
            let engine = build_engine(&config).await?;
            let metadata = DocumentMetadata {
                node_type: parse_node_type(&node_type)?,
                note_id,
                resource_id,
                collection_id,
                title,
                ..Default::default()
            };

            let receipt = if let Some(url) = url {
                engine.ingest_url(&user, &url, metadata).await?
            } else {
                let path = file.context("either a file path or --url is required")?;
                let content = std::fs::read_to_string(&path)
                    .with_context(|| format!("reading {}", path.display()))?;
                let document = Document { content, metadata };
                engine.ingest(&user, &document).await?
            };

            println!("ingest");
            println!("  chunks stored: {}", receipt.chunks);
            println!("  estimated size: {} bytes", receipt.size_bytes);
            println!("ok");
        }

        Commands::Search {
            query,
            user,
            node_types,
            note_ids,
            resource_ids,
            collection_ids,
        } => {
            let engine = build_engine(&config).await?;
            let node_types = node_types
                .iter()
                .map(|t| parse_node_type(t))
                .collect::<Result<Vec<_>>>()?;

            let request = SearchRequest {
                query,
                vector: None,
                filter: Some(SearchFilter {
                    node_types,
                    urls: Vec::new(),
                    note_ids,
                    resource_ids,
                    collection_ids,
                }),
            };

            let payloads = engine.retrieve(&user, &request).await?;
            if payloads.is_empty() {
                println!("No results.");
                return Ok(());
            }

            for (i, payload) in payloads.iter().enumerate() {
                let title = payload.metadata.title.as_deref().unwrap_or("(untitled)");
                println!(
                    "{}. [{}] {} #{}",
                    i + 1,
                    payload.metadata.node_type.as_str(),
                    title,
                    payload.sequence
                );
                if let Some(url) = &payload.metadata.url {
                    println!("    url: {url}");
                }
                let excerpt: String = payload.content.chars().take(160).collect();
                println!("    excerpt: \"{}\"", excerpt.replace('\n', " "));
                println!();
            }
        }

        Commands::Delete {
            user,
            note_id,
            resource_id,
        } => {
            let engine = build_engine(&config).await?;
            let (kind, owner_id) = match (note_id, resource_id) {
                (Some(id), None) => (OwnerKind::Note, id),
                (None, Some(id)) => (OwnerKind::Resource, id),
                _ => bail!("exactly one of --note-id or --resource-id is required"),
            };
            engine.delete_by_owner(&user, kind, &owner_id).await?;
            println!("deleted vectors for {owner_id}");
            println!("ok");
        }

        Commands::Restore { document_id, user } => {
            let engine = build_engine(&config).await?;
            let receipt = engine.restore(&user, &document_id).await?;
            println!("restore {document_id}");
            println!("  chunks restored: {}", receipt.chunks);
            println!("ok");
        }

        Commands::Fetch { url } => {
            let fetcher = FetchCache::new(&config.reader)?;
            let result = fetcher.fetch(&url).await?;
            println!("fetched {}", result.url);
            println!("  title: {}", result.title);
            println!("  content: {} bytes", result.content.len());
        }
    }

    Ok(())
}

async fn build_engine(config: &Config) -> Result<RetrievalEngine> {
    let provider = create_provider(&config.embedding)?;
    let dims = provider.dims();
    let store = create_store(&config.store, dims).await?;

    let mut engine = RetrievalEngine::new(
        provider,
        store,
        config.chunking.max_chars,
        config.retrieval.top_k,
    );

    engine = engine.with_fetcher(Arc::new(FetchCache::new(&config.reader)?));

    if let Some(archive) = &config.archive {
        let prefix = archive.prefix.clone();
        engine = engine.with_archive(Arc::new(S3ObjectStore::new(archive.clone())), prefix);
    }

    Ok(engine)
}

fn parse_node_type(value: &str) -> Result<NodeType> {
    match value {
        "note" => Ok(NodeType::Note),
        "resource" => Ok(NodeType::Resource),
        "other" => Ok(NodeType::Other),
        other => bail!("unknown node type: '{other}'. Use note, resource, or other."),
    }
}
