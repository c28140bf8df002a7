//! Outlook RAG Common Library
//!
//! Shared code for the ingestion, search and context crates:
//! - Page, section and chunk models
//! - Embedding client abstraction and content-hash cache
//! - Corpus snapshot persistence
//! - Error types and handling
//! - Configuration management
//! - Metrics and observability

pub mod config;
pub mod corpus;
pub mod embeddings;
pub mod errors;
pub mod metrics;
pub mod models;

// Re-export commonly used types
pub use config::AppConfig;
pub use embeddings::Embedder;
pub use errors::{AppError, Result};
pub use models::{Chunk, ImageRecord, PageRecord, Section};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default embedding model
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Default embedding dimension
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 1536;

/// Document names of the two ingested outlooks
pub const OUTLOOK_2025: &str = "outlook_2025";
pub const MIDYEAR_2025: &str = "midyear_2025";
