//! Outlook RAG Search Library
//!
//! - Builds chunk embeddings in concurrent, rate-limited batches
//! - Ranks chunks against a query by cosine similarity
//! - Restricts candidates to a set of documents

pub mod indexer;
pub mod retrieval;

pub use indexer::{build_chunk_embeddings, load_embedded_corpus, EmbeddingOptions};
pub use retrieval::{cosine_similarity, filter_by_documents, search, ScoredChunk, VectorRetriever};
