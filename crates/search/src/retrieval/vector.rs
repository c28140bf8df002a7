//! Vector similarity retriever
//!
//! Holds the embedder used for queries so callers search with the same model
//! that embedded the corpus.

use super::{filter_by_documents, search, ScoredChunk};
use outlook_common::errors::Result;
use outlook_common::models::Chunk;
use outlook_common::Embedder;
use std::sync::Arc;

/// Cosine-similarity retriever over an in-memory corpus
#[derive(Clone)]
pub struct VectorRetriever {
    embedder: Arc<dyn Embedder>,
    top_k: usize,
}

impl VectorRetriever {
    /// Create a new vector retriever returning at most `top_k` results
    pub fn new(embedder: Arc<dyn Embedder>, top_k: usize) -> Self {
        Self { embedder, top_k }
    }

    pub fn embedder(&self) -> &dyn Embedder {
        self.embedder.as_ref()
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Search the whole corpus
    pub async fn retrieve<'a>(&self, corpus: &'a [Chunk], query: &str) -> Result<Vec<ScoredChunk<'a>>> {
        search(corpus, query, self.top_k, self.embedder.as_ref()).await
    }

    /// Search only the chunks of the named documents
    pub async fn retrieve_from<'a>(
        &self,
        corpus: &'a [Chunk],
        docs: &[&str],
        query: &str,
    ) -> Result<Vec<ScoredChunk<'a>>> {
        let candidates = filter_by_documents(corpus, docs);
        search(candidates, query, self.top_k, self.embedder.as_ref()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::tests::{chunk, FixedEmbedder};

    fn corpus() -> Vec<Chunk> {
        vec![
            chunk(0, "outlook_2025", Some(vec![1.0, 0.0, 0.0])),
            chunk(1, "midyear_2025", Some(vec![0.8, 0.2, 0.0])),
            chunk(2, "outlook_2025", Some(vec![0.0, 0.0, 1.0])),
        ]
    }

    #[tokio::test]
    async fn test_retrieve_respects_top_k() {
        let embedder = Arc::new(FixedEmbedder::new(&[("growth", vec![1.0, 0.0, 0.0])]));
        let retriever = VectorRetriever::new(embedder, 2);
        let corpus = corpus();

        let results = retriever.retrieve(&corpus, "growth").await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk.chunk_id, 0);
        assert_eq!(results[1].chunk.chunk_id, 1);
    }

    #[tokio::test]
    async fn test_retrieve_from_documents() {
        let embedder = Arc::new(FixedEmbedder::new(&[("growth", vec![1.0, 0.0, 0.0])]));
        let retriever = VectorRetriever::new(embedder, 8);
        let corpus = corpus();

        let results = retriever
            .retrieve_from(&corpus, &["outlook_2025"], "growth")
            .await
            .unwrap();
        let ids: Vec<usize> = results.iter().map(|r| r.chunk.chunk_id).collect();
        assert_eq!(ids, vec![0, 2]);
    }
}
