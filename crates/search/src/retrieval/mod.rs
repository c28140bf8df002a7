//! Semantic retrieval
//!
//! Ranks chunks against a query by cosine similarity between the query
//! embedding and each chunk's stored embedding. Candidates are scanned
//! exhaustively; the corpus is small enough that no index is kept.

mod vector;

pub use vector::VectorRetriever;

use outlook_common::errors::{AppError, Result};
use outlook_common::metrics;
use outlook_common::models::Chunk;
use outlook_common::Embedder;
use std::time::Instant;
use tracing::{debug, instrument};

/// Added to the norm product so zero vectors score 0 instead of NaN
pub const NORM_EPSILON: f32 = 1e-8;

/// A candidate chunk with its similarity to the query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredChunk<'a> {
    pub chunk: &'a Chunk,
    pub score: f32,
}

/// `dot(a, b) / (|a| * |b| + 1e-8)`, in [-1, 1] for non-zero inputs
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    dot / (norm_a * norm_b + NORM_EPSILON)
}

/// Chunks belonging to any of `docs`, in corpus order
pub fn filter_by_documents<'a>(corpus: &'a [Chunk], docs: &[&str]) -> Vec<&'a Chunk> {
    corpus
        .iter()
        .filter(|c| docs.contains(&c.doc_name.as_str()))
        .collect()
}

/// Rank `candidates` against `query` and return the best `top_k`.
///
/// The query is embedded once. Results are ordered by descending score,
/// equal scores keeping candidate order. An empty candidate set returns no
/// results without calling the embedder; a candidate without an embedding
/// is an error.
#[instrument(skip_all, fields(top_k = top_k))]
pub async fn search<'a, I>(
    candidates: I,
    query: &str,
    top_k: usize,
    embedder: &dyn Embedder,
) -> Result<Vec<ScoredChunk<'a>>>
where
    I: IntoIterator<Item = &'a Chunk>,
{
    let start = Instant::now();
    let candidates: Vec<&'a Chunk> = candidates.into_iter().collect();

    if candidates.is_empty() || top_k == 0 {
        return Ok(Vec::new());
    }

    if let Some(missing) = candidates.iter().find(|c| !c.has_embedding()) {
        return Err(AppError::MissingEmbedding {
            chunk_id: missing.chunk_id,
        });
    }

    let query_embedding = embedder.embed(query).await?;

    let mut scored = Vec::with_capacity(candidates.len());
    for &chunk in &candidates {
        let embedding = chunk.embedding().ok_or(AppError::MissingEmbedding {
            chunk_id: chunk.chunk_id,
        })?;
        if embedding.len() != query_embedding.len() {
            return Err(AppError::DimensionMismatch {
                expected: query_embedding.len(),
                found: embedding.len(),
                chunk_id: chunk.chunk_id,
            });
        }
        scored.push(ScoredChunk {
            chunk,
            score: cosine_similarity(&query_embedding, embedding),
        });
    }

    // Stable: ties keep candidate order
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(top_k);

    metrics::record_search(start.elapsed().as_secs_f64(), candidates.len());
    debug!(
        candidates = candidates.len(),
        returned = scored.len(),
        best = scored.first().map(|s| s.score),
        "Search complete"
    );

    Ok(scored)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use outlook_common::models::Section;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Embeds known texts to fixed vectors
    pub(crate) struct FixedEmbedder {
        vectors: HashMap<String, Vec<f32>>,
        pub(crate) calls: AtomicUsize,
    }

    impl FixedEmbedder {
        pub(crate) fn new(pairs: &[(&str, Vec<f32>)]) -> Self {
            Self {
                vectors: pairs.iter().map(|(t, v)| (t.to_string(), v.clone())).collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.vectors
                .get(text)
                .cloned()
                .ok_or_else(|| AppError::embedding(format!("no vector for '{}'", text)))
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            let mut out = Vec::with_capacity(texts.len());
            for text in texts {
                out.push(self.embed(text).await?);
            }
            Ok(out)
        }

        fn model_name(&self) -> &str {
            "fixed"
        }

        fn dimension(&self) -> usize {
            3
        }
    }

    pub(crate) fn chunk(id: usize, doc: &str, embedding: Option<Vec<f32>>) -> Chunk {
        let section = Section {
            id,
            doc_name: doc.to_string(),
            heading: Some("RATES".to_string()),
            subheading: None,
            text: format!("chunk {}", id),
            images: Vec::new(),
            page_start: 1,
            page_end: 1,
        };
        let chunk = Chunk::from_section(&section, id, section.text.clone());
        match embedding {
            Some(v) => chunk.with_embedding(v),
            None => chunk,
        }
    }

    #[test]
    fn test_self_similarity_is_one() {
        let v: [f32; 4] = [0.3, -1.2, 4.5, 0.01];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_vector_scores_zero() {
        let score = cosine_similarity(&[0.0, 0.0, 0.0], &[1.0, 2.0, 3.0]);
        assert!(score.is_finite());
        assert_eq!(score, 0.0);
        assert_eq!(cosine_similarity(&[0.0; 3], &[0.0; 3]), 0.0);
    }

    #[test]
    fn test_opposite_vectors() {
        let score = cosine_similarity(&[1.0, 0.0], &[-2.0, 0.0]);
        assert!((score + 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_ranking_and_top_k_bound() {
        let corpus = vec![
            chunk(0, "outlook_2025", Some(vec![0.0, 1.0, 0.0])),
            chunk(1, "outlook_2025", Some(vec![1.0, 0.0, 0.0])),
            chunk(2, "midyear_2025", Some(vec![1.0, 1.0, 0.0])),
            chunk(3, "midyear_2025", Some(vec![-1.0, 0.0, 0.0])),
        ];
        let embedder = FixedEmbedder::new(&[("rates", vec![1.0, 0.0, 0.0])]);

        let results = search(&corpus, "rates", 3, &embedder).await.unwrap();
        let ids: Vec<usize> = results.iter().map(|r| r.chunk.chunk_id).collect();
        assert_eq!(ids, vec![1, 2, 0]);
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));

        let all = search(&corpus, "rates", 100, &embedder).await.unwrap();
        assert_eq!(all.len(), 4);
        assert_eq!(all[3].chunk.chunk_id, 3);
    }

    #[tokio::test]
    async fn test_ties_keep_corpus_order() {
        let corpus = vec![
            chunk(0, "outlook_2025", Some(vec![0.0, 1.0, 0.0])),
            chunk(1, "outlook_2025", Some(vec![2.0, 0.0, 0.0])),
            chunk(2, "outlook_2025", Some(vec![1.0, 0.0, 0.0])),
        ];
        let embedder = FixedEmbedder::new(&[("q", vec![3.0, 0.0, 0.0])]);

        let results = search(&corpus, "q", 2, &embedder).await.unwrap();
        assert_eq!(results[0].chunk.chunk_id, 1);
        assert_eq!(results[1].chunk.chunk_id, 2);
    }

    #[tokio::test]
    async fn test_empty_candidates_skip_embedder() {
        let embedder = FixedEmbedder::new(&[]);
        let results = search(Vec::<&Chunk>::new(), "anything", 8, &embedder)
            .await
            .unwrap();
        assert!(results.is_empty());
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_embedding_is_error() {
        let corpus = vec![
            chunk(0, "outlook_2025", Some(vec![1.0, 0.0, 0.0])),
            chunk(1, "outlook_2025", None),
        ];
        let embedder = FixedEmbedder::new(&[("q", vec![1.0, 0.0, 0.0])]);

        let err = search(&corpus, "q", 8, &embedder).await.unwrap_err();
        assert!(matches!(err, AppError::MissingEmbedding { chunk_id: 1 }));
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_query_embedding_error_is_returned() {
        let corpus = vec![chunk(0, "outlook_2025", Some(vec![1.0, 0.0, 0.0]))];
        let embedder = FixedEmbedder::new(&[]);

        let err = search(&corpus, "unknown query", 8, &embedder).await.unwrap_err();
        match err {
            AppError::EmbeddingError { message } => {
                assert_eq!(message, "no vector for 'unknown query'")
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_query_dimension_must_match() {
        let corpus = vec![chunk(0, "outlook_2025", Some(vec![1.0, 0.0]))];
        let embedder = FixedEmbedder::new(&[("q", vec![1.0, 0.0, 0.0])]);

        let err = search(&corpus, "q", 8, &embedder).await.unwrap_err();
        assert!(matches!(err, AppError::DimensionMismatch { .. }));
    }

    #[tokio::test]
    async fn test_midyear_filter_limits_results() {
        let corpus = vec![
            chunk(0, "outlook_2025", Some(vec![1.0, 0.0, 0.0])),
            chunk(1, "midyear_2025", Some(vec![0.5, 0.5, 0.0])),
            chunk(2, "outlook_2025", Some(vec![0.9, 0.1, 0.0])),
            chunk(3, "midyear_2025", Some(vec![0.0, 1.0, 0.0])),
        ];
        let embedder = FixedEmbedder::new(&[("mid-year view", vec![1.0, 0.0, 0.0])]);

        let candidates = filter_by_documents(&corpus, &["midyear_2025"]);
        assert_eq!(candidates.len(), 2);

        let results = search(candidates, "mid-year view", 8, &embedder).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.chunk.doc_name == "midyear_2025"));
        assert_eq!(results[0].chunk.chunk_id, 1);
    }

    #[test]
    fn test_filter_unknown_document_is_empty() {
        let corpus = vec![chunk(0, "outlook_2025", None)];
        assert!(filter_by_documents(&corpus, &["annual_2024"]).is_empty());
        assert_eq!(filter_by_documents(&corpus, &["outlook_2025", "midyear_2025"]).len(), 1);
    }
}
