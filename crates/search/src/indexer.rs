//! Corpus embedding
//!
//! Fills in the embedding of every chunk that lacks one. Chunks are split
//! into disjoint batches which run concurrently; vectors are written back on
//! the calling task once a batch returns, so no chunk is written twice and
//! an embedding, once set, is never replaced.

use futures::stream::{self, StreamExt};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use outlook_common::config::EmbeddingConfig;
use outlook_common::corpus::{check_dimensions, load_corpus, save_corpus};
use outlook_common::errors::{AppError, Result};
use outlook_common::models::Chunk;
use outlook_common::Embedder;
use std::num::NonZeroU32;
use std::path::Path;
use tracing::{debug, info, instrument, warn};

/// Batching options for [`build_chunk_embeddings`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmbeddingOptions {
    /// Texts per embedding request
    pub batch_size: usize,
    /// Requests in flight at once
    pub concurrency: usize,
    /// Request rate ceiling, 0 for none
    pub requests_per_second: u32,
}

impl Default for EmbeddingOptions {
    fn default() -> Self {
        Self {
            batch_size: 64,
            concurrency: 4,
            requests_per_second: 0,
        }
    }
}

impl From<&EmbeddingConfig> for EmbeddingOptions {
    fn from(config: &EmbeddingConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            concurrency: config.concurrency,
            requests_per_second: config.requests_per_second,
        }
    }
}

/// Embed every chunk whose embedding is unset and return how many were embedded.
///
/// A second call over the same chunks embeds nothing and makes no request.
/// Fails when a batch returns the wrong number of vectors or a vector whose
/// dimension differs from the rest of the corpus. Batches applied before a
/// failure keep their embeddings; a failed batch writes nothing.
pub async fn build_chunk_embeddings(
    chunks: &mut [Chunk],
    embedder: &dyn Embedder,
    options: EmbeddingOptions,
) -> Result<usize> {
    let mut embedded = 0;
    embed_pending(chunks, embedder, options, &mut embedded).await?;
    Ok(embedded)
}

/// `embedded` counts applied chunks even when a later batch fails
#[instrument(skip_all, fields(chunks = chunks.len(), model = embedder.model_name()))]
async fn embed_pending(
    chunks: &mut [Chunk],
    embedder: &dyn Embedder,
    options: EmbeddingOptions,
    embedded: &mut usize,
) -> Result<()> {
    let pending: Vec<usize> = chunks
        .iter()
        .enumerate()
        .filter(|(_, c)| !c.has_embedding())
        .map(|(i, _)| i)
        .collect();

    if pending.is_empty() {
        debug!("All chunks already embedded");
        return Ok(());
    }

    let mut dimension = check_dimensions(chunks)?;

    let batches: Vec<(Vec<usize>, Vec<String>)> = pending
        .chunks(options.batch_size.max(1))
        .map(|indices| {
            let texts = indices.iter().map(|&i| chunks[i].search_text()).collect();
            (indices.to_vec(), texts)
        })
        .collect();

    info!(
        pending = pending.len(),
        batches = batches.len(),
        concurrency = options.concurrency,
        "Embedding chunks"
    );

    let limiter: Option<DefaultDirectRateLimiter> = NonZeroU32::new(options.requests_per_second)
        .map(|rps| RateLimiter::direct(Quota::per_second(rps)));
    let limiter = limiter.as_ref();

    let mut results = stream::iter(batches)
        .map(|(indices, texts)| async move {
            if let Some(limiter) = limiter {
                limiter.until_ready().await;
            }
            let vectors = embedder.embed_batch(&texts).await?;
            Ok::<_, AppError>((indices, vectors))
        })
        .buffer_unordered(options.concurrency.max(1));

    while let Some(result) = results.next().await {
        let (indices, vectors) = result?;

        if vectors.len() != indices.len() {
            return Err(AppError::embedding(format!(
                "Expected {} embeddings, received {}",
                indices.len(),
                vectors.len()
            )));
        }

        // Whole batch is checked before any chunk is written
        for (&index, vector) in indices.iter().zip(&vectors) {
            match dimension {
                None => dimension = Some(vector.len()),
                Some(expected) if expected != vector.len() => {
                    return Err(AppError::DimensionMismatch {
                        expected,
                        found: vector.len(),
                        chunk_id: chunks[index].chunk_id,
                    })
                }
                Some(_) => {}
            }
        }

        for (index, vector) in indices.into_iter().zip(vectors) {
            if chunks[index].set_embedding(vector) {
                *embedded += 1;
            }
        }
    }

    info!(embedded = *embedded, ?dimension, "Chunk embeddings built");
    Ok(())
}

/// Load a snapshot, embed what is missing and write the snapshot back when
/// anything new was embedded. Progress made before an embedding failure is
/// saved before the error is returned.
#[instrument(skip_all, fields(path = %path.display()))]
pub async fn load_embedded_corpus(
    path: &Path,
    embedder: &dyn Embedder,
    options: EmbeddingOptions,
) -> Result<Vec<Chunk>> {
    let mut chunks = load_corpus(path).await?;
    let mut embedded = 0;
    let result = embed_pending(&mut chunks, embedder, options, &mut embedded).await;

    if embedded > 0 {
        save_corpus(path, &chunks).await?;
    }

    if let Err(e) = result {
        warn!(embedded, error = %e, "Embedding stopped early, partial progress saved");
        return Err(e);
    }

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use outlook_common::embeddings::MockEmbedder;
    use outlook_common::models::Section;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_test::assert_ok;

    fn corpus(n: usize) -> Vec<Chunk> {
        let section = Section {
            id: 0,
            doc_name: "outlook_2025".to_string(),
            heading: Some("FIXED INCOME".to_string()),
            subheading: None,
            text: String::new(),
            images: Vec::new(),
            page_start: 3,
            page_end: 4,
        };
        (0..n)
            .map(|i| Chunk::from_section(&section, i, format!("bond market view {}", i)))
            .collect()
    }

    /// Returns one vector too few per batch
    struct ShortEmbedder;

    #[async_trait]
    impl Embedder for ShortEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0; 4])
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(vec![vec![1.0; 4]; texts.len().saturating_sub(1)])
        }

        fn model_name(&self) -> &str {
            "short"
        }

        fn dimension(&self) -> usize {
            4
        }
    }

    /// Fails every `embed_batch` call after the first `succeed` calls
    struct FailingEmbedder {
        inner: MockEmbedder,
        succeed: usize,
        calls: AtomicUsize,
    }

    impl FailingEmbedder {
        fn new(succeed: usize) -> Self {
            Self {
                inner: MockEmbedder::new(4),
                succeed,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Embedder for FailingEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.inner.embed(text).await
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            if self.calls.fetch_add(1, Ordering::SeqCst) >= self.succeed {
                return Err(AppError::embedding("service unavailable"));
            }
            self.inner.embed_batch(texts).await
        }

        fn model_name(&self) -> &str {
            self.inner.model_name()
        }

        fn dimension(&self) -> usize {
            self.inner.dimension()
        }
    }

    /// Returns a vector of a different dimension for the last text of a batch
    struct RaggedEmbedder;

    #[async_trait]
    impl Embedder for RaggedEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0; 4])
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            let mut vectors = vec![vec![1.0; 4]; texts.len()];
            if let Some(last) = vectors.last_mut() {
                last.push(1.0);
            }
            Ok(vectors)
        }

        fn model_name(&self) -> &str {
            "ragged"
        }

        fn dimension(&self) -> usize {
            4
        }
    }

    fn sequential(batch_size: usize) -> EmbeddingOptions {
        EmbeddingOptions {
            batch_size,
            concurrency: 1,
            requests_per_second: 0,
        }
    }

    /// Counts the texts it was asked to embed
    struct CountingEmbedder {
        inner: MockEmbedder,
        texts: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.texts.fetch_add(1, Ordering::SeqCst);
            self.inner.embed(text).await
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.texts.fetch_add(texts.len(), Ordering::SeqCst);
            self.inner.embed_batch(texts).await
        }

        fn model_name(&self) -> &str {
            self.inner.model_name()
        }

        fn dimension(&self) -> usize {
            self.inner.dimension()
        }
    }

    #[tokio::test]
    async fn test_embeds_every_chunk_once() {
        let mut chunks = corpus(10);
        let embedder = MockEmbedder::new(8);
        let options = EmbeddingOptions {
            batch_size: 3,
            concurrency: 2,
            requests_per_second: 0,
        };

        let embedded = build_chunk_embeddings(&mut chunks, &embedder, options).await.unwrap();
        assert_eq!(embedded, 10);
        assert_eq!(embedder.calls(), 4);
        assert!(chunks.iter().all(|c| c.embedding().map(<[f32]>::len) == Some(8)));

        let expected = embedder.embed(&chunks[7].search_text()).await.unwrap();
        assert_eq!(chunks[7].embedding().unwrap(), expected.as_slice());
    }

    #[tokio::test]
    async fn test_second_run_makes_no_calls() {
        let mut chunks = corpus(5);
        let embedder = MockEmbedder::new(8);

        assert_eq!(
            build_chunk_embeddings(&mut chunks, &embedder, EmbeddingOptions::default())
                .await
                .unwrap(),
            5
        );
        let calls = embedder.calls();

        assert_eq!(
            build_chunk_embeddings(&mut chunks, &embedder, EmbeddingOptions::default())
                .await
                .unwrap(),
            0
        );
        assert_eq!(embedder.calls(), calls);
    }

    #[tokio::test]
    async fn test_only_missing_chunks_are_embedded() {
        let mut chunks = corpus(4);
        chunks[1] = chunks[1].clone().with_embedding(vec![0.5; 8]);
        let embedder = CountingEmbedder {
            inner: MockEmbedder::new(8),
            texts: AtomicUsize::new(0),
        };

        let embedded = build_chunk_embeddings(&mut chunks, &embedder, EmbeddingOptions::default())
            .await
            .unwrap();

        assert_eq!(embedded, 3);
        assert_eq!(embedder.texts.load(Ordering::SeqCst), 3);
        assert_eq!(chunks[1].embedding().unwrap(), &[0.5; 8][..]);
    }

    #[tokio::test]
    async fn test_dimension_change_is_rejected() {
        let mut chunks = corpus(3);
        chunks[0] = chunks[0].clone().with_embedding(vec![0.5; 4]);

        let err = build_chunk_embeddings(&mut chunks, &MockEmbedder::new(8), EmbeddingOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::DimensionMismatch { expected: 4, found: 8, .. }));
    }

    #[tokio::test]
    async fn test_short_batch_is_rejected() {
        let mut chunks = corpus(3);
        let err = build_chunk_embeddings(&mut chunks, &ShortEmbedder, EmbeddingOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::EmbeddingError { .. }));
        assert!(chunks.iter().all(|c| !c.has_embedding()));
    }

    #[tokio::test]
    async fn test_rate_limited_run() {
        let mut chunks = corpus(4);
        let options = EmbeddingOptions {
            batch_size: 1,
            concurrency: 4,
            requests_per_second: 1000,
        };

        let embedded = build_chunk_embeddings(&mut chunks, &MockEmbedder::new(4), options).await;
        assert_eq!(embedded.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_service_error_is_returned_unchanged() {
        let mut chunks = corpus(3);
        let err = build_chunk_embeddings(&mut chunks, &FailingEmbedder::new(0), EmbeddingOptions::default())
            .await
            .unwrap_err();

        match err {
            AppError::EmbeddingError { message } => assert_eq!(message, "service unavailable"),
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(chunks.iter().all(|c| !c.has_embedding()));
    }

    #[tokio::test]
    async fn test_failed_batch_keeps_earlier_batches() {
        let mut chunks = corpus(4);
        let err = build_chunk_embeddings(&mut chunks, &FailingEmbedder::new(1), sequential(2))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::EmbeddingError { .. }));
        let embedded: Vec<bool> = chunks.iter().map(Chunk::has_embedding).collect();
        assert_eq!(embedded, vec![true, true, false, false]);
    }

    #[tokio::test]
    async fn test_mismatched_batch_writes_nothing() {
        let mut chunks = corpus(3);
        let err = build_chunk_embeddings(&mut chunks, &RaggedEmbedder, EmbeddingOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::DimensionMismatch { expected: 4, found: 5, .. }));
        assert!(chunks.iter().all(|c| !c.has_embedding()));
    }

    #[tokio::test]
    async fn test_partial_progress_is_saved_on_failure() {
        let path = std::env::temp_dir()
            .join(format!("outlook-indexer-partial-{}", std::process::id()))
            .join("semantic_chunks.json");
        save_corpus(&path, &corpus(4)).await.unwrap();

        let err = load_embedded_corpus(&path, &FailingEmbedder::new(1), sequential(2))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::EmbeddingError { .. }));

        let reloaded = assert_ok!(load_corpus(&path).await);
        assert_eq!(reloaded.iter().filter(|c| c.has_embedding()).count(), 2);

        // The next run embeds only the two chunks that are still missing
        let embedder = CountingEmbedder {
            inner: MockEmbedder::new(4),
            texts: AtomicUsize::new(0),
        };
        let complete = load_embedded_corpus(&path, &embedder, sequential(2)).await.unwrap();
        assert!(complete.iter().all(Chunk::has_embedding));
        assert_eq!(embedder.texts.load(Ordering::SeqCst), 2);

        let _ = tokio::fs::remove_dir_all(path.parent().unwrap()).await;
    }

    #[tokio::test]
    async fn test_load_embedded_corpus_persists_vectors() {
        let path = std::env::temp_dir()
            .join(format!("outlook-indexer-{}", std::process::id()))
            .join("semantic_chunks.json");
        save_corpus(&path, &corpus(3)).await.unwrap();
        let embedder = MockEmbedder::new(4);

        let first = load_embedded_corpus(&path, &embedder, EmbeddingOptions::default())
            .await
            .unwrap();
        assert!(first.iter().all(Chunk::has_embedding));

        let reloaded = assert_ok!(load_corpus(&path).await);
        assert_eq!(reloaded, first);

        let _ = tokio::fs::remove_dir_all(path.parent().unwrap()).await;
    }
}
