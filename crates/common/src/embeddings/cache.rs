//! In-process embedding cache keyed by content hash

use super::Embedder;
use crate::errors::{AppError, Result};
use crate::metrics;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

const CACHE_NAME: &str = "embedding";

/// Memoizes another embedder's vectors by SHA-256 of model name and text.
/// Repeated questions and re-embedded chunk texts skip the service call.
pub struct CachingEmbedder {
    inner: Arc<dyn Embedder>,
    entries: RwLock<HashMap<String, Vec<f32>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CachingEmbedder {
    pub fn new(inner: Arc<dyn Embedder>) -> Self {
        Self {
            inner,
            entries: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn key(&self, text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.inner.model_name().as_bytes());
        hasher.update([0u8]);
        hasher.update(text.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    fn record(&self, hit: bool, count: u64) {
        let counter = if hit { &self.hits } else { &self.misses };
        counter.fetch_add(count, Ordering::Relaxed);
        for _ in 0..count {
            metrics::record_cache(hit, CACHE_NAME);
        }
    }
}

#[async_trait]
impl Embedder for CachingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let key = self.key(text);
        if let Some(hit) = self.entries.read().await.get(&key) {
            self.record(true, 1);
            return Ok(hit.clone());
        }

        self.record(false, 1);
        let embedding = self.inner.embed(text).await?;
        self.entries.write().await.insert(key, embedding.clone());
        Ok(embedding)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let keys: Vec<String> = texts.iter().map(|t| self.key(t)).collect();

        let mut results: Vec<Option<Vec<f32>>> = {
            let entries = self.entries.read().await;
            keys.iter().map(|k| entries.get(k).cloned()).collect()
        };

        let missing: Vec<usize> = (0..texts.len()).filter(|&i| results[i].is_none()).collect();
        self.record(true, (texts.len() - missing.len()) as u64);

        if !missing.is_empty() {
            self.record(false, missing.len() as u64);
            debug!(missing = missing.len(), total = texts.len(), "Embedding cache miss");

            let pending: Vec<String> = missing.iter().map(|&i| texts[i].clone()).collect();
            let fresh = self.inner.embed_batch(&pending).await?;
            if fresh.len() != pending.len() {
                return Err(AppError::embedding(format!(
                    "Expected {} embeddings, received {}",
                    pending.len(),
                    fresh.len()
                )));
            }

            let mut entries = self.entries.write().await;
            for (&i, embedding) in missing.iter().zip(fresh) {
                entries.insert(keys[i].clone(), embedding.clone());
                results[i] = Some(embedding);
            }
        }

        Ok(results.into_iter().flatten().collect())
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }
}
