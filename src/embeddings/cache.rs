//! Exact-text embedding memoization.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{EmbeddingError, EmbeddingProvider, SharedEmbeddingProvider};

/// Hit/miss counters for cache introspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Wraps a provider with an exact-text memo table.
///
/// Re-embedding the same corpus (re-runs, overlapping batches, repeated
/// queries) short-circuits here instead of paying the provider again.
/// The table is unbounded; callers embedding unbounded streams should
/// manage their own eviction.
pub struct EmbeddingCache {
    inner: SharedEmbeddingProvider,
    table: RwLock<HashMap<String, Vec<f32>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl std::fmt::Debug for EmbeddingCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingCache")
            .field("entries", &self.table.read().len())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl EmbeddingCache {
    #[must_use]
    pub fn new(inner: SharedEmbeddingProvider) -> Self {
        Self {
            inner,
            table: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for EmbeddingCache {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut results: Vec<Option<Vec<f32>>> = vec![None; texts.len()];
        let mut missing: Vec<usize> = Vec::new();
        {
            let table = self.table.read();
            for (index, text) in texts.iter().enumerate() {
                match table.get(text) {
                    Some(vector) => results[index] = Some(vector.clone()),
                    None => missing.push(index),
                }
            }
        }
        self.hits
            .fetch_add((texts.len() - missing.len()) as u64, Ordering::Relaxed);
        self.misses.fetch_add(missing.len() as u64, Ordering::Relaxed);

        if !missing.is_empty() {
            let batch: Vec<String> = missing.iter().map(|&index| texts[index].clone()).collect();
            let fresh = self.inner.embed_batch(&batch).await?;
            if fresh.len() != batch.len() {
                return Err(EmbeddingError::CountMismatch {
                    requested: batch.len(),
                    received: fresh.len(),
                });
            }
            let mut table = self.table.write();
            for (&index, vector) in missing.iter().zip(fresh) {
                table.insert(texts[index].clone(), vector.clone());
                results[index] = Some(vector);
            }
        }

        Ok(results.into_iter().flatten().collect())
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    /// Counts how many times the wrapped provider is asked to embed.
    struct CountingProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for CountingProvider {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
        }

        fn dimensions(&self) -> usize {
            2
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    #[tokio::test]
    async fn repeated_texts_hit_the_memo_table() {
        let inner = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
        });
        let cache = EmbeddingCache::new(inner.clone());

        let first = cache
            .embed_batch(&["alpha".to_string(), "beta".to_string()])
            .await
            .unwrap();
        let second = cache
            .embed_batch(&["alpha".to_string(), "beta".to_string()])
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats(), CacheStats { hits: 2, misses: 2 });
    }

    #[tokio::test]
    async fn only_missing_texts_reach_the_provider() {
        let inner = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
        });
        let cache = EmbeddingCache::new(inner.clone());

        cache.embed_batch(&["alpha".to_string()]).await.unwrap();
        let mixed = cache
            .embed_batch(&["alpha".to_string(), "gamma".to_string()])
            .await
            .unwrap();

        assert_eq!(mixed.len(), 2);
        assert_eq!(mixed[0], vec![5.0, 1.0]);
        // second call embeds only "gamma"
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 2 });
    }
}
