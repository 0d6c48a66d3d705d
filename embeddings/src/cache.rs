//! Embedding cache keyed by content snapshot.
//!
//! Entries are keyed by a hash of the exact text and model, so a block whose
//! content has not changed since its last submission is never re-embedded.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::Embedding;

/// Cache entry for an embedding.
#[derive(Debug, Clone)]
struct CacheEntry {
    /// The embedding vector.
    embedding: Embedding,

    /// Model used to generate the embedding.
    model: String,

    /// Insertion sequence, used for oldest-first eviction.
    inserted: u64,
}

#[derive(Debug, Default)]
struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    next_seq: u64,
    hits: u64,
    misses: u64,
}

/// Process-local cache for embeddings to avoid redundant API calls.
#[derive(Debug, Clone)]
pub struct EmbeddingCache {
    inner: Arc<RwLock<CacheInner>>,

    /// Maximum cache size.
    max_entries: usize,
}

impl EmbeddingCache {
    /// Create a new in-memory cache.
    pub fn new(max_entries: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(CacheInner::default())),
            max_entries: max_entries.max(1),
        }
    }

    /// Compute a hash for cache lookup.
    fn hash_key(text: &str, model: &str) -> String {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        model.hash(&mut hasher);
        format!("{:x}", hasher.finish())
    }

    /// Get an embedding from the cache.
    pub async fn get(&self, text: &str, model: &str) -> Option<Embedding> {
        let key = Self::hash_key(text, model);
        let mut inner = self.inner.write().await;
        let found = inner.entries.get(&key).map(|e| e.embedding.clone());
        if found.is_some() {
            inner.hits += 1;
        } else {
            inner.misses += 1;
        }
        found
    }

    /// Put an embedding in the cache.
    pub async fn put(&self, text: &str, model: &str, embedding: Embedding) {
        let key = Self::hash_key(text, model);
        let mut inner = self.inner.write().await;

        // Evict if at capacity
        if inner.entries.len() >= self.max_entries && !inner.entries.contains_key(&key) {
            if let Some(oldest_key) = inner
                .entries
                .iter()
                .min_by_key(|(_, v)| v.inserted)
                .map(|(k, _)| k.clone())
            {
                inner.entries.remove(&oldest_key);
            }
        }

        let inserted = inner.next_seq;
        inner.next_seq += 1;
        inner.entries.insert(
            key,
            CacheEntry {
                embedding,
                model: model.to_string(),
                inserted,
            },
        );
        debug!("Cached embedding for text (model: {model})");
    }

    /// Check if an embedding is cached.
    pub async fn contains(&self, text: &str, model: &str) -> bool {
        let key = Self::hash_key(text, model);
        self.inner.read().await.entries.contains_key(&key)
    }

    /// Clear the entire cache.
    pub async fn clear(&self) {
        let mut inner = self.inner.write().await;
        inner.entries.clear();
        info!("Cleared embedding cache");
    }

    /// Get cache statistics.
    pub async fn stats(&self) -> CacheStats {
        let inner = self.inner.read().await;
        let mut models: Vec<String> = inner
            .entries
            .values()
            .map(|e| e.model.clone())
            .collect::<std::collections::HashSet<_>>()
            .into_iter()
            .collect();
        models.sort();

        CacheStats {
            entries: inner.entries.len(),
            max_entries: self.max_entries,
            hits: inner.hits,
            misses: inner.misses,
            models,
        }
    }
}

impl Default for EmbeddingCache {
    fn default() -> Self {
        Self::new(1024)
    }
}

/// Statistics about the embedding cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of entries in cache.
    pub entries: usize,

    /// Maximum cache size.
    pub max_entries: usize,

    /// Lookups served from the cache.
    pub hits: u64,

    /// Lookups that missed.
    pub misses: u64,

    /// Models with cached embeddings.
    pub models: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_cache_put_get() {
        let cache = EmbeddingCache::new(100);
        let embedding = vec![1.0, 2.0, 3.0];

        cache.put("hello", "model-1", embedding.clone()).await;

        assert_eq!(cache.get("hello", "model-1").await, Some(embedding));
        assert!(cache.get("hello", "model-2").await.is_none());
    }

    #[tokio::test]
    async fn test_cache_tracks_hits_and_misses() {
        let cache = EmbeddingCache::new(100);
        cache.put("a", "model", vec![1.0]).await;

        let _ = cache.get("a", "model").await;
        let _ = cache.get("b", "model").await;

        let stats = cache.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.models, vec!["model".to_string()]);
    }

    #[tokio::test]
    async fn test_cache_evicts_oldest() {
        let cache = EmbeddingCache::new(2);

        cache.put("a", "model", vec![1.0]).await;
        cache.put("b", "model", vec![2.0]).await;
        cache.put("c", "model", vec![3.0]).await;

        assert_eq!(cache.stats().await.entries, 2);
        assert!(!cache.contains("a", "model").await);
        assert!(cache.contains("c", "model").await);
    }
}
