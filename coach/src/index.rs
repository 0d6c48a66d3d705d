//! Fail-open, memoized access to the embedding provider.

use std::sync::Arc;

use quill_embeddings::{Embedding, EmbeddingCache, EmbeddingProvider, EmbeddingRequest};
use tracing::{debug, warn};

/// Obtains embeddings for block content.
///
/// Results are memoized by content snapshot, so submitting unchanged text
/// again never costs a provider call. A provider failure resolves to `None`
/// instead of an error; blocks without an embedding simply sit out of every
/// similarity computation.
pub struct EmbeddingIndex {
    provider: Arc<dyn EmbeddingProvider>,
    cache: EmbeddingCache,
}

impl EmbeddingIndex {
    /// Create an index over `provider` with a default-sized cache.
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            provider,
            cache: EmbeddingCache::default(),
        }
    }

    /// Use a specific cache.
    pub fn with_cache(mut self, cache: EmbeddingCache) -> Self {
        self.cache = cache;
        self
    }

    /// Embed `text`, or `None` if the provider failed.
    pub async fn embed(&self, text: &str) -> Option<Embedding> {
        let model = self.provider.default_model().to_string();

        if let Some(embedding) = self.cache.get(text, &model).await {
            debug!("Cache hit for embedding");
            return Some(embedding);
        }

        match self.provider.embed(EmbeddingRequest::new(text)).await {
            Ok(response) => {
                self.cache
                    .put(text, &model, response.embedding.clone())
                    .await;
                Some(response.embedding)
            }
            Err(e) => {
                warn!(
                    "Embedding via {} failed, continuing without one: {e}",
                    self.provider.name()
                );
                None
            }
        }
    }

    /// The memoization cache.
    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }
}
