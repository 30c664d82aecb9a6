//! LRU-cached embedder wrapper.

use super::Embedder;
use crate::Result;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;

/// Wraps an embedder with an in-process LRU cache keyed by text.
///
/// A capacity of zero disables caching.
pub struct CachedEmbedder<E> {
    inner: E,
    cache: Option<Mutex<LruCache<String, Vec<f32>>>>,
}

impl<E: Embedder> CachedEmbedder<E> {
    /// Creates a cache of the given capacity around `inner`.
    #[must_use]
    pub fn new(inner: E, capacity: usize) -> Self {
        let cache = NonZeroUsize::new(capacity).map(|cap| Mutex::new(LruCache::new(cap)));
        Self { inner, cache }
    }

    /// Number of cached entries.
    #[must_use]
    pub fn cached_len(&self) -> usize {
        self.cache
            .as_ref()
            .map_or(0, |cache| match cache.lock() {
                Ok(guard) => guard.len(),
                Err(poisoned) => poisoned.into_inner().len(),
            })
    }
}

impl<E: Embedder> Embedder for CachedEmbedder<E> {
    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let Some(cache) = &self.cache else {
            return self.inner.embed(text);
        };

        {
            let mut guard = match cache.lock() {
                Ok(guard) => guard,
                Err(poisoned) => {
                    tracing::warn!("Embedding cache mutex was poisoned, recovering");
                    poisoned.into_inner()
                },
            };
            if let Some(hit) = guard.get(text) {
                metrics::counter!("embedding_cache_total", "result" => "hit").increment(1);
                return Ok(hit.clone());
            }
        }

        metrics::counter!("embedding_cache_total", "result" => "miss").increment(1);
        let embedding = self.inner.embed(text)?;

        let mut guard = match cache.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.put(text.to_string(), embedding.clone());
        Ok(embedding)
    }
}
