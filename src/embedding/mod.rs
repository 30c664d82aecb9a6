//! Embedding generation.
//!
//! The memory stream never computes embeddings itself; it asks an [`Embedder`].
//! [`HashedEmbedder`] is the deterministic local default. With the
//! `fastembed-embeddings` feature, [`FastEmbedEmbedder`] provides ONNX-based
//! semantic embeddings.

// Allow cast precision loss for hash-based embedding calculations.
#![allow(clippy::cast_precision_loss)]
// Allow cast possible truncation for hash index calculations on 32-bit platforms.
#![allow(clippy::cast_possible_truncation)]

mod cached;
#[cfg(feature = "fastembed-embeddings")]
mod fastembed;
mod hashed;

pub use cached::CachedEmbedder;
#[cfg(feature = "fastembed-embeddings")]
pub use fastembed::FastEmbedEmbedder;
pub use hashed::HashedEmbedder;

use crate::Result;
use crate::config::AnimaConfig;

/// Default embedding dimensions (all-MiniLM-L6-v2).
pub const DEFAULT_DIMENSIONS: usize = 384;

/// Trait for embedding generators.
pub trait Embedder: Send + Sync {
    /// Returns the embedding dimensions.
    fn dimensions(&self) -> usize;

    /// Generates an embedding for the given text.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding generation fails.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generates embeddings for multiple texts.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding generation fails.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

impl<E: Embedder + ?Sized> Embedder for Box<E> {
    fn dimensions(&self) -> usize {
        (**self).dimensions()
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        (**self).embed(text)
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        (**self).embed_batch(texts)
    }
}

/// Builds the embedder selected by the enabled features, wrapped in a cache.
#[must_use]
pub fn default_embedder(config: &AnimaConfig) -> Box<dyn Embedder> {
    #[cfg(feature = "fastembed-embeddings")]
    let inner: Box<dyn Embedder> = Box::new(FastEmbedEmbedder::new());
    #[cfg(not(feature = "fastembed-embeddings"))]
    let inner: Box<dyn Embedder> = Box::new(HashedEmbedder::new(config.embedding_dimensions));

    Box::new(CachedEmbedder::new(inner, config.embedding_cache_size))
}
