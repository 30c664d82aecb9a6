//! Vector backend trait.
//!
//! Provides the abstraction layer for embedding similarity search. The memory
//! stream owns the embeddings it hands to a backend and only ever asks for
//! ids back.
//!
//! # Usage Example
//!
//! ```rust,ignore
//! use anima::storage::vector::FlatVectorBackend;
//! use anima::storage::traits::VectorBackend;
//! use anima::models::MemoryId;
//!
//! let mut backend = FlatVectorBackend::in_memory(384);
//! backend.upsert(&MemoryId::new("mem-001"), &embedding)?;
//!
//! for (id, similarity) in backend.search(&query_embedding, 10)? {
//!     println!("{}: {:.2}", id, similarity);
//! }
//! ```

use crate::Result;
use crate::models::MemoryId;

/// Trait for vector layer backends.
///
/// All embeddings must match the backend's [`dimensions()`](VectorBackend::dimensions).
pub trait VectorBackend: Send {
    /// The dimensionality of embedding vectors.
    fn dimensions(&self) -> usize;

    /// Inserts or replaces the embedding stored under `id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedding has the wrong size or cannot be stored.
    fn upsert(&mut self, id: &MemoryId, embedding: &[f32]) -> Result<()>;

    /// Removes an embedding by memory ID. Returns false if it was absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the removal operation fails.
    fn remove(&mut self, id: &MemoryId) -> Result<bool>;

    /// Searches for similar embeddings.
    ///
    /// Returns memory IDs with cosine similarity scores normalized to
    /// 0.0..=1.0, ordered by descending similarity.
    ///
    /// # Errors
    ///
    /// Returns an error if the query has the wrong size or the search fails.
    fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<(MemoryId, f32)>>;

    /// Returns the total count of indexed embeddings.
    ///
    /// # Errors
    ///
    /// Returns an error if the count operation fails.
    fn count(&self) -> Result<usize>;

    /// Clears all embeddings.
    ///
    /// # Errors
    ///
    /// Returns an error if the clear operation fails.
    fn clear(&mut self) -> Result<()>;

    /// Persists pending changes, if the backend is file-backed.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be written.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}
