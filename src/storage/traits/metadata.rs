//! Metadata backend trait.

use crate::Result;
use crate::models::{IndexedMemory, MemoryId};

/// Authoritative store for memory rows (document, content and metadata).
///
/// Vector backends only know ids; every search result is hydrated from here.
pub trait MetadataStore: Send {
    /// Inserts or replaces rows by id. All rows are written in one transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails; no row of the batch is kept.
    fn upsert_batch(&self, rows: &[IndexedMemory]) -> Result<()>;

    /// Retrieves a row by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn get(&self, id: &MemoryId) -> Result<Option<IndexedMemory>>;

    /// Retrieves several rows, preserving the order of `ids` and skipping
    /// ids that are not stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn get_many(&self, ids: &[MemoryId]) -> Result<Vec<IndexedMemory>> {
        let mut rows = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(row) = self.get(id)? {
                rows.push(row);
            }
        }
        Ok(rows)
    }

    /// Returns the newest rows first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn recent(&self, limit: usize) -> Result<Vec<IndexedMemory>>;

    /// Deletes a row by ID. Returns false if it was absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    fn remove(&self, id: &MemoryId) -> Result<bool>;

    /// Number of stored rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn count(&self) -> Result<usize>;

    /// Deletes every row.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    fn clear(&self) -> Result<()>;
}
