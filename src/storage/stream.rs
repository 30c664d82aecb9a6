//! The memory stream: embedded, semantically searchable memory items.
//!
//! A stream composes three collaborators:
//!
//! | Layer | Holds | Default |
//! |-------|-------|---------|
//! | [`Embedder`] | text -> vector | [`HashedEmbedder`](crate::embedding::HashedEmbedder) |
//! | [`VectorBackend`] | id -> vector, cosine ranking | [`FlatVectorBackend`] |
//! | [`MetadataStore`] | id -> document, content, metadata | [`SqliteMetadataStore`] |
//!
//! The embedded text is the item's summary when it has one, while search
//! results always carry the original content.
//!
//! Batch writes are not atomic across layers: rows are committed in one
//! transaction, then vectors are upserted. Callers should treat writes as
//! best-effort, at-least-once.

use crate::embedding::Embedder;
use crate::models::{
    IndexedMemory, MemoryId, MemoryItem, MemoryMetadata, MemoryType, RetrievedMemory,
    clamp_importance,
};
use crate::storage::sqlite::SqliteMetadataStore;
use crate::storage::traits::{MetadataStore, VectorBackend};
use crate::storage::vector::FlatVectorBackend;
use crate::{Error, Result};
use chrono::Utc;
use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;
use tracing::instrument;

/// File name of the vector index inside the memory directory.
pub const VECTOR_INDEX_FILE: &str = "vectors.json";

/// File name of the metadata database inside the memory directory.
pub const METADATA_DB_FILE: &str = "memories.db";

/// Owns memory items and ranks them by semantic distance.
pub struct MemoryStream {
    embedder: Box<dyn Embedder>,
    vectors: Box<dyn VectorBackend>,
    metadata: Box<dyn MetadataStore>,
}

impl MemoryStream {
    /// Composes a stream from its three layers.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedder and vector backend disagree on
    /// dimensions.
    pub fn new(
        embedder: Box<dyn Embedder>,
        vectors: Box<dyn VectorBackend>,
        metadata: Box<dyn MetadataStore>,
    ) -> Result<Self> {
        if embedder.dimensions() != vectors.dimensions() {
            return Err(Error::index(
                "open_stream",
                format!(
                    "embedder produces {} dimensions but the vector index holds {}",
                    embedder.dimensions(),
                    vectors.dimensions()
                ),
            ));
        }
        Ok(Self {
            embedder,
            vectors,
            metadata,
        })
    }

    /// Opens the file-backed stream stored in `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the index or database cannot be opened.
    pub fn open(dir: &Path, embedder: Box<dyn Embedder>) -> Result<Self> {
        let dims = embedder.dimensions();
        let vectors = FlatVectorBackend::open(dir.join(VECTOR_INDEX_FILE), dims)?;
        let metadata = SqliteMetadataStore::open(dir.join(METADATA_DB_FILE))?;
        Self::new(embedder, Box::new(vectors), Box::new(metadata))
    }

    /// Creates a stream that lives only in memory.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn in_memory(embedder: Box<dyn Embedder>) -> Result<Self> {
        let dims = embedder.dimensions();
        Self::new(
            embedder,
            Box::new(FlatVectorBackend::in_memory(dims)),
            Box::new(SqliteMetadataStore::in_memory()?),
        )
    }

    /// Indexes items, overwriting any existing entries with the same ids.
    ///
    /// Importance is clamped to 1..=10.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Index`] if embedding or storage fails. Rows may have
    /// been committed even if a later vector write failed.
    #[instrument(name = "anima.stream.add", skip(self, items), fields(component = "memory_stream", operation = "add", count = items.len()))]
    pub fn add(&mut self, items: &[MemoryItem]) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }

        let documents: Vec<&str> = items.iter().map(MemoryItem::document).collect();
        let embeddings = self.embedder.embed_batch(&documents)?;

        let rows: Vec<IndexedMemory> = items.iter().map(Self::to_row).collect();
        self.metadata.upsert_batch(&rows)?;

        for (row, embedding) in rows.iter().zip(&embeddings) {
            self.vectors.upsert(&row.id, embedding)?;
        }
        self.vectors.flush()?;

        tracing::debug!(count = rows.len(), "Indexed memory items");
        Ok(())
    }

    fn to_row(item: &MemoryItem) -> IndexedMemory {
        let importance = clamp_importance(item.importance);
        if importance != item.importance {
            tracing::debug!(
                memory.id = %item.id,
                requested = item.importance,
                clamped = importance,
                "Clamped memory importance"
            );
        }
        IndexedMemory {
            id: item.id.clone(),
            document: item.document().to_string(),
            content: item.content.clone(),
            metadata: MemoryMetadata {
                memory_type: item.memory_type,
                timestamp: item.timestamp,
                importance,
            },
            related_entities: item.related_entities.clone(),
        }
    }

    /// Returns up to `k` items ordered by ascending distance (closest first).
    ///
    /// An empty stream, a blank query or `k == 0` yields no results.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Index`] if embedding or lookup fails.
    #[instrument(name = "anima.stream.search", skip(self, query), fields(component = "memory_stream", operation = "search"))]
    pub fn search(&self, query: &str, k: usize) -> Result<Vec<RetrievedMemory>> {
        let start = Instant::now();
        let result = self.ranked(query, k);
        metrics::histogram!("retrieval_duration_ms").record(start.elapsed().as_secs_f64() * 1000.0);
        result
    }

    fn ranked(&self, query: &str, k: usize) -> Result<Vec<RetrievedMemory>> {
        if k == 0 || query.trim().is_empty() || self.vectors.count()? == 0 {
            return Ok(Vec::new());
        }

        let query_embedding = self.embedder.embed(query)?;
        let hits = self.vectors.search(&query_embedding, k)?;

        let ids: Vec<MemoryId> = hits.iter().map(|(id, _)| id.clone()).collect();
        let mut rows: HashMap<MemoryId, IndexedMemory> = self
            .metadata
            .get_many(&ids)?
            .into_iter()
            .map(|row| (row.id.clone(), row))
            .collect();

        let mut results = Vec::with_capacity(hits.len());
        for (id, similarity) in hits {
            let Some(row) = rows.remove(&id) else {
                tracing::warn!(memory.id = %id, "Vector has no metadata row; skipping");
                continue;
            };
            results.push(RetrievedMemory {
                id,
                content: row.content,
                metadata: row.metadata,
                distance: 1.0 - similarity,
            });
        }
        Ok(results)
    }

    /// Replaces an item's content, type and importance.
    ///
    /// The new content becomes both the embedded document and the returned
    /// content; the summary and related entities are cleared and the
    /// timestamp is set to now. Returns false if the id is absent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Index`] if embedding or storage fails.
    #[instrument(name = "anima.stream.update", skip(self, content), fields(component = "memory_stream", operation = "update", memory.id = %id))]
    pub fn update(
        &mut self,
        id: &MemoryId,
        content: &str,
        memory_type: MemoryType,
        importance: i64,
    ) -> Result<bool> {
        if self.metadata.get(id)?.is_none() {
            return Ok(false);
        }

        let item = MemoryItem::new(memory_type, content)
            .with_id(id.clone())
            .with_timestamp(Utc::now())
            .with_importance(importance);
        let embedding = self.embedder.embed(item.document())?;

        self.metadata.upsert_batch(&[Self::to_row(&item)])?;
        self.vectors.upsert(id, &embedding)?;
        self.vectors.flush()?;
        Ok(true)
    }

    /// Removes an item. Returns false (not an error) if it was absent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Index`] if storage fails.
    #[instrument(name = "anima.stream.delete", skip(self), fields(component = "memory_stream", operation = "delete", memory.id = %id))]
    pub fn delete(&mut self, id: &MemoryId) -> Result<bool> {
        let row_removed = self.metadata.remove(id)?;
        let vector_removed = self.vectors.remove(id)?;
        self.vectors.flush()?;
        Ok(row_removed || vector_removed)
    }

    /// Looks up a stored item by id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Index`] if the lookup fails.
    pub fn get(&self, id: &MemoryId) -> Result<Option<IndexedMemory>> {
        self.metadata.get(id)
    }

    /// Returns the newest items first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Index`] if the query fails.
    pub fn recent(&self, limit: usize) -> Result<Vec<IndexedMemory>> {
        self.metadata.recent(limit)
    }

    /// Number of stored items.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Index`] if the count fails.
    pub fn count(&self) -> Result<usize> {
        self.metadata.count()
    }

    /// Persists any pending vector index changes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Index`] if the index cannot be written.
    pub fn flush(&mut self) -> Result<()> {
        self.vectors.flush()
    }
}
