//! Brute-force vector backend persisted as JSON.
//!
//! Computes cosine similarity against every stored vector (O(n) per query).
//! Character memory streams are small enough that exact search is cheap, and
//! exact search gives stable rankings.

use crate::models::MemoryId;
use crate::storage::traits::VectorBackend;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Exact cosine-similarity backend.
pub struct FlatVectorBackend {
    /// Path to the index file; empty for in-memory backends.
    index_path: PathBuf,
    /// Embedding dimensions.
    dimensions: usize,
    /// `memory_id` -> embedding.
    vectors: HashMap<String, Vec<f32>>,
    /// Whether the index has been modified since last save.
    dirty: bool,
}

/// Index data for serialization.
#[derive(Serialize, Deserialize)]
struct IndexData {
    dimensions: usize,
    vectors: HashMap<String, Vec<f32>>,
}

impl FlatVectorBackend {
    /// Opens a file-backed index, loading it if the file exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or
    /// was written with different dimensions.
    pub fn open(index_path: impl Into<PathBuf>, dimensions: usize) -> Result<Self> {
        let mut backend = Self {
            index_path: index_path.into(),
            dimensions,
            vectors: HashMap::new(),
            dirty: false,
        };
        backend.load()?;
        Ok(backend)
    }

    /// Creates an in-memory backend (no file persistence).
    #[must_use]
    pub fn in_memory(dimensions: usize) -> Self {
        Self {
            index_path: PathBuf::new(),
            dimensions,
            vectors: HashMap::new(),
            dirty: false,
        }
    }

    /// Returns the index path.
    #[must_use]
    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    fn is_persistent(&self) -> bool {
        !self.index_path.as_os_str().is_empty()
    }

    fn load(&mut self) -> Result<()> {
        if !self.is_persistent() || !self.index_path.exists() {
            return Ok(());
        }

        let content =
            fs::read_to_string(&self.index_path).map_err(|e| Error::index("load_index", e))?;
        let data: IndexData =
            serde_json::from_str(&content).map_err(|e| Error::index("parse_index", e))?;

        if data.dimensions != self.dimensions {
            return Err(Error::index(
                "load_index",
                format!(
                    "index dimensions mismatch: expected {}, got {}",
                    self.dimensions, data.dimensions
                ),
            ));
        }

        self.vectors = data.vectors;
        self.dirty = false;
        Ok(())
    }

    fn save(&mut self) -> Result<()> {
        if !self.is_persistent() || !self.dirty {
            return Ok(());
        }

        let data = IndexData {
            dimensions: self.dimensions,
            vectors: self.vectors.clone(),
        };
        let content =
            serde_json::to_string(&data).map_err(|e| Error::index("serialize_index", e))?;

        if let Some(parent) = self.index_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| Error::index("create_index_dir", e))?;
        }

        let tmp = self.index_path.with_extension("json.tmp");
        fs::write(&tmp, content).map_err(|e| Error::index("write_index", e))?;
        fs::rename(&tmp, &self.index_path).map_err(|e| Error::index("write_index", e))?;

        self.dirty = false;
        Ok(())
    }

    /// Cosine similarity normalized from -1..=1 to 0..=1.
    fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() {
            return 0.0;
        }

        let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.5;
        }

        f32::midpoint(dot_product / (norm_a * norm_b), 1.0)
    }

    fn validate_embedding(&self, embedding: &[f32]) -> Result<()> {
        if embedding.len() != self.dimensions {
            return Err(Error::index(
                "validate_embedding",
                format!(
                    "embedding dimension mismatch: expected {}, got {}",
                    self.dimensions,
                    embedding.len()
                ),
            ));
        }
        Ok(())
    }
}

impl VectorBackend for FlatVectorBackend {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn upsert(&mut self, id: &MemoryId, embedding: &[f32]) -> Result<()> {
        self.validate_embedding(embedding)?;
        self.vectors
            .insert(id.as_str().to_string(), embedding.to_vec());
        self.dirty = true;
        Ok(())
    }

    fn remove(&mut self, id: &MemoryId) -> Result<bool> {
        let removed = self.vectors.remove(id.as_str()).is_some();
        if removed {
            self.dirty = true;
        }
        Ok(removed)
    }

    fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<(MemoryId, f32)>> {
        self.validate_embedding(query_embedding)?;
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut scores: Vec<(&String, f32)> = self
            .vectors
            .iter()
            .map(|(id, vec)| (id, Self::cosine_similarity(query_embedding, vec)))
            .collect();

        // Descending score, ties broken by id for stable output.
        scores.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(b.0))
        });

        Ok(scores
            .into_iter()
            .take(limit)
            .map(|(id, score)| (MemoryId::new(id.clone()), score))
            .collect())
    }

    fn count(&self) -> Result<usize> {
        Ok(self.vectors.len())
    }

    fn clear(&mut self) -> Result<()> {
        self.vectors.clear();
        self.dirty = true;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.save()
    }
}

impl Drop for FlatVectorBackend {
    fn drop(&mut self) {
        if let Err(e) = self.save() {
            tracing::warn!(error = %e, "Failed to save vector index on drop");
        }
    }
}
