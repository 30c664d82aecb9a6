//! FastEmbed-based embedder.
//!
//! Semantic embeddings from all-MiniLM-L6-v2 via fastembed-rs. Only compiled
//! with the `fastembed-embeddings` feature.

use super::{DEFAULT_DIMENSIONS, Embedder};
use crate::{Error, Result};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::OnceLock;
use std::time::Instant;

/// Lazily loaded model shared by all embedder instances.
static EMBEDDING_MODEL: OnceLock<fastembed::TextEmbedding> = OnceLock::new();

/// `FastEmbed` embedder using all-MiniLM-L6-v2.
///
/// The model is loaded on the first embed call.
pub struct FastEmbedEmbedder {
    model_name: &'static str,
}

impl FastEmbedEmbedder {
    /// Creates a new `FastEmbed` embedder.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            model_name: "all-MiniLM-L6-v2",
        }
    }

    /// Returns the model name.
    #[must_use]
    pub const fn model_name(&self) -> &'static str {
        self.model_name
    }

    fn get_model() -> Result<&'static fastembed::TextEmbedding> {
        if let Some(model) = EMBEDDING_MODEL.get() {
            return Ok(model);
        }

        tracing::info!("Loading embedding model (first use)...");
        let start = Instant::now();

        let options = fastembed::InitOptions::new(fastembed::EmbeddingModel::AllMiniLML6V2)
            .with_show_download_progress(false);
        let model = fastembed::TextEmbedding::try_new(options)
            .map_err(|e| Error::index("load_embedding_model", e))?;

        tracing::info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            model = "all-MiniLM-L6-v2",
            "Embedding model loaded"
        );

        // Another thread may have won the race; either model is fine.
        let _ = EMBEDDING_MODEL.set(model);
        EMBEDDING_MODEL
            .get()
            .ok_or_else(|| Error::index("get_embedding_model", "model initialization race"))
    }

    fn run(texts: Vec<String>, operation: &str) -> Result<Vec<Vec<f32>>> {
        let model = Self::get_model()?;

        // ONNX runtime can panic on malformed inputs.
        catch_unwind(AssertUnwindSafe(|| model.embed(texts, None)))
            .map_err(|panic_info| {
                let panic_msg = panic_info
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| panic_info.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::error!(panic_message = %panic_msg, "ONNX runtime panicked during embedding");
                Error::index(operation, format!("ONNX runtime panic: {panic_msg}"))
            })?
            .map_err(|e| Error::index(operation, e))
    }
}

impl Default for FastEmbedEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl Embedder for FastEmbedEmbedder {
    fn dimensions(&self) -> usize {
        DEFAULT_DIMENSIONS
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(Error::InvalidInput("Cannot embed empty text".to_string()));
        }
        Self::run(vec![text.to_string()], "embed")?
            .into_iter()
            .next()
            .ok_or_else(|| Error::index("embed", "no embedding returned from model"))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        if texts.iter().any(|t| t.trim().is_empty()) {
            return Err(Error::InvalidInput("Cannot embed empty text".to_string()));
        }
        Self::run(texts.iter().map(|s| (*s).to_string()).collect(), "embed_batch")
    }
}
