//! Storage layer.
//!
//! - **Profile**: the character profile as a single JSON document
//! - **Metadata**: memory rows in `SQLite`, authoritative for content
//! - **Vector**: embeddings ranked by cosine similarity
//!
//! [`MemoryStream`] composes the metadata and vector layers with an embedder.

// Allow cast precision loss for score calculations where exact precision is not critical.
#![allow(clippy::cast_precision_loss)]
// Allow significant_drop_tightening - dropping database connections slightly early
// provides no meaningful benefit.
#![allow(clippy::significant_drop_tightening)]
// Allow redundant_closure_call for the instrumented `(|| { ... })()` blocks.
#![allow(clippy::redundant_closure_call)]

pub mod profile;
pub mod sqlite;
pub mod stream;
pub mod traits;
pub mod vector;

pub use profile::{InMemoryProfileStore, JsonProfileStore};
pub use sqlite::SqliteMetadataStore;
pub use stream::MemoryStream;
pub use traits::{MetadataStore, ProfileStore, VectorBackend};
pub use vector::FlatVectorBackend;

use std::path::Path;

/// Total size in bytes of all files under `path`. Missing paths count as zero.
#[must_use]
pub fn dir_size(path: &Path) -> u64 {
    let Ok(metadata) = std::fs::symlink_metadata(path) else {
        return 0;
    };
    if metadata.is_file() {
        return metadata.len();
    }
    if !metadata.is_dir() {
        return 0;
    }
    std::fs::read_dir(path)
        .map(|entries| {
            entries
                .filter_map(std::result::Result::ok)
                .map(|entry| dir_size(&entry.path()))
                .sum()
        })
        .unwrap_or(0)
}
