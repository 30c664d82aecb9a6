//! Storage backend traits.

mod metadata;
mod profile;
mod vector;

pub use metadata::MetadataStore;
pub use profile::ProfileStore;
pub use vector::VectorBackend;
