//! Profile store implementations.

mod filesystem;
mod memory;

pub use filesystem::JsonProfileStore;
pub use memory::InMemoryProfileStore;
