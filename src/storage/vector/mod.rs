//! Vector backend implementations.

mod flat;

pub use flat::FlatVectorBackend;
