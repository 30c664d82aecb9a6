//! `SQLite` infrastructure for the memory metadata store.
//!
//! - [`connection`]: lock acquisition with poison recovery, pragma setup
//! - [`metrics`]: shared operation metrics
//! - [`metadata`]: the [`SqliteMetadataStore`] itself

mod connection;
mod metadata;
mod metrics;

pub use connection::{acquire_lock, configure_connection};
pub use metadata::SqliteMetadataStore;
pub use metrics::{record_operation_metrics, status_of};
