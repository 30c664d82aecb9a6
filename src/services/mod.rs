//! Business logic services.
//!
//! Services orchestrate storage, rendering and the completion provider.
//! [`MemoryManager`] is the entry point; the other modules hold the pieces
//! it composes.

pub mod backfill;
mod memory_manager;
pub mod reflection;
pub mod usage;

pub use backfill::BackfillReport;
pub use memory_manager::{ChatTurn, MemoryManager, MemoryStats, StreamingTurn};
pub use reflection::{
    MergeReport, ReflectionEngine, ReflectionOutcome, Staged, apply_delta, daily_log_memory,
    parse_delta,
};
pub use usage::{TokenUsage, UsageStats, estimate_tokens};
