//! Mirrors profile daily-log entries into the memory stream.
//!
//! Ids are derived from the entry itself, so running the backfill twice, or
//! after a reflection already mirrored an entry, overwrites the same items
//! instead of duplicating them.

use crate::models::{DailyLogEntry, MemoryItem};
use crate::services::reflection::daily_log_memory;

/// Result of a backfill run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackfillReport {
    /// Daily-log entries found in the profile.
    pub scanned: usize,
    /// Memory items written.
    pub written: usize,
}

/// Builds the memory items for every entry.
#[must_use]
pub fn backfill_items(entries: &[DailyLogEntry]) -> Vec<MemoryItem> {
    entries
        .iter()
        .map(daily_log_memory)
        .collect()
}
