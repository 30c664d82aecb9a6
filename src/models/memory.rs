//! Memory stream types and identifiers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Inclusive bounds for memory importance.
pub const IMPORTANCE_RANGE: (i64, i64) = (1, 10);

/// Importance given to turn-level observations and actions.
pub const TURN_IMPORTANCE: i64 = 1;

/// Importance given to daily-log memories.
pub const DAILY_LOG_IMPORTANCE: i64 = 8;

/// Unique identifier for a memory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemoryId(String);

impl MemoryId {
    /// Creates a new memory ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for MemoryId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for MemoryId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Kind of memory item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    /// Something the character perceived, e.g. a user utterance.
    Observation,
    /// An internal thought.
    Thought,
    /// Something the character did or said.
    Action,
    /// A daily-log summary produced by reflection.
    DailyLog,
}

impl MemoryType {
    /// All memory types, in declaration order.
    pub const ALL: [Self; 4] = [Self::Observation, Self::Thought, Self::Action, Self::DailyLog];

    /// Returns the stored name of this type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Observation => "observation",
            Self::Thought => "thought",
            Self::Action => "action",
            Self::DailyLog => "daily_log",
        }
    }
}

impl fmt::Display for MemoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemoryType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "observation" => Ok(Self::Observation),
            "thought" => Ok(Self::Thought),
            "action" => Ok(Self::Action),
            "daily_log" | "daily-log" => Ok(Self::DailyLog),
            other => Err(crate::Error::InvalidInput(format!(
                "unknown memory type: {other}"
            ))),
        }
    }
}

/// One unit in the memory stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryItem {
    /// Unique identifier; re-adding the same id overwrites.
    pub id: MemoryId,
    /// When the memory was formed.
    pub timestamp: DateTime<Utc>,
    /// Kind of memory.
    #[serde(rename = "type")]
    pub memory_type: MemoryType,
    /// Full text, returned to callers verbatim.
    pub content: String,
    /// Text embedded in place of `content` when present.
    #[serde(default)]
    pub summary: Option<String>,
    /// Importance from 1 to 10.
    pub importance: i64,
    /// Names of people or things the memory concerns.
    #[serde(default)]
    pub related_entities: Vec<String>,
}

impl MemoryItem {
    /// Creates an item with a fresh id, the current time and importance 1.
    #[must_use]
    pub fn new(memory_type: MemoryType, content: impl Into<String>) -> Self {
        Self {
            id: MemoryId::generate(),
            timestamp: Utc::now(),
            memory_type,
            content: content.into(),
            summary: None,
            importance: TURN_IMPORTANCE,
            related_entities: Vec::new(),
        }
    }

    /// Sets the id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<MemoryId>) -> Self {
        self.id = id.into();
        self
    }

    /// Sets the timestamp.
    #[must_use]
    pub const fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Sets the summary used for embedding.
    #[must_use]
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Sets the importance.
    #[must_use]
    pub const fn with_importance(mut self, importance: i64) -> Self {
        self.importance = importance;
        self
    }

    /// Sets the related entities.
    #[must_use]
    pub fn with_related_entities(mut self, entities: Vec<String>) -> Self {
        self.related_entities = entities;
        self
    }

    /// The text that gets embedded: the summary if present, else the content.
    #[must_use]
    pub fn document(&self) -> &str {
        match self.summary.as_deref() {
            Some(summary) if !summary.trim().is_empty() => summary,
            _ => &self.content,
        }
    }
}

/// Retrievable metadata stored alongside each indexed item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryMetadata {
    /// Kind of memory.
    #[serde(rename = "type")]
    pub memory_type: MemoryType,
    /// When the memory was formed.
    pub timestamp: DateTime<Utc>,
    /// Importance from 1 to 10.
    pub importance: i64,
}

/// The stored row behind a search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedMemory {
    /// Item id.
    pub id: MemoryId,
    /// The text that was embedded.
    pub document: String,
    /// The original full content.
    pub content: String,
    /// Type, timestamp and importance.
    pub metadata: MemoryMetadata,
    /// Names the item concerns.
    pub related_entities: Vec<String>,
}

/// A ranked search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedMemory {
    /// Item id.
    pub id: MemoryId,
    /// The original full content.
    pub content: String,
    /// Type, timestamp and importance.
    pub metadata: MemoryMetadata,
    /// Semantic distance; smaller is closer.
    pub distance: f32,
}

/// Clamps an importance value into [`IMPORTANCE_RANGE`].
#[must_use]
pub fn clamp_importance(value: i64) -> i64 {
    value.clamp(IMPORTANCE_RANGE.0, IMPORTANCE_RANGE.1)
}
