//! # Anima
//!
//! Persistent identity and associative memory for conversational characters.
//!
//! A character is described by a structured [`CharacterProfile`] (personality,
//! relationships, status, skills, history) and an unbounded memory stream that
//! is searched by meaning rather than keyword.
//!
//! ## Components
//!
//! - Profile store: loads and persists the profile as a single JSON document
//! - Memory stream: embeds memory items and ranks them by semantic distance
//! - Prompt builder: renders profile state into a deterministic system prompt
//! - Memory manager: retrieval, prompt, generation and write-back in one facade
//! - Reflection engine: turns a finished conversation into a validated profile delta
//!
//! ## Example
//!
//! ```rust,ignore
//! use anima::{AnimaConfig, MemoryManager};
//!
//! let config = AnimaConfig::load_default();
//! let mut manager = MemoryManager::open(&config)?;
//! let turn = manager.chat("Do you remember the harbor?");
//! println!("{}", turn.display_text());
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

// Module declarations
pub mod cli;
pub mod config;
pub mod embedding;
pub mod llm;
pub mod models;
pub mod observability;
pub mod rendering;
pub mod services;
pub mod storage;

// Re-exports for convenience
pub use config::{AnimaConfig, LlmConfig};
pub use embedding::Embedder;
pub use llm::LlmProvider;
pub use models::{
    CharacterProfile, ChatMessage, DailyLogEntry, MemoryId, MemoryItem, MemoryType,
    ReflectionDelta, Relationship, RetrievedMemory, Role, Skill,
};
pub use rendering::{Interlocutor, build_system_prompt};
pub use services::{ChatTurn, MemoryManager, ReflectionOutcome, StreamingTurn};
pub use storage::{JsonProfileStore, MemoryStream, ProfileStore};

/// Error type for anima operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Unknown memory type names, bad CLI or config values |
/// | `Storage` | Profile document or config file cannot be read or written |
/// | `Index` | `SQLite` metadata, vector backend or embedding failures |
/// | `Generation` | Completion service unreachable, rejected, or credential missing |
/// | `ReflectionParse` | Reflection output is not a well-formed delta |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The profile store (or another file-backed resource) failed.
    #[error("storage operation '{operation}' failed: {cause}")]
    Storage {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// The memory index failed.
    #[error("index operation '{operation}' failed: {cause}")]
    Index {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// The generative completion service failed.
    #[error(transparent)]
    Generation(#[from] GenerationError),

    /// The reflection delta could not be decoded or validated.
    ///
    /// Carries the raw model output for operator diagnosis.
    #[error("reflection output could not be parsed: {reason}")]
    ReflectionParse {
        /// Why decoding or validation failed.
        reason: String,
        /// The raw response text.
        raw: String,
    },
}

/// Failures of the generative completion service.
///
/// These never cross the chat boundary as errors; presentation layers render
/// them with [`GenerationError::sentinel`].
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum GenerationError {
    /// No usable credential is configured.
    #[error("API key not set")]
    MissingCredential,

    /// The request could not be sent or the stream broke mid-flight.
    #[error("request failed: {0}")]
    Transport(String),

    /// The service answered with a non-success status.
    #[error("API returned status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, if any.
        body: String,
    },

    /// The response body did not have the expected shape.
    #[error("malformed response: {0}")]
    Response(String),
}

/// Sentinel text shown in place of a reply when no credential is configured.
pub const MISSING_CREDENTIAL_SENTINEL: &str = "Error: API Key not set.";

impl GenerationError {
    /// Renders the error as the plain-text sentinel shown inline by front-ends.
    #[must_use]
    pub fn sentinel(&self) -> String {
        match self {
            Self::MissingCredential => MISSING_CREDENTIAL_SENTINEL.to_string(),
            other => format!("Error calling LLM: {other}"),
        }
    }
}

impl Error {
    /// Builds a storage error from an operation label and a cause.
    pub fn storage(operation: &str, cause: impl std::fmt::Display) -> Self {
        Self::Storage {
            operation: operation.to_string(),
            cause: cause.to_string(),
        }
    }

    /// Builds an index error from an operation label and a cause.
    pub fn index(operation: &str, cause: impl std::fmt::Display) -> Self {
        Self::Index {
            operation: operation.to_string(),
            cause: cause.to_string(),
        }
    }
}

/// Result type alias for anima operations.
pub type Result<T> = std::result::Result<T, Error>;
