//! Data models for anima.
//!
//! This module contains the character profile, memory stream items, reflection
//! deltas and conversation types shared by every other layer.

mod conversation;
mod delta;
mod memory;
pub mod presets;
mod profile;

pub use conversation::{ChatMessage, Role, render_transcript};
pub use delta::{
    ContextDelta, DailyLogDelta, PersonalityDelta, ReflectionDelta, RelationshipDelta, SkillDelta,
};
pub use memory::{
    DAILY_LOG_IMPORTANCE, IMPORTANCE_RANGE, IndexedMemory, MemoryId, MemoryItem, MemoryMetadata,
    MemoryType, RetrievedMemory, TURN_IMPORTANCE, clamp_importance,
};
pub use profile::{
    AFFINITY_RANGE, CharacterProfile, DEFAULT_CHARACTER_NAME, DEFAULT_MOOD, DailyLogEntry, Health,
    Personality, Relationship, Skill, SocialContext, Wealth, clamp_affinity,
};
