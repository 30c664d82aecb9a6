//! Character profile types.
//!
//! The profile is a single aggregate holding everything mutable about a
//! character. It is serialized as one JSON document by the profile store.

use super::MemoryId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Name given to a freshly defaulted profile.
pub const DEFAULT_CHARACTER_NAME: &str = "New Character";

/// Mood assigned when none has been recorded.
pub const DEFAULT_MOOD: &str = "Neutral";

/// Hex characters of the digest kept in a daily-log memory id.
const LOG_ID_HASH_LEN: usize = 16;

/// Inclusive bounds for relationship affinity.
pub const AFFINITY_RANGE: (i64, i64) = (-100, 100);

/// The character's complete mutable state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterProfile {
    /// Display name.
    pub name: String,
    /// Setting fields.
    #[serde(default)]
    pub context: SocialContext,
    /// Traits, values and mood.
    #[serde(default)]
    pub personality: Personality,
    /// Relationships keyed by target name.
    #[serde(default)]
    pub relationships: BTreeMap<String, Relationship>,
    /// Money and possessions.
    #[serde(default)]
    pub wealth: Wealth,
    /// Physical condition.
    #[serde(default)]
    pub health: Health,
    /// Skills, unique by name.
    #[serde(default)]
    pub skills: Vec<Skill>,
    /// Chronological, append-only activity log.
    #[serde(default)]
    pub daily_log: Vec<DailyLogEntry>,
    /// Last time the profile was persisted after a mutation.
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl CharacterProfile {
    /// Creates an empty profile with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            context: SocialContext::default(),
            personality: Personality::default(),
            relationships: BTreeMap::new(),
            wealth: Wealth::default(),
            health: Health::default(),
            skills: Vec::new(),
            daily_log: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    /// Looks up a skill by name.
    #[must_use]
    pub fn skill(&self, name: &str) -> Option<&Skill> {
        self.skills.iter().find(|s| s.name == name)
    }

    /// Serializes the profile as the canonical compact JSON document.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_canonical_json(&self) -> crate::Result<String> {
        serde_json::to_string(self).map_err(|e| crate::Error::storage("serialize_profile", e))
    }
}

impl Default for CharacterProfile {
    fn default() -> Self {
        Self::new(DEFAULT_CHARACTER_NAME)
    }
}

/// Free-text setting fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialContext {
    /// The general setting or world view.
    #[serde(default)]
    pub world_view: String,
    /// Current job or role.
    #[serde(default)]
    pub occupation: String,
    /// Current physical location.
    #[serde(default)]
    pub current_location: String,
}

/// Personality and values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Personality {
    /// Trait scores, e.g. `{"Openness": 8}`.
    #[serde(default)]
    pub traits: BTreeMap<String, i64>,
    /// Core values, ordered, without duplicates.
    #[serde(default)]
    pub values: Vec<String>,
    /// Current emotional state.
    #[serde(default = "default_mood")]
    pub mood: String,
    /// Notable personality changes, oldest first.
    #[serde(default)]
    pub growth_history: Vec<String>,
}

fn default_mood() -> String {
    DEFAULT_MOOD.to_string()
}

impl Default for Personality {
    fn default() -> Self {
        Self {
            traits: BTreeMap::new(),
            values: Vec::new(),
            mood: default_mood(),
            growth_history: Vec::new(),
        }
    }
}

/// A relationship with another named entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    /// Who the relationship is with.
    pub target_name: String,
    /// Affinity score, kept within [`AFFINITY_RANGE`] by merges.
    #[serde(default)]
    pub affinity: i64,
    /// Labels such as "Friend" or "Rival".
    #[serde(default)]
    pub tags: Vec<String>,
    /// Key interaction notes, append-only.
    #[serde(default)]
    pub history: Vec<String>,
}

impl Relationship {
    /// Creates a neutral relationship with no tags or history.
    #[must_use]
    pub fn new(target_name: impl Into<String>) -> Self {
        Self {
            target_name: target_name.into(),
            affinity: 0,
            tags: Vec::new(),
            history: Vec::new(),
        }
    }
}

/// Clamps an affinity score into [`AFFINITY_RANGE`].
#[must_use]
pub fn clamp_affinity(value: i64) -> i64 {
    value.clamp(AFFINITY_RANGE.0, AFFINITY_RANGE.1)
}

/// Money and possessions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Wealth {
    /// Spendable currency.
    #[serde(default)]
    pub currency: f64,
    /// Notable possessions.
    #[serde(default)]
    pub assets: Vec<String>,
}

/// Physical condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    /// Hit points.
    #[serde(default = "full")]
    pub hp: i64,
    /// Stamina.
    #[serde(default = "full")]
    pub stamina: i64,
    /// Active conditions.
    #[serde(default)]
    pub status_effects: Vec<String>,
}

const fn full() -> i64 {
    100
}

impl Default for Health {
    fn default() -> Self {
        Self {
            hp: full(),
            stamina: full(),
            status_effects: Vec::new(),
        }
    }
}

/// A learned skill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skill {
    /// Unique skill name.
    pub name: String,
    /// Proficiency level.
    #[serde(default = "first_level")]
    pub level: i64,
    /// What the skill covers.
    #[serde(default)]
    pub description: String,
}

const fn first_level() -> i64 {
    1
}

/// One entry of the daily activity log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyLogEntry {
    /// When the activity was logged.
    pub timestamp: DateTime<Utc>,
    /// Summary of what happened.
    pub activity: String,
    /// Names of people interacted with.
    #[serde(default)]
    pub interacted_with: Vec<String>,
}

impl DailyLogEntry {
    /// Creates an entry stamped with the current time.
    #[must_use]
    pub fn now(activity: impl Into<String>, interacted_with: Vec<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            activity: activity.into(),
            interacted_with,
        }
    }

    /// Renders the entry as the text stored in long-term memory.
    #[must_use]
    pub fn render(&self) -> String {
        format!(
            "Daily Log ({}): {}. Interacted with: {}",
            self.timestamp.format("%Y-%m-%d"),
            self.activity,
            self.interacted_with.join(", ")
        )
    }

    /// Deterministic id of the memory item mirroring this entry.
    ///
    /// Derived from the timestamp and activity, so every writer of the same
    /// entry upserts one item.
    #[must_use]
    pub fn memory_id(&self) -> MemoryId {
        let mut hasher = Sha256::new();
        hasher.update(self.timestamp.to_rfc3339().as_bytes());
        hasher.update(self.activity.as_bytes());
        let digest = hex::encode(hasher.finalize());
        MemoryId::new(format!("daily_log_{}", &digest[..LOG_ID_HASH_LEN]))
    }
}
