//! Typed reflection deltas.
//!
//! A delta is the partially populated set of changes proposed by a reflection
//! pass. Every field is optional: `None` means "no change in that dimension",
//! while `Some(vec![])` is a present-but-empty value. Unknown keys are
//! rejected at decode time so malformed shapes never reach the merge.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Proposed changes to a character profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReflectionDelta {
    /// A new daily-log entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daily_log: Option<DailyLogDelta>,
    /// Replacement mood.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<String>,
    /// Relationship upserts keyed by target name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationships: Option<BTreeMap<String, RelationshipDelta>>,
    /// Skill upserts matched by name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skills_update: Option<Vec<SkillDelta>>,
    /// Trait and value changes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personality_update: Option<PersonalityDelta>,
    /// Occupation and location changes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_update: Option<ContextDelta>,
}

/// A daily-log entry proposed by reflection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DailyLogDelta {
    /// Summary of what happened.
    pub activity: String,
    /// Names of people interacted with.
    #[serde(default)]
    pub interacted_with: Vec<String>,
}

/// Changes to one relationship.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelationshipDelta {
    /// Replacement affinity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affinity: Option<i64>,
    /// Replacement tag set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    /// Notes appended to the history.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<String>>,
}

/// A skill to add or update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SkillDelta {
    /// Skill name, the upsert key.
    pub name: String,
    /// New level.
    pub level: i64,
    /// New description.
    pub description: String,
}

/// Personality changes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PersonalityDelta {
    /// Trait scores merged key by key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traits: Option<BTreeMap<String, i64>>,
    /// Values unioned into the existing set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<String>>,
}

/// Setting changes. Empty strings mean "unchanged".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContextDelta {
    /// New occupation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occupation: Option<String>,
    /// New location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_location: Option<String>,
}

impl ReflectionDelta {
    /// Returns true when no dimension is present.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.daily_log.is_none()
            && self.mood.is_none()
            && self.relationships.is_none()
            && self.skills_update.is_none()
            && self.personality_update.is_none()
            && self.context_update.is_none()
    }

    /// Checks structural rules serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns a description of the first violation found.
    pub fn validate(&self) -> Result<(), String> {
        if self.mood.as_ref().is_some_and(|mood| mood.trim().is_empty()) {
            return Err("mood must not be empty".to_string());
        }
        if let Some(log) = &self.daily_log {
            if log.activity.trim().is_empty() {
                return Err("daily_log.activity must not be empty".to_string());
            }
            if log.interacted_with.iter().any(|n| n.trim().is_empty()) {
                return Err("daily_log.interacted_with contains an empty name".to_string());
            }
        }
        if let Some(relationships) = &self.relationships
            && relationships.keys().any(|name| name.trim().is_empty())
        {
            return Err("relationships contains an empty name".to_string());
        }
        if let Some(skills) = &self.skills_update
            && skills.iter().any(|s| s.name.trim().is_empty())
        {
            return Err("skills_update contains a skill without a name".to_string());
        }
        if let Some(traits) = self
            .personality_update
            .as_ref()
            .and_then(|p| p.traits.as_ref())
            && traits.keys().any(|name| name.trim().is_empty())
        {
            return Err("personality_update.traits contains an empty trait name".to_string());
        }
        Ok(())
    }
}
