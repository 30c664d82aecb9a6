//! Persona prompt builder.

use crate::models::{CharacterProfile, RetrievedMemory};
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Default name for the person the character is talking to.
pub const DEFAULT_INTERLOCUTOR: &str = "User";

/// The person on the other side of the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interlocutor {
    /// Display name.
    pub name: String,
    /// Free-form description given to the character.
    #[serde(default)]
    pub persona: String,
}

impl Interlocutor {
    /// Creates an interlocutor with an empty persona.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            persona: String::new(),
        }
    }

    /// Sets the persona.
    #[must_use]
    pub fn with_persona(mut self, persona: impl Into<String>) -> Self {
        self.persona = persona.into();
        self
    }
}

impl Default for Interlocutor {
    fn default() -> Self {
        Self::new(DEFAULT_INTERLOCUTOR)
    }
}

/// Renders the character's system prompt.
///
/// Traits appear sorted by name as `Name: value`, so equal profiles always
/// produce byte-identical prompts.
#[must_use]
pub fn build_system_prompt(profile: &CharacterProfile, interlocutor: &Interlocutor) -> String {
    let context = &profile.context;
    let personality = &profile.personality;

    let traits = personality
        .traits
        .iter()
        .map(|(name, value)| format!("{name}: {value}"))
        .collect::<Vec<_>>()
        .join(", ");
    let values = personality.values.join(", ");

    let mut prompt = String::new();
    let _ = writeln!(prompt, "You are {}.", profile.name);
    let _ = writeln!(
        prompt,
        "Context: {}. You are a {} at {}.",
        context.world_view, context.occupation, context.current_location
    );
    let _ = writeln!(
        prompt,
        "Personality: {traits}. Values: {values}. Mood: {}.",
        personality.mood
    );
    let _ = writeln!(
        prompt,
        "Status: Health {}, Wealth {:.1}.",
        profile.health.hp, profile.wealth.currency
    );
    prompt.push('\n');
    let _ = writeln!(prompt, "Interacting with: {}", interlocutor.name);
    let _ = writeln!(prompt, "User Context: {}", interlocutor.persona);
    prompt.push('\n');
    prompt.push_str("Respond naturally based on your memory and current state.");
    prompt
}

/// Joins retrieved memories into the context block, one `- content` line each.
#[must_use]
pub fn render_context(memories: &[RetrievedMemory]) -> String {
    memories
        .iter()
        .map(|memory| format!("- {}", memory.content))
        .collect::<Vec<_>>()
        .join("\n")
}
