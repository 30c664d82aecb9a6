//! Prompts for the reflection pass.
//!
//! Reflection asks the model to compare a finished conversation with the
//! character's current profile and answer with a JSON delta. The key set
//! listed in [`build_reflection_prompt`] mirrors
//! [`ReflectionDelta`](crate::models::ReflectionDelta).

/// System prompt used for every reflection request.
pub const REFLECTION_SYSTEM_PROMPT: &str =
    "You are a backend system that manages character state. Output only JSON.";

/// Example delta shown to the model.
const DELTA_SHAPE: &str = r#"{
    "daily_log": { "activity": "...", "interacted_with": ["..."] },
    "mood": "...",
    "relationships": {
        "Target Name": { "affinity": 0, "tags": [], "history": ["..."] }
    },
    "skills_update": [
        { "name": "Skill Name", "level": 1, "description": "..." }
    ],
    "personality_update": {
        "traits": { "Trait Name": 5 },
        "values": ["Value 1", "Value 2"]
    },
    "context_update": {
        "occupation": "...",
        "current_location": "..."
    }
}"#;

/// Builds the reflection instruction.
///
/// `profile_json` is the canonical profile document and `transcript` the
/// rendered conversation, one `role: content` line per message.
#[must_use]
pub fn build_reflection_prompt(user_name: &str, profile_json: &str, transcript: &str) -> String {
    format!(
        r"Analyze the following interaction history and the current character profile.
The user's name is '{user_name}'.
Determine if any updates are needed for the character's internal state.

Current Profile (JSON):
{profile_json}

Interaction History:
{transcript}

Instructions:
1. Summarize the interaction into a 'Daily Log Entry'.
2. Update 'Mood' if changed.
3. Update 'Relationships' (create new or update existing affinity/history) if relevant.
4. Check for learning: did the character learn a new skill or improve an existing one?
5. Check for growth: did the character's personality traits or values change?
6. Check for life changes: did the character's occupation or location change?

Omit any key that has no update. Affinity ranges from -100 to 100.
Return ONLY a valid JSON object with the following structure (no markdown formatting):

{DELTA_SHAPE}"
    )
}
