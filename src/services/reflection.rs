//! Reflection: derive a profile delta from a finished conversation and merge it.
//!
//! The engine makes one completion call per reflection and never retries.
//! Decoding is strict: a delta with unknown keys, mistyped values or blank
//! names is rejected as a whole before anything is merged. Merging happens
//! on a scratch copy of the profile so the caller can discard it if the
//! save fails.

use crate::llm::{
    GenerationRequest, LlmProvider, REFLECTION_SYSTEM_PROMPT, build_reflection_prompt,
    extract_json_from_response,
};
use crate::models::{
    CharacterProfile, ChatMessage, DAILY_LOG_IMPORTANCE, DailyLogEntry, MemoryId, MemoryItem,
    MemoryType, ReflectionDelta, Relationship, Skill, clamp_affinity, render_transcript,
};
use crate::{Error, GenerationError, Result};
use chrono::{DateTime, Utc};
use std::fmt;
use tracing::instrument;

/// Result of one reflection pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReflectionOutcome {
    /// The history was empty; no call was made.
    NothingToReflect,
    /// The delta was merged and persisted.
    Applied {
        /// One human-readable line per change.
        changes: Vec<String>,
        /// Id of the mirrored daily-log memory, if one was written.
        daily_log_memory: Option<MemoryId>,
    },
    /// The model answered but the answer was not a valid delta.
    Failed {
        /// Why decoding or validation failed.
        reason: String,
        /// The raw model output.
        raw_response: String,
    },
    /// The completion call itself failed.
    GenerationFailed(GenerationError),
}

impl ReflectionOutcome {
    /// Short label for metrics and logs.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::NothingToReflect => "nothing",
            Self::Applied { .. } => "applied",
            Self::Failed { .. } => "failed",
            Self::GenerationFailed(_) => "generation_failed",
        }
    }

    /// Returns true if the profile was updated.
    #[must_use]
    pub const fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

impl fmt::Display for ReflectionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NothingToReflect => write!(f, "No interaction to reflect on."),
            Self::Applied { changes, .. } if changes.is_empty() => {
                write!(f, "No significant changes.")
            },
            Self::Applied { changes, .. } => write!(f, "{}", changes.join("\n")),
            Self::Failed {
                reason,
                raw_response,
            } => write!(
                f,
                "Failed to process reflection: {reason}\nRaw Response: {raw_response}"
            ),
            Self::GenerationFailed(e) => write!(f, "{}", e.sentinel()),
        }
    }
}

/// What a merge changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// One human-readable line per change.
    pub changes: Vec<String>,
    /// The daily-log entry appended to the profile, if any.
    pub daily_log: Option<DailyLogEntry>,
}

/// A reflection that is ready to persist, or a terminal outcome.
#[derive(Debug)]
pub enum Staged {
    /// Nothing to persist.
    Done(ReflectionOutcome),
    /// A merged scratch profile waiting to be saved.
    Merge {
        /// The profile with the delta applied.
        scratch: Box<CharacterProfile>,
        /// What changed.
        report: MergeReport,
    },
}

/// Elicits a delta from the completion service and merges it into a scratch profile.
pub struct ReflectionEngine<'a> {
    llm: &'a dyn LlmProvider,
}

impl<'a> ReflectionEngine<'a> {
    /// Creates an engine backed by `llm`.
    #[must_use]
    pub fn new(llm: &'a dyn LlmProvider) -> Self {
        Self { llm }
    }

    /// Asks for a delta and merges it into a copy of `profile`.
    ///
    /// `profile` itself is never modified.
    ///
    /// # Errors
    ///
    /// Returns an error only if the profile cannot be serialized for the prompt.
    #[instrument(name = "anima.reflection.stage", skip(self, profile, history), fields(component = "reflection", operation = "stage", messages = history.len()))]
    pub fn stage(
        &self,
        profile: &CharacterProfile,
        history: &[ChatMessage],
        user_name: &str,
    ) -> Result<Staged> {
        if history.is_empty() {
            return Ok(Staged::Done(ReflectionOutcome::NothingToReflect));
        }

        let prompt = build_reflection_prompt(
            user_name,
            &profile.to_canonical_json()?,
            &render_transcript(history),
        );
        let request = GenerationRequest::new(REFLECTION_SYSTEM_PROMPT, prompt);

        let response = match self.llm.generate(&request) {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "Reflection call failed");
                return Ok(Staged::Done(ReflectionOutcome::GenerationFailed(e)));
            },
        };

        let delta = match parse_delta(&response) {
            Ok(delta) => delta,
            Err(Error::ReflectionParse { reason, raw }) => {
                tracing::warn!(reason = %reason, "Rejected reflection output");
                return Ok(Staged::Done(ReflectionOutcome::Failed {
                    reason,
                    raw_response: raw,
                }));
            },
            Err(e) => return Err(e),
        };

        let mut scratch = profile.clone();
        let report = apply_delta(&mut scratch, &delta, Utc::now());
        Ok(Staged::Merge {
            scratch: Box::new(scratch),
            report,
        })
    }
}

/// Decodes and validates a delta from raw model output.
///
/// Markdown code fences and surrounding prose are stripped first.
///
/// # Errors
///
/// Returns [`Error::ReflectionParse`] carrying the raw text if the output is
/// not a well-formed, structurally valid delta.
pub fn parse_delta(response: &str) -> Result<ReflectionDelta> {
    let parse_error = |reason: String| Error::ReflectionParse {
        reason,
        raw: response.to_string(),
    };

    let json = extract_json_from_response(response);
    let delta: ReflectionDelta =
        serde_json::from_str(json).map_err(|e| parse_error(e.to_string()))?;
    delta.validate().map_err(parse_error)?;
    Ok(delta)
}

/// Applies `delta` to `profile` in place.
///
/// Relationships and skills are upserted by name, trait values overwrite,
/// values are unioned in order and the daily log is appended to. Nothing is
/// ever removed. `updated_at` is set to `now` unless the delta is empty.
pub fn apply_delta(
    profile: &mut CharacterProfile,
    delta: &ReflectionDelta,
    now: DateTime<Utc>,
) -> MergeReport {
    let mut report = MergeReport::default();

    if let Some(log) = &delta.daily_log {
        let entry = DailyLogEntry {
            timestamp: now,
            activity: log.activity.clone(),
            interacted_with: log.interacted_with.clone(),
        };
        profile.daily_log.push(entry.clone());
        report.daily_log = Some(entry);
        report
            .changes
            .push("Added daily log entry (and saved to long-term memory).".to_string());
    }

    if let Some(mood) = &delta.mood
        && *mood != profile.personality.mood
    {
        report.changes.push(format!(
            "Mood changed from {} to {mood}.",
            profile.personality.mood
        ));
        profile.personality.mood.clone_from(mood);
    }

    if let Some(relationships) = &delta.relationships {
        for (name, update) in relationships {
            let relationship = profile
                .relationships
                .entry(name.clone())
                .or_insert_with(|| {
                    report.changes.push(format!("New relationship with {name}."));
                    Relationship::new(name.clone())
                });
            if let Some(affinity) = update.affinity {
                let clamped = clamp_affinity(affinity);
                if clamped != affinity {
                    tracing::debug!(target_name = %name, requested = affinity, clamped, "Clamped affinity");
                }
                relationship.affinity = clamped;
            }
            if let Some(tags) = &update.tags {
                relationship.tags = dedup_preserving_order(tags);
            }
            if let Some(history) = &update.history {
                relationship.history.extend(history.iter().cloned());
            }
        }
    }

    if let Some(skills) = &delta.skills_update {
        for update in skills {
            if let Some(existing) = profile.skills.iter_mut().find(|s| s.name == update.name) {
                existing.level = update.level;
                existing.description.clone_from(&update.description);
                report.changes.push(format!(
                    "Updated skill {} to level {}.",
                    update.name, update.level
                ));
            } else {
                profile.skills.push(Skill {
                    name: update.name.clone(),
                    level: update.level,
                    description: update.description.clone(),
                });
                report
                    .changes
                    .push(format!("Learned new skill: {}.", update.name));
            }
        }
    }

    if let Some(personality) = &delta.personality_update {
        if let Some(traits) = &personality.traits {
            profile
                .personality
                .traits
                .extend(traits.iter().map(|(k, v)| (k.clone(), *v)));
            report.changes.push("Updated personality traits.".to_string());
        }
        if let Some(values) = &personality.values {
            for value in values {
                if !profile.personality.values.contains(value) {
                    profile.personality.values.push(value.clone());
                }
            }
            report.changes.push("Updated values.".to_string());
        }
    }

    if let Some(context) = &delta.context_update {
        if let Some(occupation) = non_blank(context.occupation.as_deref()) {
            profile.context.occupation = occupation.to_string();
            report
                .changes
                .push(format!("Occupation changed to {occupation}."));
        }
        if let Some(location) = non_blank(context.current_location.as_deref()) {
            profile.context.current_location = location.to_string();
            report.changes.push(format!("Moved to {location}."));
        }
    }

    if !delta.is_empty() {
        profile.updated_at = now;
    }
    report
}

/// The long-term memory item that mirrors a daily-log entry.
///
/// The id comes from [`DailyLogEntry::memory_id`], so a later backfill of
/// the same entry overwrites this item.
#[must_use]
pub fn daily_log_memory(entry: &DailyLogEntry) -> MemoryItem {
    MemoryItem::new(MemoryType::DailyLog, entry.render())
        .with_id(entry.memory_id())
        .with_timestamp(entry.timestamp)
        .with_summary(entry.activity.clone())
        .with_importance(DAILY_LOG_IMPORTANCE)
        .with_related_entities(entry.interacted_with.clone())
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn dedup_preserving_order(items: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        if !out.contains(item) {
            out.push(item.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ContextDelta, DailyLogDelta, PersonalityDelta, RelationshipDelta, SkillDelta,
    };
    use std::collections::BTreeMap;

    fn relationship_delta(affinity: i64, tags: &[&str], history: &[&str]) -> RelationshipDelta {
        RelationshipDelta {
            affinity: Some(affinity),
            tags: Some(tags.iter().map(ToString::to_string).collect()),
            history: Some(history.iter().map(ToString::to_string).collect()),
        }
    }

    #[test]
    fn test_parse_delta_strips_fences() {
        let delta = parse_delta("```json\n{\"mood\": \"Calm\"}\n```").expect("delta");
        assert_eq!(delta.mood.as_deref(), Some("Calm"));
    }

    #[test]
    fn test_parse_delta_rejects_unknown_key() {
        let err = parse_delta(r#"{"mood": "Calm", "weather": "rain"}"#).expect_err("unknown key");
        assert!(matches!(
            &err,
            Error::ReflectionParse { reason, raw } if reason.contains("weather") && raw.contains("rain")
        ));
    }

    #[test]
    fn test_parse_delta_rejects_mistyped_and_missing_fields() {
        assert!(parse_delta(r#"{"mood": 5}"#).is_err());
        assert!(parse_delta(r#"{"daily_log": {"interacted_with": []}}"#).is_err());
        assert!(parse_delta(r#"{"skills_update": [{"name": "Chess", "level": 2}]}"#).is_err());
        assert!(parse_delta(r#"{"relationships": {"": {"affinity": 1}}}"#).is_err());
        assert!(parse_delta("I'd rather not.").is_err());
    }

    #[test]
    fn test_parse_delta_rejects_blank_mood() {
        let err = parse_delta(r#"{"mood": "   "}"#).expect_err("blank mood");
        assert!(matches!(
            &err,
            Error::ReflectionParse { reason, .. } if reason == "mood must not be empty"
        ));
    }

    #[test]
    fn test_empty_delta_reports_no_changes() {
        let mut profile = CharacterProfile::new("Ada");
        let before = profile.clone();
        let report = apply_delta(&mut profile, &ReflectionDelta::default(), Utc::now());
        assert!(report.changes.is_empty());
        assert_eq!(profile, before);
    }

    #[test]
    fn test_daily_log_and_mood() {
        let mut profile = CharacterProfile::new("Ada");
        let delta = ReflectionDelta {
            daily_log: Some(DailyLogDelta {
                activity: "Discussed engines".to_string(),
                interacted_with: vec!["Charles".to_string()],
            }),
            mood: Some("Inspired".to_string()),
            ..ReflectionDelta::default()
        };
        let now = Utc::now();
        let report = apply_delta(&mut profile, &delta, now);

        assert_eq!(profile.daily_log.len(), 1);
        assert_eq!(profile.personality.mood, "Inspired");
        assert_eq!(profile.updated_at, now);
        assert_eq!(
            report.changes,
            vec![
                "Added daily log entry (and saved to long-term memory).".to_string(),
                "Mood changed from Neutral to Inspired.".to_string(),
            ]
        );

        let memory = daily_log_memory(report.daily_log.as_ref().expect("entry"));
        assert_eq!(memory.memory_type, MemoryType::DailyLog);
        assert_eq!(memory.id, report.daily_log.as_ref().expect("entry").memory_id());
        assert_eq!(memory.importance, 8);
        assert_eq!(memory.summary.as_deref(), Some("Discussed engines"));
        assert!(memory.content.ends_with(": Discussed engines. Interacted with: Charles"));
    }

    #[test]
    fn test_same_mood_is_not_a_change() {
        let mut profile = CharacterProfile::new("Ada");
        let delta = ReflectionDelta {
            mood: Some("Neutral".to_string()),
            ..ReflectionDelta::default()
        };
        assert!(apply_delta(&mut profile, &delta, Utc::now()).changes.is_empty());
    }

    #[test]
    fn test_relationship_upsert_is_idempotent() {
        let mut profile = CharacterProfile::new("Ada");
        let delta = ReflectionDelta {
            relationships: Some(BTreeMap::from([(
                "Charles".to_string(),
                relationship_delta(40, &["friend", "friend", "mentor"], &["Met at a salon"]),
            )])),
            ..ReflectionDelta::default()
        };

        let first = apply_delta(&mut profile, &delta, Utc::now());
        let second = apply_delta(&mut profile, &delta, Utc::now());

        assert_eq!(first.changes, vec!["New relationship with Charles.".to_string()]);
        assert!(second.changes.is_empty());
        assert_eq!(profile.relationships.len(), 1);
        let rel = &profile.relationships["Charles"];
        assert_eq!(rel.affinity, 40);
        assert_eq!(rel.tags, vec!["friend", "mentor"]);
        assert_eq!(rel.history.len(), 2);
    }

    #[test]
    fn test_affinity_clamped() {
        let mut profile = CharacterProfile::new("Ada");
        let delta = ReflectionDelta {
            relationships: Some(BTreeMap::from([
                ("Rival".to_string(), relationship_delta(-500, &[], &[])),
                ("Ally".to_string(), relationship_delta(101, &[], &[])),
            ])),
            ..ReflectionDelta::default()
        };
        apply_delta(&mut profile, &delta, Utc::now());
        assert_eq!(profile.relationships["Rival"].affinity, -100);
        assert_eq!(profile.relationships["Ally"].affinity, 100);
    }

    #[test]
    fn test_skills_upsert_by_name() {
        let mut profile = CharacterProfile::new("Ada");
        profile.skills.push(Skill {
            name: "Mathematics".to_string(),
            level: 5,
            description: "Strong".to_string(),
        });
        let delta = ReflectionDelta {
            skills_update: Some(vec![
                SkillDelta {
                    name: "Mathematics".to_string(),
                    level: 7,
                    description: "Exceptional".to_string(),
                },
                SkillDelta {
                    name: "Poetry".to_string(),
                    level: 2,
                    description: "Dabbling".to_string(),
                },
            ]),
            ..ReflectionDelta::default()
        };
        let report = apply_delta(&mut profile, &delta, Utc::now());

        assert_eq!(profile.skills.len(), 2);
        assert_eq!(profile.skill("Mathematics").map(|s| s.level), Some(7));
        assert_eq!(profile.skill("Poetry").map(|s| s.level), Some(2));
        assert_eq!(
            report.changes,
            vec![
                "Updated skill Mathematics to level 7.".to_string(),
                "Learned new skill: Poetry.".to_string(),
            ]
        );
    }

    #[test]
    fn test_personality_and_context() {
        let mut profile = CharacterProfile::new("Ada");
        profile.personality.traits.insert("Curiosity".to_string(), 5);
        profile.personality.values = vec!["Truth".to_string()];
        profile.context.occupation = "Countess".to_string();

        let delta = ReflectionDelta {
            personality_update: Some(PersonalityDelta {
                traits: Some(BTreeMap::from([
                    ("Curiosity".to_string(), 9),
                    ("Patience".to_string(), 3),
                ])),
                values: Some(vec!["Beauty".to_string(), "Truth".to_string()]),
            }),
            context_update: Some(ContextDelta {
                occupation: Some(String::new()),
                current_location: Some("London".to_string()),
            }),
            ..ReflectionDelta::default()
        };
        let report = apply_delta(&mut profile, &delta, Utc::now());

        assert_eq!(profile.personality.traits["Curiosity"], 9);
        assert_eq!(profile.personality.traits["Patience"], 3);
        assert_eq!(profile.personality.values, vec!["Truth", "Beauty"]);
        assert_eq!(profile.context.occupation, "Countess");
        assert_eq!(profile.context.current_location, "London");
        assert_eq!(
            report.changes,
            vec![
                "Updated personality traits.".to_string(),
                "Updated values.".to_string(),
                "Moved to London.".to_string(),
            ]
        );
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(
            ReflectionOutcome::NothingToReflect.to_string(),
            "No interaction to reflect on."
        );
        let applied = ReflectionOutcome::Applied {
            changes: Vec::new(),
            daily_log_memory: None,
        };
        assert_eq!(applied.to_string(), "No significant changes.");
        let failed = ReflectionOutcome::Failed {
            reason: "expected value".to_string(),
            raw_response: "oops".to_string(),
        };
        assert_eq!(
            failed.to_string(),
            "Failed to process reflection: expected value\nRaw Response: oops"
        );
        assert_eq!(
            ReflectionOutcome::GenerationFailed(GenerationError::MissingCredential).to_string(),
            "Error: API Key not set."
        );
    }
}
