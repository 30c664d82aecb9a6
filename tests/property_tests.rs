//! Property-based tests for profile merging and value clamping.
//!
//! Uses proptest to verify invariants across random inputs:
//! - Affinity and importance always land inside their ranges
//! - Merging a delta never removes relationships, skills or log entries
//! - Relationship keys and skill names stay unique
//! - JSON extraction recovers an object from fenced or wrapped output

// Property tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use anima::llm::extract_json_from_response;
use anima::models::{
    AFFINITY_RANGE, DailyLogDelta, IMPORTANCE_RANGE, ReflectionDelta, RelationshipDelta,
    SkillDelta, clamp_affinity, clamp_importance, presets,
};
use anima::services::{apply_delta, estimate_tokens};
use chrono::Utc;
use proptest::prelude::*;
use std::collections::{BTreeMap, HashSet};

fn name() -> impl Strategy<Value = String> {
    prop::sample::select(vec![
        "Liu Bei", "Guan Yu", "Zhang Fei", "Ma Su", "Jiang Wei", "Sima Yi",
    ])
    .prop_map(str::to_string)
}

fn relationship_delta() -> impl Strategy<Value = RelationshipDelta> {
    (
        prop::option::of(-1_000i64..1_000),
        prop::option::of(prop::collection::vec("[a-z]{1,6}", 0..4)),
        prop::option::of(prop::collection::vec("[a-z ]{1,20}", 0..3)),
    )
        .prop_map(|(affinity, tags, history)| RelationshipDelta {
            affinity,
            tags,
            history,
        })
}

fn skill_delta() -> impl Strategy<Value = SkillDelta> {
    (
        prop::sample::select(vec!["Astrology", "Debate", "Logistics", "Archery"]),
        -5i64..20,
        "[a-z ]{0,20}",
    )
        .prop_map(|(name, level, description)| SkillDelta {
            name: name.to_string(),
            level,
            description,
        })
}

fn delta() -> impl Strategy<Value = ReflectionDelta> {
    (
        prop::option::of(("[a-z ]{1,30}", prop::collection::vec(name(), 0..3))),
        prop::option::of("[A-Za-z][A-Za-z ]{0,19}"),
        prop::option::of(prop::collection::btree_map(name(), relationship_delta(), 0..4)),
        prop::option::of(prop::collection::vec(skill_delta(), 0..4)),
    )
        .prop_map(|(log, mood, relationships, skills_update)| ReflectionDelta {
            daily_log: log
                .filter(|(activity, _)| !activity.trim().is_empty())
                .map(|(activity, interacted_with)| DailyLogDelta {
                    activity,
                    interacted_with,
                }),
            mood,
            relationships,
            skills_update,
            ..ReflectionDelta::default()
        })
}

proptest! {
    /// Property: clamped affinity is always inside the allowed range.
    #[test]
    fn prop_affinity_clamped(value in any::<i64>()) {
        let clamped = clamp_affinity(value);
        prop_assert!((AFFINITY_RANGE.0..=AFFINITY_RANGE.1).contains(&clamped));
        if (AFFINITY_RANGE.0..=AFFINITY_RANGE.1).contains(&value) {
            prop_assert_eq!(clamped, value);
        }
    }

    /// Property: clamped importance is always inside the allowed range.
    #[test]
    fn prop_importance_clamped(value in any::<i64>()) {
        let clamped = clamp_importance(value);
        prop_assert!((IMPORTANCE_RANGE.0..=IMPORTANCE_RANGE.1).contains(&clamped));
    }

    /// Property: merging never removes relationships, skills or log entries.
    #[test]
    fn prop_merge_is_additive(delta in delta()) {
        let mut profile = presets::demo_character();
        let before = profile.clone();

        let report = apply_delta(&mut profile, &delta, Utc::now());

        for name in before.relationships.keys() {
            prop_assert!(profile.relationships.contains_key(name));
        }
        for skill in &before.skills {
            prop_assert!(profile.skill(&skill.name).is_some());
        }
        prop_assert_eq!(&profile.daily_log[..before.daily_log.len()], &before.daily_log[..]);

        let appended = usize::from(delta.daily_log.is_some());
        prop_assert_eq!(profile.daily_log.len(), before.daily_log.len() + appended);
        prop_assert_eq!(report.daily_log.is_some(), delta.daily_log.is_some());
    }

    /// Property: relationship affinities stay in range and skill names stay unique.
    #[test]
    fn prop_merge_keeps_invariants(first in delta(), second in delta()) {
        let mut profile = presets::demo_character();
        apply_delta(&mut profile, &first, Utc::now());
        apply_delta(&mut profile, &second, Utc::now());

        for rel in profile.relationships.values() {
            prop_assert!((AFFINITY_RANGE.0..=AFFINITY_RANGE.1).contains(&rel.affinity));
            let unique: HashSet<&String> = rel.tags.iter().collect();
            prop_assert_eq!(unique.len(), rel.tags.len());
        }
        let names: HashSet<&str> = profile.skills.iter().map(|s| s.name.as_str()).collect();
        prop_assert_eq!(names.len(), profile.skills.len());
    }

    /// Property: an empty delta changes nothing.
    #[test]
    fn prop_empty_delta_is_noop(_seed in 0u8..4) {
        let mut profile = presets::demo_character();
        let before = profile.clone();
        let report = apply_delta(&mut profile, &ReflectionDelta::default(), Utc::now());
        prop_assert!(report.changes.is_empty());
        prop_assert_eq!(profile, before);
    }

    /// Property: JSON extraction recovers an object from fences or prose.
    #[test]
    fn prop_extract_json_recovers_object(
        map in prop::collection::btree_map("[a-z]{1,8}", "[a-z ]{0,12}", 0..5),
        prefix in "[A-Za-z ,.]{0,30}",
        suffix in "[A-Za-z ,.]{0,30}",
        style in 0u8..3,
    ) {
        let json = serde_json::to_string(&map).unwrap();
        let wrapped = match style {
            0 => format!("```json\n{json}\n```"),
            1 => format!("{prefix}\n```\n{json}\n```\n{suffix}"),
            _ => format!("{prefix} {json} {suffix}"),
        };
        let extracted = extract_json_from_response(&wrapped);
        let parsed: BTreeMap<String, String> = serde_json::from_str(extracted).unwrap();
        prop_assert_eq!(parsed, map);
    }

    /// Property: token estimates are a quarter of the character count.
    #[test]
    fn prop_token_estimate(text in ".{0,400}") {
        prop_assert_eq!(estimate_tokens(&text), text.chars().count() / 4);
    }
}
