//! Integration tests for end-of-session reflection.

#![allow(clippy::expect_used, clippy::unwrap_used)]

mod common;

use anima::models::MemoryType;
use anima::{ChatMessage, GenerationError, ReflectionOutcome};
use common::{ScriptedLlm, in_memory_manager};

const RELATIONSHIP_DELTA: &str = r#"```json
{
    "mood": "Cautiously hopeful",
    "relationships": {
        "Liu Bei": { "affinity": 80, "tags": ["lord", "friend", "lord"], "history": ["Talked about the harbor"] }
    }
}
```"#;

const DAILY_LOG_DELTA: &str = r#"{
    "daily_log": { "activity": "Discussed the grain shipments", "interacted_with": ["Liu Bei", "Ma Su"] },
    "skills_update": [ { "name": "Logistics", "level": 4, "description": "Keeps the granaries full" } ]
}"#;

fn history() -> Vec<ChatMessage> {
    vec![
        ChatMessage::user("Do you remember the harbor?"),
        ChatMessage::assistant("I remember the lanterns on the water."),
    ]
}

#[test]
fn test_repeated_relationship_upserts_keep_one_entry() {
    let llm = ScriptedLlm::new()
        .reply(RELATIONSHIP_DELTA)
        .reply(RELATIONSHIP_DELTA);
    let (mut manager, store) = in_memory_manager(&llm);

    for _ in 0..2 {
        let outcome = manager
            .reflect_on_interaction(&history(), "Liu Bei")
            .expect("reflect");
        assert!(outcome.is_applied());
    }

    let profile = manager.profile();
    assert_eq!(profile.relationships.len(), 1);
    let rel = &profile.relationships["Liu Bei"];
    assert_eq!(rel.affinity, 80);
    assert_eq!(rel.tags, vec!["lord".to_string(), "friend".to_string()]);
    assert_eq!(rel.history.len(), 2);
    assert_eq!(profile.personality.mood, "Cautiously hopeful");
    assert_eq!(store.save_count(), 2);
}

#[test]
fn test_empty_history_makes_no_call() {
    let llm = ScriptedLlm::new().reply(RELATIONSHIP_DELTA);
    let (mut manager, store) = in_memory_manager(&llm);

    let outcome = manager.reflect_on_interaction(&[], "Liu Bei").expect("reflect");
    assert_eq!(outcome, ReflectionOutcome::NothingToReflect);
    assert_eq!(outcome.to_string(), "No interaction to reflect on.");
    assert_eq!(llm.calls(), 0);
    assert_eq!(store.save_count(), 0);
}

#[test]
fn test_malformed_delta_leaves_profile_untouched() {
    let raw = "I think the character feels great about things!";
    let llm = ScriptedLlm::new().reply(raw);
    let (mut manager, store) = in_memory_manager(&llm);
    manager.save_profile().expect("seed");
    let before = store.document().expect("document");
    let profile_before = manager.profile().clone();

    let outcome = manager
        .reflect_on_interaction(&history(), "Liu Bei")
        .expect("reflect");

    assert!(matches!(outcome, ReflectionOutcome::Failed { .. }));
    let text = outcome.to_string();
    assert!(text.starts_with("Failed to process reflection: "));
    assert!(text.contains(raw));
    assert_eq!(store.document().expect("document"), before);
    assert_eq!(manager.profile(), &profile_before);
    assert_eq!(manager.stream().count().expect("count"), 0);
}

#[test]
fn test_unknown_delta_keys_are_rejected() {
    let llm = ScriptedLlm::new().reply(r#"{"weather": "stormy"}"#);
    let (mut manager, store) = in_memory_manager(&llm);

    let outcome = manager
        .reflect_on_interaction(&history(), "Liu Bei")
        .expect("reflect");
    assert!(matches!(outcome, ReflectionOutcome::Failed { .. }));
    assert_eq!(store.save_count(), 0);
}

#[test]
fn test_blank_mood_is_reported_not_dropped() {
    let llm = ScriptedLlm::new().reply(r#"{"mood": "  ", "daily_log": {"activity": "Rested"}}"#);
    let (mut manager, store) = in_memory_manager(&llm);

    let outcome = manager
        .reflect_on_interaction(&history(), "Liu Bei")
        .expect("reflect");
    assert!(matches!(
        &outcome,
        ReflectionOutcome::Failed { reason, .. } if reason.contains("mood")
    ));
    assert_eq!(store.save_count(), 0);
    assert!(manager.profile().daily_log.is_empty());
}

#[test]
fn test_daily_log_mirrored_once_at_high_importance() {
    let llm = ScriptedLlm::new().reply(DAILY_LOG_DELTA);
    let (mut manager, _store) = in_memory_manager(&llm);

    let outcome = manager
        .reflect_on_interaction(&history(), "Liu Bei")
        .expect("reflect");
    assert!(matches!(
        outcome,
        ReflectionOutcome::Applied { daily_log_memory: Some(_), .. }
    ));

    let logs: Vec<_> = manager
        .recent_memories(50)
        .expect("recent")
        .into_iter()
        .filter(|m| m.metadata.memory_type == MemoryType::DailyLog)
        .collect();
    assert_eq!(logs.len(), 1);
    let log = &logs[0];
    assert_eq!(log.metadata.importance, 8);
    assert!(log.content.contains("Discussed the grain shipments"));
    assert!(log.content.contains("Liu Bei"));
    assert!(log.content.contains("Ma Su"));

    let profile = manager.profile();
    assert_eq!(profile.daily_log.len(), 1);
    assert_eq!(profile.skill("Logistics").map(|s| s.level), Some(4));
}

#[test]
fn test_generation_failure_reported_inline() {
    let llm = ScriptedLlm::new().fail(GenerationError::MissingCredential);
    let (mut manager, store) = in_memory_manager(&llm);

    let outcome = manager
        .reflect_on_interaction(&history(), "Liu Bei")
        .expect("reflect");
    assert_eq!(
        outcome,
        ReflectionOutcome::GenerationFailed(GenerationError::MissingCredential)
    );
    assert_eq!(outcome.to_string(), "Error: API Key not set.");
    assert_eq!(store.save_count(), 0);
}

#[test]
fn test_failed_save_keeps_live_profile() {
    let llm = ScriptedLlm::new().reply(RELATIONSHIP_DELTA);
    let (mut manager, store) = in_memory_manager(&llm);
    store.fail_saves(true);

    let result = manager.reflect_on_interaction(&history(), "Liu Bei");
    assert!(matches!(result, Err(anima::Error::Storage { .. })));
    assert!(manager.profile().relationships.is_empty());
}

#[test]
fn test_reflection_prompt_carries_profile_and_transcript() {
    let llm = ScriptedLlm::new().reply("{}");
    let (mut manager, _store) = in_memory_manager(&llm);

    let outcome = manager
        .reflect_on_interaction(&history(), "Liu Bei")
        .expect("reflect");
    assert_eq!(outcome.to_string(), "No significant changes.");

    let requests = llm.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].user.contains("The user's name is 'Liu Bei'"));
    assert!(requests[0].user.contains("Do you remember the harbor?"));
    assert!(requests[0].user.contains(r#""name":"New Character""#));
}

#[test]
fn test_backfill_is_idempotent() {
    let llm = ScriptedLlm::new().reply(DAILY_LOG_DELTA);
    let (mut manager, _store) = in_memory_manager(&llm);
    manager
        .reflect_on_interaction(&history(), "Liu Bei")
        .expect("reflect");
    let after_reflection = manager.stream().count().expect("count");

    let first = manager.backfill_daily_logs().expect("backfill");
    assert_eq!(first.scanned, 1);
    assert_eq!(first.written, 1);
    assert_eq!(manager.stream().count().expect("count"), after_reflection);

    manager.backfill_daily_logs().expect("backfill again");
    assert_eq!(manager.stream().count().expect("count"), after_reflection);
}

#[test]
fn test_backfill_after_reflection_reuses_mirrored_item() {
    let llm = ScriptedLlm::new().reply(
        r#"{"daily_log": {"activity": "Explored the market", "interacted_with": ["Mira"]}}"#,
    );
    let (mut manager, _store) = in_memory_manager(&llm);
    manager.reflect_on_interaction(&history(), "Mira").expect("reflect");
    let mirrored = manager.recent_memories(10).expect("recent");
    assert_eq!(mirrored.len(), 1);

    manager.backfill_daily_logs().expect("backfill");
    let after = manager.recent_memories(10).expect("recent");
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].id, mirrored[0].id);
    assert_eq!(after[0].id, manager.profile().daily_log[0].memory_id());
}

#[test]
fn test_ada_affinity_then_tags() {
    let llm = ScriptedLlm::new()
        .reply(r#"{"relationships": {"Ada": {"affinity": 10}}}"#)
        .reply(r#"{"relationships": {"Ada": {"affinity": 15, "tags": ["Friend"]}}}"#);
    let (mut manager, _store) = in_memory_manager(&llm);

    let first = manager.reflect_on_interaction(&history(), "Ada").expect("first");
    assert_eq!(first.to_string(), "New relationship with Ada.");
    manager.reflect_on_interaction(&history(), "Ada").expect("second");

    let relationships = &manager.profile().relationships;
    assert_eq!(relationships.len(), 1);
    assert_eq!(relationships["Ada"].affinity, 15);
    assert_eq!(relationships["Ada"].tags, vec!["Friend".to_string()]);
}

#[test]
fn test_market_visit_with_mira() {
    let llm = ScriptedLlm::new().reply(
        r#"{"daily_log": {"activity": "Explored the market", "interacted_with": ["Mira"]}}"#,
    );
    let (mut manager, _store) = in_memory_manager(&llm);
    manager.reflect_on_interaction(&history(), "Mira").expect("reflect");

    let entry = manager.profile().daily_log.last().expect("entry");
    assert_eq!(entry.activity, "Explored the market");
    assert_eq!(entry.interacted_with, vec!["Mira".to_string()]);

    let items = manager.recent_memories(10).expect("recent");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].metadata.memory_type, MemoryType::DailyLog);
    assert_eq!(items[0].metadata.importance, 8);
    assert!(items[0].content.contains("Explored the market"));
    assert!(items[0].content.contains("Mira"));
}

#[test]
fn test_not_json_at_all() {
    let llm = ScriptedLlm::new().reply("not json at all");
    let (mut manager, store) = in_memory_manager(&llm);
    manager.save_profile().expect("seed");
    let before = store.document().expect("document");

    let outcome = manager
        .reflect_on_interaction(&history(), "Ada")
        .expect("reflect");
    assert!(outcome.to_string().contains("not json at all"));
    assert_eq!(store.document().expect("document"), before);
}
