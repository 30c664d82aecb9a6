//! Integration tests for the chat loop and command handlers.

#![allow(clippy::expect_used, clippy::unwrap_used)]

mod common;

use anima::cli::{
    ChatOptions, MemoryAction, ProfileAction, cmd_ask, cmd_memory, cmd_profile, cmd_recall,
    cmd_status, run_repl,
};
use anima::models::MemoryType;
use anima::{GenerationError, Interlocutor};
use common::{ScriptedLlm, in_memory_manager};
use std::io::Cursor;

fn run(manager: &mut anima::MemoryManager, options: &ChatOptions, script: &str) -> String {
    let mut out = Vec::new();
    run_repl(manager, options, Cursor::new(script.to_string()), &mut out).expect("repl");
    String::from_utf8(out).expect("utf8")
}

#[test]
fn test_second_turn_sees_first_turn_memories() {
    let llm = ScriptedLlm::new()
        .reply("The harbor lanterns were lit at dusk.")
        .reply("Yes, the lanterns.");
    let (mut manager, _store) = in_memory_manager(&llm);
    let liu = Interlocutor::new("Liu Bei").with_persona("Lord of Shu");

    let first = manager.chat_as("Tell me about the harbor lanterns", &liu);
    assert!(first.reply.is_ok());
    assert!(first.memories.is_empty());

    let second = manager.chat_as("Were the harbor lanterns pretty?", &liu);
    assert_eq!(second.display_text(), "Yes, the lanterns.");
    assert!(!second.memories.is_empty());

    let requests = llm.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].system.contains("Interacting with: Liu Bei"));
    assert!(requests[0].system.contains("User Context: Lord of Shu"));
    assert!(requests[1].context.contains("- Liu Bei said: Tell me about the harbor lanterns"));
    assert!(requests[1].user_message().starts_with("Context:\n- "));

    assert_eq!(manager.stream().count().expect("count"), 4);
    assert_eq!(manager.session().len(), 4);
    assert_eq!(manager.usage().turns(), 2);
}

#[test]
fn test_generation_failure_writes_nothing() {
    let llm = ScriptedLlm::new().fail(GenerationError::MissingCredential);
    let (mut manager, _store) = in_memory_manager(&llm);

    let turn = manager.chat("Hello?");
    assert_eq!(turn.display_text(), "Error: API Key not set.");
    assert_eq!(manager.stream().count().expect("count"), 0);
    assert!(manager.session().is_empty());
}

#[test]
fn test_repl_streams_and_reflects_on_quit() {
    let llm = ScriptedLlm::new()
        .reply("Greetings, traveler from the east.")
        .reply(r#"{"daily_log": {"activity": "Met a traveler", "interacted_with": ["Ada"]}}"#);
    let (mut manager, store) = in_memory_manager(&llm);
    let options = ChatOptions {
        interlocutor: Interlocutor::new("Ada"),
        stream: true,
        show_usage: false,
    };

    let output = run(
        &mut manager,
        &options,
        "Hello there\n\n/memories\n/model other-model\n/quit\n",
    );

    assert!(output.contains("Talking to New Character as Ada."));
    assert!(output.contains("New Character: Greetings, traveler from the east."));
    assert!(output.contains("No memories found."));
    assert!(output.contains("Model set to other-model"));
    assert!(output.contains("Reflecting on the conversation..."));
    assert!(output.contains("Added daily log entry"));
    assert!(output.trim_end().ends_with("Goodbye."));

    assert_eq!(manager.llm().model(), "other-model");
    assert!(manager.session().is_empty());
    assert_eq!(manager.profile().daily_log.len(), 1);
    assert_eq!(store.save_count(), 1);
    // Two turn memories plus the mirrored daily log.
    assert_eq!(manager.stream().count().expect("count"), 3);
}

#[test]
fn test_repl_end_of_input_without_talk_skips_reflection() {
    let llm = ScriptedLlm::new();
    let (mut manager, _store) = in_memory_manager(&llm);

    let output = run(&mut manager, &ChatOptions::default(), "/help\n/dance\n");
    assert!(output.contains("/reflect"));
    assert!(output.contains("Unknown command /dance."));
    assert!(!output.contains("Reflecting"));
    assert!(output.trim_end().ends_with("Goodbye."));
    assert_eq!(llm.calls(), 0);
}

#[test]
fn test_repl_blocking_mode_reports_usage() {
    let llm = ScriptedLlm::new()
        .reply("Plain reply.")
        .fail(GenerationError::Status {
            status: 500,
            body: "upstream".to_string(),
        });
    let (mut manager, _store) = in_memory_manager(&llm);
    let options = ChatOptions {
        stream: false,
        show_usage: true,
        ..ChatOptions::default()
    };

    let output = run(&mut manager, &options, "First\n/reflect\n/quit\n");
    assert!(output.contains("New Character: Plain reply."));
    assert!(output.contains("tokens (est.): in "));
    assert!(output.contains("Error calling LLM: API returned status 500: upstream"));
    // Failed reflection keeps the session, so quitting tries again.
    assert!(output.contains("Reflecting on the conversation..."));
    assert_eq!(llm.calls(), 3);
}

#[test]
fn test_ask_prints_reply() {
    let llm = ScriptedLlm::new().reply("A single answer.");
    let (mut manager, _store) = in_memory_manager(&llm);

    let mut out = Vec::new();
    cmd_ask(&mut manager, "One question", &Interlocutor::default(), &mut out).expect("ask");
    assert_eq!(String::from_utf8(out).expect("utf8"), "A single answer.\n");
}

#[test]
fn test_memory_commands() {
    let (mut manager, _store) = in_memory_manager(&ScriptedLlm::new());
    let mut out = Vec::new();

    cmd_memory(
        &mut manager,
        MemoryAction::Add {
            content: "The southern tribes respect courage.".to_string(),
            memory_type: MemoryType::Thought,
            importance: 6,
        },
        &mut out,
    )
    .expect("add");
    let added = manager.recent_memories(1).expect("recent");
    let id = added[0].id.to_string();

    cmd_memory(
        &mut manager,
        MemoryAction::Update {
            id: id.clone(),
            content: "The southern tribes respect mercy.".to_string(),
            memory_type: None,
            importance: Some(9),
        },
        &mut out,
    )
    .expect("update");
    let updated = manager.stream().get(&added[0].id).expect("get").expect("present");
    assert_eq!(updated.metadata.memory_type, MemoryType::Thought);
    assert_eq!(updated.metadata.importance, 9);

    cmd_recall(&manager, "tribes mercy", Some(3), &mut out).expect("recall");
    cmd_memory(&mut manager, MemoryAction::Recent { limit: 5 }, &mut out).expect("recent");
    cmd_memory(&mut manager, MemoryAction::Delete { id: id.clone() }, &mut out).expect("delete");
    cmd_memory(&mut manager, MemoryAction::Delete { id: id.clone() }, &mut out).expect("delete");

    let text = String::from_utf8(out).expect("utf8");
    assert!(text.contains(&format!("Added thought memory {id}")));
    assert!(text.contains(&format!("Updated {id}")));
    assert!(text.contains("Found 1 memories:"));
    assert!(text.contains("The southern tribes respect mercy."));
    assert!(text.contains(&format!("Deleted {id}")));
    assert!(text.contains(&format!("No memory with id {id}")));
}

#[test]
fn test_blank_memory_rejected() {
    let (mut manager, _store) = in_memory_manager(&ScriptedLlm::new());
    let result = cmd_memory(
        &mut manager,
        MemoryAction::Add {
            content: "   ".to_string(),
            memory_type: MemoryType::Thought,
            importance: 5,
        },
        &mut Vec::new(),
    );
    assert!(result.is_err());
}

#[test]
fn test_profile_and_status_commands() {
    let (mut manager, store) = in_memory_manager(&ScriptedLlm::new());
    let mut out = Vec::new();

    cmd_profile(&mut manager, ProfileAction::Demo, &mut out).expect("demo");
    cmd_profile(&mut manager, ProfileAction::Show { json: false }, &mut out).expect("show");
    cmd_status(&manager, &mut out).expect("status");

    let text = String::from_utf8(out).expect("utf8");
    assert!(text.contains("Loaded demo character Zhuge Liang"));
    assert!(text.contains("Occupation: Prime Minister of Shu Han"));
    assert!(text.contains("Entries:    0"));
    assert!(text.contains("Model:      scripted-model"));
    assert_eq!(store.save_count(), 1);

    let mut json = Vec::new();
    cmd_profile(&mut manager, ProfileAction::Show { json: true }, &mut json).expect("json");
    let value: serde_json::Value = serde_json::from_slice(&json).expect("valid json");
    assert_eq!(value["name"], "Zhuge Liang");
}
