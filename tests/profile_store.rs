//! Integration tests for profile persistence.

#![allow(clippy::expect_used, clippy::unwrap_used)]

mod common;

use anima::models::presets::demo_character;
use anima::{CharacterProfile, JsonProfileStore, ProfileStore};
use common::{ScriptedLlm, config_in, file_manager};
use tempfile::TempDir;

#[test]
fn test_json_round_trip_preserves_every_field() {
    let dir = TempDir::new().expect("tempdir");
    let store = JsonProfileStore::new(dir.path().join("character_profile.json"));
    let profile = demo_character();

    store.save(&profile).expect("save");
    let loaded = store.load().expect("load").expect("present");
    assert_eq!(loaded, profile);
}

#[test]
fn test_corrupt_document_starts_default_character() {
    let dir = TempDir::new().expect("tempdir");
    let config = config_in(dir.path());
    std::fs::create_dir_all(&config.data_dir).expect("mkdir");
    std::fs::write(config.profile_path(), "{ this is not json").expect("write");

    let manager = file_manager(dir.path(), &ScriptedLlm::new());
    assert_eq!(manager.profile().name, CharacterProfile::default().name);

    // Nothing is written until the profile changes.
    let on_disk = std::fs::read_to_string(config.profile_path()).expect("read");
    assert_eq!(on_disk, "{ this is not json");
}

#[test]
fn test_non_utf8_document_treated_as_absent() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("profile.json");
    let bytes = [0xff, 0xfe, b'{', 0x80];
    std::fs::write(&path, bytes).expect("write");

    let store = JsonProfileStore::new(&path);
    assert!(store.load().expect("load").is_none());
    assert_eq!(std::fs::read(&path).expect("read"), bytes);

    assert_eq!(config_in(dir.path()).profile_path(), path);
    let manager = file_manager(dir.path(), &ScriptedLlm::new());
    assert_eq!(manager.profile().name, CharacterProfile::default().name);
}

#[test]
fn test_rename_persists_across_sessions() {
    let dir = TempDir::new().expect("tempdir");
    {
        let mut manager = file_manager(dir.path(), &ScriptedLlm::new());
        manager.rename("  Huang Yueying ").expect("rename");
        assert_eq!(manager.profile().name, "Huang Yueying");
    }

    let manager = file_manager(dir.path(), &ScriptedLlm::new());
    assert_eq!(manager.profile().name, "Huang Yueying");
}

#[test]
fn test_blank_rename_rejected() {
    let dir = TempDir::new().expect("tempdir");
    let mut manager = file_manager(dir.path(), &ScriptedLlm::new());
    let result = manager.rename("   ");
    assert!(matches!(result, Err(anima::Error::InvalidInput(_))));
    assert!(!config_in(dir.path()).profile_path().exists());
}

#[test]
fn test_demo_preset_replaces_profile() {
    let dir = TempDir::new().expect("tempdir");
    {
        let mut manager = file_manager(dir.path(), &ScriptedLlm::new());
        manager.replace_profile(demo_character()).expect("replace");
    }

    let manager = file_manager(dir.path(), &ScriptedLlm::new());
    let expected = demo_character();
    assert_eq!(manager.profile().name, expected.name);
    assert_eq!(manager.profile().relationships, expected.relationships);
    assert_eq!(manager.profile().daily_log, expected.daily_log);
}
