//! Plain-text rendering of command results.

use crate::config::AnimaConfig;
use crate::models::{CharacterProfile, IndexedMemory, RetrievedMemory};
use crate::services::{MemoryStats, TokenUsage};
use secrecy::ExposeSecret;
use std::fmt::Write;

/// Longest content shown per memory line before truncation.
const MAX_CONTENT_CHARS: usize = 160;

fn truncate(content: &str) -> String {
    if content.chars().count() <= MAX_CONTENT_CHARS {
        return content.to_string();
    }
    let cut: String = content.chars().take(MAX_CONTENT_CHARS).collect();
    format!("{cut}...")
}

/// Ranked search results with distances.
#[must_use]
pub fn format_retrieved(memories: &[RetrievedMemory]) -> String {
    if memories.is_empty() {
        return "No memories found.".to_string();
    }
    let mut out = format!("Found {} memories:\n", memories.len());
    for memory in memories {
        let _ = writeln!(
            out,
            "  [{:.4}] {} ({}, importance {})\n      {}",
            memory.distance,
            memory.id,
            memory.metadata.memory_type,
            memory.metadata.importance,
            truncate(&memory.content)
        );
    }
    out
}

/// Stored memories, newest first.
#[must_use]
pub fn format_recent(memories: &[IndexedMemory]) -> String {
    if memories.is_empty() {
        return "No memories stored.".to_string();
    }
    let mut out = String::new();
    for memory in memories {
        let _ = writeln!(
            out,
            "  {} {} ({}, importance {})\n      {}",
            memory.metadata.timestamp.format("%Y-%m-%d %H:%M"),
            memory.id,
            memory.metadata.memory_type,
            memory.metadata.importance,
            truncate(&memory.content)
        );
    }
    out
}

/// A readable profile summary followed by the recent daily log.
#[must_use]
pub fn format_profile(profile: &CharacterProfile) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", profile.name);
    let _ = writeln!(out, "  Occupation: {}", profile.context.occupation);
    let _ = writeln!(out, "  Location:   {}", profile.context.current_location);
    let _ = writeln!(out, "  Mood:       {}", profile.personality.mood);
    let _ = writeln!(
        out,
        "  Health:     {} hp, {} stamina",
        profile.health.hp, profile.health.stamina
    );
    let _ = writeln!(out, "  Wealth:     {:.1}", profile.wealth.currency);

    if !profile.personality.traits.is_empty() {
        let traits: Vec<String> = profile
            .personality
            .traits
            .iter()
            .map(|(name, value)| format!("{name}: {value}"))
            .collect();
        let _ = writeln!(out, "  Traits:     {}", traits.join(", "));
    }
    if !profile.relationships.is_empty() {
        let _ = writeln!(out, "  Relationships:");
        for rel in profile.relationships.values() {
            let _ = writeln!(out, "    {} (affinity {})", rel.target_name, rel.affinity);
        }
    }
    if !profile.skills.is_empty() {
        let _ = writeln!(out, "  Skills:");
        for skill in &profile.skills {
            let _ = writeln!(out, "    {} (level {})", skill.name, skill.level);
        }
    }
    let _ = writeln!(out, "  Daily log:  {} entries", profile.daily_log.len());
    for entry in profile.daily_log.iter().rev().take(5) {
        let _ = writeln!(
            out,
            "    {}  {}",
            entry.timestamp.format("%Y-%m-%d %H:%M"),
            entry.activity
        );
    }
    out
}

/// Status summary.
#[must_use]
pub fn format_stats(stats: &MemoryStats) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Entries:    {}", stats.memory_count);
    if let Some(bytes) = stats.storage_bytes {
        let _ = writeln!(out, "Storage:    {}", format_bytes(bytes));
    }
    let _ = writeln!(out, "Model:      {}", stats.model);
    let _ = writeln!(
        out,
        "API key:    {}",
        if stats.has_credential { "set" } else { "not set" }
    );
    if let Some(p95) = stats.p95_retrieval_ms {
        let _ = writeln!(out, "RAG p95:    {p95:.0} ms over {} turns", stats.turns);
    }
    out
}

/// Token estimate line shown after a turn.
#[must_use]
pub fn format_usage(usage: &TokenUsage) -> String {
    format!(
        "tokens (est.): in {} [sys {} | mem {} | hist {} | user {}] out {}",
        usage.input_total(),
        usage.system,
        usage.context,
        usage.history,
        usage.prompt,
        usage.output
    )
}

/// Effective configuration with the API key redacted.
#[must_use]
pub fn format_config(config: &AnimaConfig) -> String {
    let key = match &config.llm.api_key {
        Some(key) if !key.expose_secret().is_empty() => "[REDACTED]",
        _ => "(not set)",
    };
    let mut out = String::new();
    let _ = writeln!(out, "data_dir             = {}", config.data_dir.display());
    let _ = writeln!(out, "retrieval_limit      = {}", config.retrieval_limit);
    let _ = writeln!(out, "embedding_dimensions = {}", config.embedding_dimensions);
    let _ = writeln!(out, "embedding_cache_size = {}", config.embedding_cache_size);
    let _ = writeln!(out, "[llm]");
    let _ = writeln!(out, "base_url             = {}", config.llm.base_url);
    let _ = writeln!(out, "model                = {}", config.llm.model);
    let _ = writeln!(out, "api_key              = {key}");
    let _ = writeln!(out, "timeout_ms           = {}", config.llm.timeout_ms);
    let _ = writeln!(out, "connect_timeout_ms   = {}", config.llm.connect_timeout_ms);
    let _ = writeln!(out, "[logging]");
    let _ = writeln!(out, "format               = {}", config.logging.format.as_str());
    if let Some(file) = &config.logging.file {
        let _ = writeln!(out, "file                 = {}", file.display());
    }
    out
}

/// Human-readable byte count.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_bytes(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    let value = bytes as f64;
    if value < KIB {
        format!("{bytes} B")
    } else if value < KIB * KIB {
        format!("{:.1} KB", value / KIB)
    } else {
        format!("{:.1} MB", value / (KIB * KIB))
    }
}
