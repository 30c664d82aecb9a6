//! One-shot command handlers.
//!
//! Each handler takes an open [`MemoryManager`] and writes its human-readable
//! result to `out`.

use super::format::{format_config, format_profile, format_recent, format_retrieved, format_stats};
use crate::config::AnimaConfig;
use crate::models::{MemoryId, MemoryType, presets};
use crate::rendering::Interlocutor;
use crate::services::MemoryManager;
use anyhow::{Context, Result};
use clap::Subcommand;
use std::io::Write;

/// Memory subcommands.
#[derive(Debug, Subcommand)]
pub enum MemoryAction {
    /// Add a memory by hand.
    Add {
        /// Memory content.
        content: String,

        /// Memory type: observation, thought, action or `daily_log`.
        #[arg(short = 't', long = "type", default_value = "thought")]
        memory_type: MemoryType,

        /// Importance from 1 to 10.
        #[arg(short, long, default_value_t = 5)]
        importance: i64,
    },
    /// Replace a memory's content, keeping unspecified fields.
    Update {
        /// Memory ID.
        id: String,

        /// New content.
        content: String,

        /// New memory type.
        #[arg(short = 't', long = "type")]
        memory_type: Option<MemoryType>,

        /// New importance.
        #[arg(short, long)]
        importance: Option<i64>,
    },
    /// Delete a memory.
    Delete {
        /// Memory ID.
        id: String,
    },
    /// List the newest memories.
    Recent {
        /// Maximum number of memories.
        #[arg(short = 'n', long, default_value_t = 10)]
        limit: usize,
    },
}

/// Profile subcommands.
#[derive(Debug, Subcommand)]
pub enum ProfileAction {
    /// Show the current profile.
    Show {
        /// Print the stored JSON document instead of a summary.
        #[arg(long)]
        json: bool,
    },
    /// Rename the character.
    Rename {
        /// New name.
        name: String,
    },
    /// Replace the profile with the bundled demo character.
    Demo,
}

/// Runs a single synchronous turn and prints the reply.
///
/// # Errors
///
/// Returns an error only if writing output fails; generation failures are
/// printed as the reply.
pub fn cmd_ask<W: Write>(
    manager: &mut MemoryManager,
    text: &str,
    interlocutor: &Interlocutor,
    out: &mut W,
) -> Result<()> {
    let turn = manager.chat_as(text, interlocutor);
    writeln!(out, "{}", turn.display_text())?;
    for warning in &turn.warnings {
        writeln!(out, "warning: {warning}")?;
    }
    Ok(())
}

/// Prints the memories closest to `query`.
///
/// # Errors
///
/// Returns an error if the search fails.
pub fn cmd_recall<W: Write>(
    manager: &MemoryManager,
    query: &str,
    limit: Option<usize>,
    out: &mut W,
) -> Result<()> {
    let memories = manager
        .retrieve_relevant_memories(query, limit)
        .context("memory search failed")?;
    write!(out, "{}", format_retrieved(&memories))?;
    if memories.is_empty() {
        writeln!(out)?;
    }
    Ok(())
}

/// Runs a memory subcommand.
///
/// # Errors
///
/// Returns an error for blank content or if the stream cannot be updated.
pub fn cmd_memory<W: Write>(
    manager: &mut MemoryManager,
    action: MemoryAction,
    out: &mut W,
) -> Result<()> {
    match action {
        MemoryAction::Add {
            content,
            memory_type,
            importance,
        } => {
            let id = manager.add_memory(&content, memory_type, importance)?;
            writeln!(out, "Added {memory_type} memory {id}")?;
        },
        MemoryAction::Update {
            id,
            content,
            memory_type,
            importance,
        } => {
            let id = MemoryId::new(id);
            let Some(existing) = manager.stream().get(&id)? else {
                writeln!(out, "No memory with id {id}")?;
                return Ok(());
            };
            let memory_type = memory_type.unwrap_or(existing.metadata.memory_type);
            let importance = importance.unwrap_or(existing.metadata.importance);
            if manager.update_memory(&id, &content, memory_type, importance)? {
                writeln!(out, "Updated {id}")?;
            } else {
                writeln!(out, "No memory with id {id}")?;
            }
        },
        MemoryAction::Delete { id } => {
            let id = MemoryId::new(id);
            if manager.delete_memory(&id)? {
                writeln!(out, "Deleted {id}")?;
            } else {
                writeln!(out, "No memory with id {id}")?;
            }
        },
        MemoryAction::Recent { limit } => {
            write!(out, "{}", format_recent(&manager.recent_memories(limit)?))?;
        },
    }
    Ok(())
}

/// Runs a profile subcommand.
///
/// # Errors
///
/// Returns an error if the profile cannot be serialized or saved.
pub fn cmd_profile<W: Write>(
    manager: &mut MemoryManager,
    action: ProfileAction,
    out: &mut W,
) -> Result<()> {
    match action {
        ProfileAction::Show { json: true } => {
            writeln!(out, "{}", manager.profile().to_canonical_json()?)?;
        },
        ProfileAction::Show { json: false } => write!(out, "{}", format_profile(manager.profile()))?,
        ProfileAction::Rename { name } => {
            manager.rename(&name).context("rename failed")?;
            writeln!(out, "Character is now {}", manager.profile().name)?;
        },
        ProfileAction::Demo => {
            manager
                .replace_profile(presets::demo_character())
                .context("could not install the demo character")?;
            writeln!(out, "Loaded demo character {}", manager.profile().name)?;
        },
    }
    Ok(())
}

/// Mirrors the profile's daily log into the memory stream.
///
/// # Errors
///
/// Returns an error if the stream cannot be written.
pub fn cmd_backfill<W: Write>(manager: &mut MemoryManager, out: &mut W) -> Result<()> {
    let report = manager.backfill_daily_logs().context("backfill failed")?;
    writeln!(
        out,
        "Backfilled {} of {} daily log entries",
        report.written, report.scanned
    )?;
    Ok(())
}

/// Prints storage and provider status.
///
/// # Errors
///
/// Returns an error if the stream cannot be counted.
pub fn cmd_status<W: Write>(manager: &MemoryManager, out: &mut W) -> Result<()> {
    writeln!(out, "Anima {}", env!("CARGO_PKG_VERSION"))?;
    writeln!(out, "Character:  {}", manager.profile().name)?;
    write!(out, "{}", format_stats(&manager.stats()?))?;
    Ok(())
}

/// Prints the effective configuration.
///
/// # Errors
///
/// Returns an error if writing output fails.
pub fn cmd_config<W: Write>(config: &AnimaConfig, out: &mut W) -> Result<()> {
    if let Some(path) = AnimaConfig::default_path() {
        writeln!(out, "# default config file: {}", path.display())?;
    }
    write!(out, "{}", format_config(config))?;
    Ok(())
}
