//! Interactive chat loop.
//!
//! Reads lines from any [`BufRead`] and writes to any [`Write`], so the loop
//! runs the same against a terminal and against an in-memory script.

use super::format::{format_retrieved, format_usage};
use crate::models::RetrievedMemory;
use crate::rendering::Interlocutor;
use crate::services::MemoryManager;
use anyhow::Result;
use std::io::{BufRead, Write};

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    /// `/reflect`: reflect on the session so far.
    Reflect,
    /// `/memories`: show what the last turn retrieved.
    Memories,
    /// `/model [NAME]`: show or switch the completion model.
    Model(Option<String>),
    /// `/quit` or `/exit`.
    Quit,
    /// `/help`.
    Help,
    /// An unrecognised slash command.
    Unknown(String),
    /// Text to send to the character.
    Message(String),
    /// A blank line.
    Empty,
}

/// Parses one line of REPL input.
#[must_use]
pub fn parse_repl_line(line: &str) -> ReplCommand {
    let line = line.trim();
    if line.is_empty() {
        return ReplCommand::Empty;
    }
    let Some(command) = line.strip_prefix('/') else {
        return ReplCommand::Message(line.to_string());
    };

    let (name, arg) = match command.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (command, ""),
    };
    match name.to_lowercase().as_str() {
        "reflect" => ReplCommand::Reflect,
        "memories" => ReplCommand::Memories,
        "model" if arg.is_empty() => ReplCommand::Model(None),
        "model" => ReplCommand::Model(Some(arg.to_string())),
        "quit" | "exit" => ReplCommand::Quit,
        "help" | "?" => ReplCommand::Help,
        other => ReplCommand::Unknown(other.to_string()),
    }
}

const HELP: &str = "Commands:
  /reflect        reflect on this session and update the profile
  /memories       show the memories retrieved for the last message
  /model [NAME]   show or switch the completion model
  /quit           reflect (if anything was said) and exit";

/// How the chat loop presents turns.
#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    /// Who the character is talking to.
    pub interlocutor: Interlocutor,
    /// Print replies fragment by fragment.
    pub stream: bool,
    /// Print the token estimate after each reply.
    pub show_usage: bool,
}

/// Runs the chat loop until `/quit` or end of input.
///
/// # Errors
///
/// Returns an error if reading input or writing output fails. Storage and
/// generation problems are reported inline and do not end the loop.
pub fn run_repl<R: BufRead, W: Write>(
    manager: &mut MemoryManager,
    options: &ChatOptions,
    mut input: R,
    out: &mut W,
) -> Result<()> {
    let user = options.interlocutor.name.as_str();
    writeln!(
        out,
        "Talking to {} as {user}. Type /help for commands.",
        manager.profile().name
    )?;

    let mut last_memories: Vec<RetrievedMemory> = Vec::new();
    let mut line = String::new();
    loop {
        write!(out, "{user}> ")?;
        out.flush()?;

        line.clear();
        let command = if input.read_line(&mut line)? == 0 {
            writeln!(out)?;
            ReplCommand::Quit
        } else {
            parse_repl_line(&line)
        };

        match command {
            ReplCommand::Empty => {},
            ReplCommand::Help => writeln!(out, "{HELP}")?,
            ReplCommand::Unknown(name) => {
                writeln!(out, "Unknown command /{name}. Type /help for commands.")?;
            },
            ReplCommand::Memories => writeln!(out, "{}", format_retrieved(&last_memories))?,
            ReplCommand::Model(None) => writeln!(out, "Model: {}", manager.llm().model())?,
            ReplCommand::Model(Some(model)) => {
                manager.llm_mut().set_model(model);
                writeln!(out, "Model set to {}", manager.llm().model())?;
            },
            ReplCommand::Reflect => reflect(manager, user, out)?,
            ReplCommand::Quit => {
                if !manager.session().is_empty() {
                    writeln!(out, "Reflecting on the conversation...")?;
                    reflect(manager, user, out)?;
                }
                writeln!(out, "Goodbye.")?;
                return Ok(());
            },
            ReplCommand::Message(text) => {
                last_memories = if options.stream {
                    streamed_turn(manager, options, &text, out)?
                } else {
                    blocking_turn(manager, options, &text, out)?
                };
            },
        }
    }
}

fn reflect<W: Write>(manager: &mut MemoryManager, user: &str, out: &mut W) -> Result<()> {
    match manager.reflect_on_session(user) {
        Ok(outcome) => writeln!(out, "{outcome}")?,
        Err(e) => writeln!(out, "Reflection could not be saved: {e}")?,
    }
    Ok(())
}

fn blocking_turn<W: Write>(
    manager: &mut MemoryManager,
    options: &ChatOptions,
    text: &str,
    out: &mut W,
) -> Result<Vec<RetrievedMemory>> {
    let turn = manager.chat_as(text, &options.interlocutor);
    writeln!(out, "{}: {}", manager.profile().name, turn.display_text())?;
    for warning in &turn.warnings {
        writeln!(out, "warning: {warning}")?;
    }
    if options.show_usage && turn.reply.is_ok() {
        writeln!(out, "{}", format_usage(&turn.usage))?;
    }
    Ok(turn.memories)
}

fn streamed_turn<W: Write>(
    manager: &mut MemoryManager,
    options: &ChatOptions,
    text: &str,
    out: &mut W,
) -> Result<Vec<RetrievedMemory>> {
    let mut turn = manager.chat_stream(text, &options.interlocutor);
    write!(out, "{}: ", manager.profile().name)?;
    let mut partial = false;
    for fragment in turn.by_ref() {
        match fragment {
            Ok(fragment) => {
                partial = true;
                write!(out, "{fragment}")?;
                out.flush()?;
            },
            Err(e) => {
                if partial {
                    writeln!(out)?;
                }
                write!(out, "{}", e.sentinel())?;
            },
        }
    }
    writeln!(out)?;

    for warning in &turn.warnings {
        writeln!(out, "warning: {warning}")?;
    }
    let memories = std::mem::take(&mut turn.memories);
    let usage = turn.usage;
    match manager.commit_stream(turn, &options.interlocutor) {
        Ok(Some(response)) => {
            if options.show_usage {
                writeln!(out, "{}", format_usage(&usage.with_output(&response)))?;
            }
        },
        Ok(None) => {},
        Err(e) => writeln!(out, "warning: interaction not saved: {e}")?,
    }
    Ok(memories)
}
