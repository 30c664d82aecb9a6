//! CLI command implementations.
//!
//! The `anima` binary parses arguments and delegates here. Handlers write to
//! any [`std::io::Write`] so they can be driven from tests.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `chat` | Interactive conversation with streamed replies |
//! | `ask` | A single synchronous turn |
//! | `recall` | Ranked semantic search over the memory stream |
//! | `memory` | Add, update, delete or list memories by hand |
//! | `profile` | Show, rename or reset the character profile |
//! | `backfill` | Mirror existing daily-log entries into the memory stream |
//! | `status` | Memory count, storage size, model and credential presence |
//! | `config` | Effective configuration with secrets redacted |
//!
//! # Example Usage
//!
//! ```bash
//! # Start talking
//! anima chat --user Liu
//!
//! # What does the character remember about the harbor?
//! anima recall "the harbor" -n 5
//!
//! # Load the demo character and mirror its history into memory
//! anima profile demo && anima backfill
//! ```

mod commands;
mod format;
mod repl;

pub use commands::{
    MemoryAction, ProfileAction, cmd_ask, cmd_backfill, cmd_config, cmd_memory, cmd_profile,
    cmd_recall, cmd_status,
};
pub use format::{
    format_bytes, format_config, format_profile, format_recent, format_retrieved, format_stats,
    format_usage,
};
pub use repl::{ChatOptions, ReplCommand, parse_repl_line, run_repl};
