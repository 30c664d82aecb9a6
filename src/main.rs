//! Binary entry point for anima.
//!
//! This binary provides the CLI interface for the anima character memory system.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use anima::cli::{
    ChatOptions, MemoryAction, ProfileAction, cmd_ask, cmd_backfill, cmd_config, cmd_memory,
    cmd_profile, cmd_recall, cmd_status, run_repl,
};
use anima::config::AnimaConfig;
use anima::observability::{self, LoggingConfig};
use anima::{Interlocutor, MemoryManager};
use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Anima - persistent identity and memory for conversational characters.
#[derive(Parser)]
#[command(name = "anima")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Directory holding the profile and memory index.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Talk to the character.
    Chat {
        /// Your name, as the character should know you.
        #[arg(short, long, default_value = anima::rendering::DEFAULT_INTERLOCUTOR)]
        user: String,

        /// A short description of yourself.
        #[arg(short, long)]
        persona: Option<String>,

        /// Wait for whole replies instead of streaming them.
        #[arg(long)]
        no_stream: bool,

        /// Show estimated token usage after each reply.
        #[arg(long)]
        usage: bool,
    },

    /// Send one message and print the reply.
    Ask {
        /// The message.
        text: String,

        /// Your name.
        #[arg(short, long, default_value = anima::rendering::DEFAULT_INTERLOCUTOR)]
        user: String,

        /// A short description of yourself.
        #[arg(short, long)]
        persona: Option<String>,
    },

    /// Search memories by meaning.
    Recall {
        /// Search query.
        query: String,

        /// Maximum number of results.
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Manage individual memories.
    Memory {
        #[command(subcommand)]
        action: MemoryAction,
    },

    /// Inspect or change the character profile.
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },

    /// Mirror daily-log entries into the memory stream.
    Backfill,

    /// Show memory system status.
    Status,

    /// Show the effective configuration.
    Config,

    /// Generate shell completions.
    Completions {
        /// Target shell.
        shell: clap_complete::Shell,
    },
}

/// Main entry point.
fn main() -> ExitCode {
    let cli = Cli::parse();

    // A missing .env is not an error.
    let _ = dotenvy::dotenv();

    let config = match load_config(cli.config.as_deref(), cli.data_dir.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e:#}");
            return ExitCode::FAILURE;
        },
    };

    if let Err(e) = observability::init(LoggingConfig::from_settings(&config.logging, cli.verbose))
    {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    match run_command(cli, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        },
    }
}

/// Runs the selected command.
fn run_command(cli: Cli, config: &AnimaConfig) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Commands::Config => return cmd_config(config, &mut out),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "anima", &mut out);
            return Ok(());
        },
        _ => {},
    }

    let mut manager = MemoryManager::open(config).with_context(|| {
        format!("could not open character data in {}", config.data_dir.display())
    })?;

    let result = match cli.command {
        Commands::Chat {
            user,
            persona,
            no_stream,
            usage,
        } => {
            let options = ChatOptions {
                interlocutor: interlocutor(user, persona),
                stream: !no_stream,
                show_usage: usage,
            };
            run_repl(&mut manager, &options, io::stdin().lock(), &mut out)
        },
        Commands::Ask {
            text,
            user,
            persona,
        } => cmd_ask(&mut manager, &text, &interlocutor(user, persona), &mut out),
        Commands::Recall { query, limit } => cmd_recall(&manager, &query, limit, &mut out),
        Commands::Memory { action } => cmd_memory(&mut manager, action, &mut out),
        Commands::Profile { action } => cmd_profile(&mut manager, action, &mut out),
        Commands::Backfill => cmd_backfill(&mut manager, &mut out),
        Commands::Status => cmd_status(&manager, &mut out),
        Commands::Config | Commands::Completions { .. } => Ok(()),
    };

    out.flush()?;
    result
}

fn interlocutor(user: String, persona: Option<String>) -> Interlocutor {
    let interlocutor = Interlocutor::new(user);
    match persona {
        Some(persona) => interlocutor.with_persona(persona),
        None => interlocutor,
    }
}

/// Loads configuration: file, then environment, then command-line overrides.
fn load_config(path: Option<&str>, data_dir: Option<&Path>) -> anyhow::Result<AnimaConfig> {
    let config = if let Some(config_path) = path {
        AnimaConfig::load_from_file(Path::new(config_path))
            .with_context(|| format!("reading {config_path}"))?
    } else if let Ok(config_path) = std::env::var("ANIMA_CONFIG_PATH")
        && !config_path.trim().is_empty()
    {
        AnimaConfig::load_from_file(Path::new(&config_path))
            .with_context(|| format!("reading {config_path}"))?
    } else {
        AnimaConfig::load_default()
    };

    let config = config.with_env_overrides()?;
    Ok(match data_dir {
        Some(dir) => config.with_data_dir(dir),
        None => config,
    })
}
