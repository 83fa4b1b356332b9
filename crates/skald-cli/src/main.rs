//! CLI frontend for the Skald state engine.

mod commands;

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "skald",
    about = "Skald: an authoritative state engine for agent-driven tabletop sessions",
    version,
    propagate_version = true
)]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug); RUST_LOG takes precedence
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Role a `tool` invocation is made under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum RoleArg {
    Narrator,
    Participant,
}

#[derive(Subcommand)]
enum Commands {
    /// Roll dice and print the roll record as JSON
    Roll {
        /// Dice notation, e.g. 2d6+3
        notation: String,

        /// What the roll is for
        #[arg(short, long, default_value = "check")]
        purpose: String,

        /// Who rolls
        #[arg(short, long, default_value = "cli")]
        actor: String,

        /// RNG seed for a reproducible roll
        #[arg(short, long)]
        seed: Option<u64>,
    },

    /// Check dice notation without rolling
    Validate {
        /// Dice notation
        notation: String,
    },

    /// Evaluate an arithmetic expression
    Calc {
        /// Expression using numbers, + - * / ( ) and decimals
        expression: String,
    },

    /// Dispatch one JSON tool call against persisted sessions
    Tool {
        /// Directory holding session documents
        #[arg(long)]
        state_dir: PathBuf,

        /// Role of the caller
        #[arg(long, value_enum, default_value = "narrator")]
        role: RoleArg,

        /// Name of the caller
        #[arg(long, default_value = "DungeonMaster")]
        caller: String,

        /// RNG seed for rolls made by this call
        #[arg(short, long)]
        seed: Option<u64>,

        /// The call as `{"name": ..., "arguments": {...}}`, or `-` for stdin
        request: String,
    },

    /// Play the configured adventure with the scripted cast
    Run {
        /// JSON engine configuration (every field optional)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Persist the session under this directory
        #[arg(long)]
        state_dir: Option<PathBuf>,

        /// Session id (generated when omitted)
        #[arg(long)]
        session: Option<String>,

        /// RNG seed, overriding the config
        #[arg(short, long)]
        seed: Option<u64>,

        /// Round cap, overriding the config
        #[arg(long)]
        max_rounds: Option<u32>,

        /// Seat a narrator that never acts, leaving the session to the hooks
        #[arg(long)]
        passive: bool,
    },

    /// Show a persisted session
    Show {
        /// Directory holding session documents
        #[arg(long)]
        state_dir: PathBuf,

        /// Session id (default: the active or most recent session)
        session: Option<String>,

        /// Number of recent events to list
        #[arg(short, long, default_value = "10")]
        events: usize,

        /// Print the full event log as markdown instead
        #[arg(short, long)]
        markdown: bool,
    },
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> miette::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Roll {
            notation,
            purpose,
            actor,
            seed,
        } => commands::roll::run(&notation, &purpose, &actor, seed),
        Commands::Validate { notation } => commands::validate::run(&notation),
        Commands::Calc { expression } => commands::calc::run(&expression),
        Commands::Tool {
            state_dir,
            role,
            caller,
            seed,
            request,
        } => commands::tool::run(&state_dir, role == RoleArg::Narrator, &caller, seed, &request),
        Commands::Run {
            config,
            state_dir,
            session,
            seed,
            max_rounds,
            passive,
        } => commands::run::run(
            config.as_deref(),
            state_dir.as_deref(),
            session.as_deref(),
            seed,
            max_rounds,
            passive,
        ),
        Commands::Show {
            state_dir,
            session,
            events,
            markdown,
        } => commands::show::run(&state_dir, session.as_deref(), events, markdown),
    }
}
