//! Clap derive structures for the `hubpanel` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// hubpanel -- inspect and edit a wall-panel configuration
#[derive(Debug, Parser)]
#[command(
    name = "hubpanel",
    version,
    about = "Inspect the panel configuration and hub entities from the command line",
    long_about = "Reads and writes the panel configuration document on the settings server\n\
        (falling back to the local mirror when it is unreachable), and reads, watches,\n\
        and commands entities on the home-automation hub.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file to read instead of the platform default
    #[arg(long, env = "HUBPANEL_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Hub URL (overrides hub.url)
    #[arg(long, global = true)]
    pub hub: Option<String>,

    /// Hub access token (overrides env, keyring, and config file)
    #[arg(long, global = true, hide = true)]
    pub token: Option<String>,

    /// Settings server URL (overrides settings.url)
    #[arg(long, global = true)]
    pub settings: Option<String>,

    /// Identity the configuration document is stored under
    #[arg(long, short = 'i', global = true)]
    pub identity: Option<String>,

    /// Output format (defaults to `defaults.output` from the config file)
    #[arg(long, short = 'o', global = true)]
    pub output: Option<OutputFormat>,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (hub and settings server)
    #[arg(long, global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show the current state of one entity
    #[command(alias = "get")]
    State(StateArgs),

    /// Poll entities and print every state change
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Send a command to an entity
    Call(CallArgs),

    /// Read and edit the panel configuration
    #[command(alias = "cfg")]
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  ENTITIES
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct StateArgs {
    /// Entity id (e.g. climate.living)
    pub entity: String,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Entity ids to watch
    #[arg(required = true, num_args = 1..)]
    pub entities: Vec<String>,

    /// Refresh interval in milliseconds (minimum 100)
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// Exit after this many updates
    #[arg(long, short = 'n')]
    pub count: Option<usize>,
}

#[derive(Debug, Args)]
pub struct CallArgs {
    /// Entity id to command
    pub entity: String,

    /// Command name: `service` in the entity's domain, or `domain.service`
    pub command: String,

    /// Extra parameters as a JSON object
    #[arg(long, short = 'd')]
    pub data: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the panel configuration, or one section of it
    Show {
        /// Section name (e.g. climate, waterHeater, navIcons)
        section: Option<String>,
    },

    /// Replace one section of the panel configuration
    Set {
        /// Section name
        section: String,

        /// New section value as JSON
        value: String,
    },

    /// List the entities bound anywhere in the panel configuration
    Entities,

    /// Print the path of the CLI config file
    Path,

    /// Store the hub token in the system keyring
    SetToken {
        /// Token value (read from stdin when omitted)
        token: Option<String>,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
