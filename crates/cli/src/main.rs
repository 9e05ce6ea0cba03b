//! Codemark anchor CLI - anchor command

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cmd;
mod diff_utils;
mod util;

/// Anchor - keep code annotations attached to the lines they describe
#[derive(Parser)]
#[command(name = "anchor")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a recorded location against HEAD
    Locate {
        /// File the location belongs to
        file: PathBuf,
        /// Commit the location was recorded at
        #[arg(long)]
        commit: String,
        /// Location as start_line,start_col,end_line,end_col ("*" for absent)
        #[arg(long)]
        location: String,
        /// Marker id used for caching
        #[arg(long, default_value = "cli")]
        marker: String,
        /// Stream id used for caching
        #[arg(long, default_value = "default")]
        stream: String,
        /// Also place the location in the working-tree file
        #[arg(long)]
        dirty: bool,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the authors of a line range
    Authors {
        /// File to blame
        file: PathBuf,
        /// Line range as start,end
        #[arg(short = 'L', long = "lines")]
        lines: String,
        /// Blame the working-tree file instead of HEAD
        #[arg(long)]
        dirty: bool,
    },
    /// Show the line edits between two revisions of a file
    Delta {
        /// File to diff
        file: PathBuf,
        /// Old revision
        old_rev: String,
        /// New revision (default: working tree)
        new_rev: Option<String>,
        /// Only print edit headers, not line contents
        #[arg(long)]
        stat: bool,
    },
    /// View and edit configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// List all configuration values
    List,
    /// Print one configuration value
    Get {
        /// Dotted key, e.g. git.timeout_ms
        key: String,
    },
    /// Set one configuration value
    Set {
        /// Dotted key, e.g. git.timeout_ms
        key: String,
        /// New value
        value: String,
    },
    /// Show the config file path
    Path {
        /// Create the file with defaults if missing
        #[arg(long)]
        create: bool,
    },
    /// Print a commented example configuration
    Example,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Locate { file, commit, location, marker, stream, dirty, json } => {
            cmd::locate::run(&file, &commit, &location, &marker, &stream, dirty, json).await
        }
        Commands::Authors { file, lines, dirty } => cmd::authors::run(&file, &lines, dirty).await,
        Commands::Delta { file, old_rev, new_rev, stat } => {
            cmd::delta::run(&file, &old_rev, new_rev.as_deref(), stat).await
        }
        Commands::Config(config_cmd) => match config_cmd {
            ConfigCommands::List => cmd::config::run_list().await,
            ConfigCommands::Get { key } => cmd::config::run_get(&key).await,
            ConfigCommands::Set { key, value } => cmd::config::run_set(&key, &value).await,
            ConfigCommands::Path { create } => cmd::config::run_path(create).await,
            ConfigCommands::Example => cmd::config::run_example().await,
        },
    }
}
