//! CLI commands and argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Salesforce extraction pipeline CLI
#[derive(Parser, Debug)]
#[command(name = "sf-ingest")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Pipeline document (YAML or JSON)
    #[arg(short, long, global = true)]
    pub pipeline: Option<PathBuf>,

    /// Directory holding credential secrets as JSON files
    #[arg(long, global = true, default_value = "secrets")]
    pub secrets_dir: PathBuf,

    /// State file (JSON); defaults to `state.json` in the output directory
    #[arg(short, long, global = true)]
    pub state: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Command to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Extract and load streams
    Run {
        /// Streams to run (comma-separated); defaults to the pipeline's list
        #[arg(long, value_delimiter = ',')]
        streams: Vec<String>,

        /// Output directory; overrides the destination path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Resolve a session and describe one object
    Check {
        /// Object to describe
        #[arg(long, default_value = "Account")]
        object: String,
    },

    /// List catalog streams
    Streams,
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output (one message per line)
    Json,
    /// Human-readable output
    Pretty,
}
