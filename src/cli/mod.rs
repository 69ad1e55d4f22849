//! CLI module
//!
//! Command-line interface for running extraction pipelines.
//!
//! # Commands
//!
//! - `run` - Extract and load the selected streams
//! - `check` - Resolve a session and describe one object
//! - `streams` - List catalog streams

mod commands;
mod pipeline;
mod runner;

pub use commands::{Cli, Commands, OutputFormat};
pub use pipeline::{run_streams, RunReport, StreamReport, StreamStatus};
pub use runner::Runner;
