//! CLI command definitions for entity-index
//!
//! This module defines the CLI structure using clap's derive macros.
//! The main entry point is the `Cli` struct which contains subcommands.

pub mod export;
pub mod index;

use crate::format::OutputFormat;
use clap::{Args, Parser, Subcommand};
use export::ExportArgs;
use index::IndexArgs;

/// Index entity-named dataset trees and their JSON sidecars
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Path to database file (overrides config)
    #[arg(short, long, global = true)]
    pub database: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Walk a dataset root and index its files, tags and sidecar metadata
    Index(IndexArgs),

    /// Export the index to structured JSON
    Export(ExportArgs),

    /// Show row counts for the index database
    Stats(StatsArgs),
}

/// Arguments for the stats subcommand
#[derive(Args, Debug)]
pub struct StatsArgs {
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Markdown)]
    pub format: OutputFormat,
}
