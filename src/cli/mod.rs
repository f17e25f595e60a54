//! CLI module for reelcut
//!
//! This module handles command-line argument parsing and command execution.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::utils::logging::{LogFormat, LogLevel};

pub mod args;
pub mod commands;

/// reelcut - shrink videos and cut highlight clips by re-encoding them
#[derive(Parser, Debug)]
#[command(name = "reelcut")]
#[command(about = "Compress videos and extract clips by live re-encoding")]
#[command(version)]
#[command(long_about = None)]
pub struct Cli {
    /// Configuration file (default: ./reelcut.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Logging level; RUST_LOG takes precedence
    #[arg(long, default_value = "info", global = true)]
    pub log_level: LogLevel,

    /// Log output format: pretty, compact or json
    #[arg(long, default_value = "pretty", global = true)]
    pub log_format: LogFormat,

    /// Progress reporting style
    #[arg(long, value_enum, default_value_t = ProgressMode::Console, global = true)]
    pub progress: ProgressMode,

    /// The command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// How run progress is shown
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProgressMode {
    /// Progress bar on stderr
    Console,
    /// One JSON event per update on stdout
    Json,
    /// No progress output
    None,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Re-encode a whole video at reduced resolution and bitrate
    Compress(args::CompressArgs),
    /// Re-encode a time range of a video as a standalone clip
    Extract(args::ExtractArgs),
    /// Extract every highlight listed in an analysis report
    Highlights(args::HighlightsArgs),
    /// Show video metadata
    Inspect(args::InspectArgs),
}
