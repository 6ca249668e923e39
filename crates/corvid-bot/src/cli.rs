//! CLI argument definitions for the `corvid` binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Corvid: a conversational bot for your messaging platform.
#[derive(Debug, Parser)]
#[command(name = "corvid", version, about)]
pub struct Cli {
    /// Increase log verbosity (-v: debug for corvid, -vv: trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Override the data directory (default: $CORVID_DATA_DIR or ~/.corvid).
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Export traces via OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Connect to the platform and answer events (default).
    Run,

    /// Validate configuration and environment, then exit.
    CheckConfig,

    /// Generate shell completions.
    Completions {
        /// Target shell.
        shell: Shell,
    },
}
