//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::commands::events::EventsArgs;
use crate::commands::import::ImportArgs;

/// Incremental activity heartbeat sync.
///
/// Turns logged app lifecycle events into merged activity heartbeats, picking up
/// where the previous pass left off.
#[derive(Debug, Parser)]
#[command(name = "hs", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Append raw lifecycle events (JSONL) to the event log.
    Import(ImportArgs),

    /// Run one sync pass and wait for it to finish.
    Sync,

    /// Sync now and then on every interval until interrupted.
    Watch,

    /// Show buckets and their latest heartbeat.
    Status,

    /// Print a bucket's stored heartbeats as JSONL.
    Events(EventsArgs),
}
