//! Import command for appending raw lifecycle events to the local event log.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use hs_core::RawLifecycleEvent;
use hs_db::Database;

use crate::Config;

#[derive(Debug, Args)]
pub struct ImportArgs {
    /// Read events from this file instead of stdin.
    #[arg(long)]
    pub file: Option<PathBuf>,
}

pub fn run(args: &ImportArgs, config: &Config) -> Result<usize> {
    let events = match &args.file {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            parse_events(BufReader::new(file))?
        }
        None => parse_events(io::stdin().lock())?,
    };

    let mut db = Database::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))?;
    let inserted = db.insert_raw_events(&events)?;
    tracing::info!(read = events.len(), inserted, "imported raw events");
    Ok(inserted)
}

/// Parses one JSON event per line, keeping file order as delivery order.
fn parse_events<R: BufRead>(reader: R) -> Result<Vec<RawLifecycleEvent>> {
    let mut events = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("failed to read line {}", idx + 1))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let event: RawLifecycleEvent = serde_json::from_str(trimmed)
            .with_context(|| format!("invalid event on line {}", idx + 1))?;
        events.push(event);
    }
    Ok(events)
}
