//! Sync command: one pass over the local event log into the heartbeat store.

use std::io::Write;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use hs_core::{StaticPermissionGate, SyncEngine, SyncNotices, SyncObserver, SyncScheduler, SyncState};
use hs_db::Database;

use crate::Config;

/// Engine reading and writing the same SQLite file over two connections.
pub type SqliteEngine = SyncEngine<Database, Database, StaticPermissionGate>;

/// How long to wait for notices before rechecking the scheduler.
const NOTICE_POLL: Duration = Duration::from_millis(250);

/// Opens the store and event log and wires them into an engine.
pub fn build_engine(config: &Config) -> Result<SqliteEngine> {
    let settings = config
        .sync_settings()
        .context("invalid bucket configuration")?;
    let open = || {
        Database::open(&config.database_path)
            .with_context(|| format!("failed to open {}", config.database_path.display()))
    };
    Ok(SyncEngine::new(
        open()?,
        open()?,
        config.permission_gate(),
        settings,
    ))
}

/// Logs notices as they are dispatched.
#[derive(Debug, Default)]
pub struct LogObserver {
    pub last_checkpoint: Option<DateTime<Utc>>,
    pub passes: usize,
}

impl SyncObserver for LogObserver {
    fn on_progress(&mut self, checkpoint: DateTime<Utc>) {
        tracing::info!(%checkpoint, "checkpoint reached");
        self.last_checkpoint = Some(checkpoint);
    }

    fn on_complete(&mut self, heartbeats_sent: usize) {
        self.passes += 1;
        tracing::info!(heartbeats_sent, "sync complete");
    }
}

pub fn run<W: Write>(writer: &mut W, config: &Config) -> Result<usize> {
    let (scheduler, notices) = SyncScheduler::new(build_engine(config)?);
    anyhow::ensure!(scheduler.trigger_sync(), "failed to start sync pass");

    let mut observer = LogObserver::default();
    let sent = wait_for_pass(&scheduler, &notices, &mut observer)?;
    writeln!(writer, "Sent {sent} heartbeats")?;
    Ok(sent)
}

/// Waits until the running pass completes, failing if it ends without reporting.
fn wait_for_pass(
    scheduler: &SyncScheduler<SqliteEngine>,
    notices: &SyncNotices,
    observer: &mut LogObserver,
) -> Result<usize> {
    loop {
        if let Some(sent) = notices.wait_for_completion(observer, NOTICE_POLL) {
            return Ok(sent);
        }
        if scheduler.state() == SyncState::Idle {
            // Completion is sent right after the scheduler goes idle.
            return notices
                .wait_for_completion(observer, NOTICE_POLL)
                .context("sync pass ended without completing");
        }
    }
}
