//! One synchronization pass: permission check, cursor, classification, emission.

use chrono::{DateTime, Utc};

use crate::classify::{Classifier, ClassifierConfig};
use crate::cursor::resolve_cursor;
use crate::emit::HeartbeatEmitter;
use crate::error::SyncError;
use crate::heartbeat::Bucket;
use crate::source::{EventStore, PermissionGate, RawEventSource};

/// Bucket type of the foreground activity bucket.
pub const PRIMARY_BUCKET_TYPE: &str = "currentwindow";

/// Bucket type of the unlock marker bucket.
pub const UNLOCK_BUCKET_TYPE: &str = "os.lockscreen.unlocks";

/// Default number of acknowledged activity heartbeats between progress checkpoints.
pub const DEFAULT_PROGRESS_EVERY: usize = 100;

/// Settings for a [`SyncEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    pub classifier: ClassifierConfig,
    /// Hostname recorded on created buckets.
    pub hostname: String,
    /// Client name recorded on created buckets.
    pub client: String,
    /// Publish a checkpoint on the 1st, (n+1)th, (2n+1)th... acknowledged activity heartbeat.
    pub progress_every: usize,
}

impl SyncSettings {
    pub fn new(classifier: ClassifierConfig, hostname: impl Into<String>) -> Self {
        Self {
            classifier,
            hostname: hostname.into(),
            client: "heartsync".to_string(),
            progress_every: DEFAULT_PROGRESS_EVERY,
        }
    }

    fn buckets(&self) -> [Bucket; 2] {
        [
            Bucket::new(
                self.classifier.primary_bucket.clone(),
                PRIMARY_BUCKET_TYPE,
                &self.hostname,
                &self.client,
            ),
            Bucket::new(
                self.classifier.unlock_bucket.clone(),
                UNLOCK_BUCKET_TYPE,
                &self.hostname,
                &self.client,
            ),
        ]
    }
}

/// Outcome of a single pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Activity heartbeats the store acknowledged. Unlock markers are not counted.
    pub heartbeats_sent: usize,
    /// Raw events skipped as malformed.
    pub skipped_events: usize,
    /// Heartbeats the store rejected, in either bucket.
    pub failed_heartbeats: usize,
    /// Buckets that could not be created at the start of the pass.
    pub bucket_failures: usize,
    /// Cursor the pass started from.
    pub cursor: Option<DateTime<Utc>>,
    /// Last checkpoint published during the pass.
    pub last_checkpoint: Option<DateTime<Utc>>,
}

/// Anything the scheduler can run as a pass.
pub trait SyncPass {
    /// Runs a pass to completion, calling `progress` with each checkpoint.
    fn run(&mut self, progress: &mut dyn FnMut(DateTime<Utc>)) -> SyncReport;
}

/// Wires the collaborators of a pass together.
pub struct SyncEngine<S, R, G> {
    store: S,
    source: R,
    gate: G,
    settings: SyncSettings,
}

impl<S, R, G> SyncEngine<S, R, G>
where
    S: EventStore,
    R: RawEventSource,
    G: PermissionGate,
{
    pub const fn new(store: S, source: R, gate: G, settings: SyncSettings) -> Self {
        Self {
            store,
            source,
            gate,
            settings,
        }
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    pub const fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub const fn source_mut(&mut self) -> &mut R {
        &mut self.source
    }

    /// Runs one pass and returns its report.
    pub fn run_pass(&mut self, progress: &mut dyn FnMut(DateTime<Utc>)) -> SyncReport {
        let mut report = SyncReport::default();

        if !self.gate.is_usage_readable() {
            let err = SyncError::PermissionUnavailable { permission: "usage" };
            tracing::warn!(error = %err, "skipping sync pass");
            return report;
        }
        let include_class_names = self.gate.is_accessibility_readable();
        if !include_class_names {
            tracing::info!("accessibility data not readable, omitting class names");
        }

        let settings = &self.settings;
        let primary = &settings.classifier.primary_bucket;

        report.bucket_failures =
            HeartbeatEmitter::new(&mut self.store).ensure_buckets(&settings.buckets());
        if report.bucket_failures > 0 {
            tracing::warn!(
                failures = report.bucket_failures,
                "continuing sync pass without every bucket"
            );
        }

        report.cursor = resolve_cursor(&self.store, primary);
        tracing::info!(
            bucket = %primary,
            cursor = %report.cursor.map_or_else(|| "never".to_string(), |c| c.to_rfc3339()),
            "starting sync pass"
        );

        let from = report.cursor.unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        let events = match self.source.query_events(from, None) {
            Ok(events) => events,
            Err(source) => {
                let err = SyncError::SourceUnavailable {
                    source: Box::new(source),
                };
                tracing::warn!(error = %err, "skipping sync pass");
                return report;
            }
        };
        tracing::debug!(count = events.len(), "queried raw events");

        let progress_every = settings.progress_every.max(1);
        let mut classifier = Classifier::new(&settings.classifier, report.cursor, include_class_names);
        let mut emitter = HeartbeatEmitter::new(&mut self.store);

        for event in &events {
            let heartbeat = match classifier.classify(event) {
                Ok(Some(heartbeat)) => heartbeat,
                Ok(None) => continue,
                Err(err) => {
                    report.skipped_events += 1;
                    tracing::warn!(error = %err, "skipping raw event");
                    continue;
                }
            };

            if let Err(err) = emitter.emit(&heartbeat) {
                tracing::warn!(error = %err, timestamp = %heartbeat.timestamp, "heartbeat lost for this pass");
                continue;
            }
            // Unlock markers neither count as sent nor become checkpoints.
            if heartbeat.bucket_id != *primary {
                continue;
            }
            if report.heartbeats_sent % progress_every == 0 {
                report.last_checkpoint = Some(heartbeat.timestamp);
                progress(heartbeat.timestamp);
            }
            report.heartbeats_sent += 1;
        }

        report.failed_heartbeats = emitter.failed();
        tracing::info!(
            sent = report.heartbeats_sent,
            acknowledged = emitter.acknowledged(),
            skipped = report.skipped_events,
            failed = report.failed_heartbeats,
            "finished sync pass"
        );
        report
    }
}

impl<S, R, G> SyncPass for SyncEngine<S, R, G>
where
    S: EventStore,
    R: RawEventSource,
    G: PermissionGate,
{
    fn run(&mut self, progress: &mut dyn FnMut(DateTime<Utc>)) -> SyncReport {
        self.run_pass(progress)
    }
}
