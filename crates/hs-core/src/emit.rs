//! Best-effort heartbeat delivery.

use crate::error::SyncError;
use crate::heartbeat::{Bucket, Heartbeat};
use crate::source::{EventStore, HeartbeatOutcome};

/// Sends heartbeats to a store and counts acknowledgements.
///
/// Failures are returned to the caller for logging but never retried; the next
/// pass replays from the cursor instead.
pub struct HeartbeatEmitter<'s, S> {
    store: &'s mut S,
    acknowledged: usize,
    failed: usize,
}

impl<'s, S: EventStore> HeartbeatEmitter<'s, S> {
    pub const fn new(store: &'s mut S) -> Self {
        Self {
            store,
            acknowledged: 0,
            failed: 0,
        }
    }

    /// Creates every bucket that does not exist yet.
    ///
    /// Returns the number of buckets that could not be ensured.
    pub fn ensure_buckets(&mut self, buckets: &[Bucket]) -> usize {
        let mut failures = 0;
        for bucket in buckets {
            match self.store.create_bucket_if_absent(bucket) {
                Ok(true) => tracing::info!(bucket = %bucket.id, kind = %bucket.kind, "created bucket"),
                Ok(false) => tracing::debug!(bucket = %bucket.id, "bucket already exists"),
                Err(source) => {
                    failures += 1;
                    let err = SyncError::TransientTransportFailure {
                        operation: "bucket creation",
                        bucket: bucket.id.clone(),
                        source: Box::new(source),
                    };
                    tracing::warn!(error = %err, "could not ensure bucket");
                }
            }
        }
        failures
    }

    /// Submits one heartbeat.
    pub fn emit(&mut self, heartbeat: &Heartbeat) -> Result<HeartbeatOutcome, SyncError> {
        match self.store.submit_heartbeat(heartbeat) {
            Ok(outcome) => {
                self.acknowledged += 1;
                tracing::trace!(
                    bucket = %heartbeat.bucket_id,
                    timestamp = %heartbeat.timestamp,
                    ?outcome,
                    "heartbeat acknowledged"
                );
                Ok(outcome)
            }
            Err(source) => {
                self.failed += 1;
                Err(SyncError::TransientTransportFailure {
                    operation: "heartbeat",
                    bucket: heartbeat.bucket_id.clone(),
                    source: Box::new(source),
                })
            }
        }
    }

    /// Heartbeats the store acknowledged so far.
    pub const fn acknowledged(&self) -> usize {
        self.acknowledged
    }

    /// Heartbeats the store rejected so far.
    pub const fn failed(&self) -> usize {
        self.failed
    }
}
