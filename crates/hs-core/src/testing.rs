//! In-memory collaborators for unit tests.

use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;

use crate::event::RawLifecycleEvent;
use crate::heartbeat::{Bucket, Heartbeat, StoredEvent};
use crate::merge::{MergePolicy, PulseMergePolicy};
use crate::source::{EventStore, HeartbeatOutcome, LatestEvent, RawEventSource};
use crate::types::BucketId;

#[derive(Debug, Error)]
#[error("{0}")]
pub struct FakeError(&'static str);

/// Store that applies [`PulseMergePolicy`] like the SQLite store does.
#[derive(Debug, Default)]
pub struct MemoryStore {
    pub buckets: Vec<Bucket>,
    pub events: HashMap<BucketId, Vec<StoredEvent>>,
    pub submitted: Vec<Heartbeat>,
    pub submissions: usize,
    pub reject_at: Option<DateTime<Utc>>,
    pub fail_queries: bool,
    pub fail_buckets: bool,
    pub latest_override: Option<Vec<String>>,
}

impl MemoryStore {
    pub fn with_latest(timestamps: Vec<&str>) -> Self {
        Self {
            latest_override: Some(timestamps.into_iter().map(str::to_string).collect()),
            ..Self::default()
        }
    }

    pub fn latest(&self, bucket_id: &BucketId) -> Option<&StoredEvent> {
        self.events
            .get(bucket_id)?
            .iter()
            .max_by_key(|event| event.timestamp)
    }

    pub fn event_count(&self) -> usize {
        self.events.values().map(Vec::len).sum()
    }
}

impl EventStore for MemoryStore {
    type Error = FakeError;

    fn create_bucket_if_absent(&mut self, bucket: &Bucket) -> Result<bool, Self::Error> {
        if self.fail_buckets {
            return Err(FakeError("bucket creation refused"));
        }
        if self.buckets.iter().any(|existing| existing.id == bucket.id) {
            return Ok(false);
        }
        self.buckets.push(bucket.clone());
        Ok(true)
    }

    fn query_latest_events(
        &self,
        bucket_id: &BucketId,
        limit: usize,
    ) -> Result<Vec<LatestEvent>, Self::Error> {
        if self.fail_queries {
            return Err(FakeError("query refused"));
        }
        if let Some(timestamps) = &self.latest_override {
            return Ok(timestamps
                .iter()
                .map(|timestamp| LatestEvent {
                    timestamp: timestamp.clone(),
                })
                .collect());
        }
        Ok(self
            .latest(bucket_id)
            .into_iter()
            .take(limit)
            .map(|event| LatestEvent {
                timestamp: event.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            })
            .collect())
    }

    fn submit_heartbeat(&mut self, heartbeat: &Heartbeat) -> Result<HeartbeatOutcome, Self::Error> {
        if self.reject_at == Some(heartbeat.timestamp) {
            return Err(FakeError("transport down"));
        }
        self.submissions += 1;
        self.submitted.push(heartbeat.clone());

        let merged = self
            .latest(&heartbeat.bucket_id)
            .and_then(|last| PulseMergePolicy.merge(last, heartbeat).map(|merged| (last.clone(), merged)));
        let events = self.events.entry(heartbeat.bucket_id.clone()).or_default();

        if let Some((last, merged)) = merged {
            if let Some(slot) = events.iter_mut().find(|event| **event == last) {
                *slot = merged;
            }
            return Ok(HeartbeatOutcome::Merged);
        }
        if events.iter().any(|event| event.covers(heartbeat)) {
            return Ok(HeartbeatOutcome::Duplicate);
        }
        events.push(StoredEvent::from(heartbeat));
        Ok(HeartbeatOutcome::Inserted)
    }
}

/// Source backed by a vector in delivery order.
#[derive(Debug, Default)]
pub struct VecSource {
    pub events: Vec<RawLifecycleEvent>,
    pub queries: Vec<(DateTime<Utc>, Option<DateTime<Utc>>)>,
    pub fail: bool,
}

impl VecSource {
    pub fn new(events: Vec<RawLifecycleEvent>) -> Self {
        Self {
            events,
            ..Self::default()
        }
    }

    pub fn push(&mut self, event: RawLifecycleEvent) {
        self.events.push(event);
    }
}

impl RawEventSource for VecSource {
    type Error = FakeError;

    fn query_events(
        &mut self,
        from: DateTime<Utc>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<RawLifecycleEvent>, Self::Error> {
        self.queries.push((from, to));
        if self.fail {
            return Err(FakeError("usage events unavailable"));
        }
        Ok(self
            .events
            .iter()
            .filter(|event| event.timestamp >= from && to.is_none_or(|to| event.timestamp < to))
            .cloned()
            .collect())
    }
}
