//! Interfaces of the collaborators a sync pass consumes.
//!
//! The permission gate, raw event source, and heartbeat store are owned by the
//! platform. The engine only talks to them through these traits.

use chrono::{DateTime, Utc};

use crate::event::RawLifecycleEvent;
use crate::heartbeat::{Bucket, Heartbeat};
use crate::types::BucketId;

/// Reports whether the data a pass needs is currently readable.
pub trait PermissionGate {
    /// Whether application usage events can be queried.
    fn is_usage_readable(&self) -> bool;

    /// Whether window/class identifiers may be attached to heartbeats.
    fn is_accessibility_readable(&self) -> bool;
}

/// Permission gate with fixed answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticPermissionGate {
    pub usage: bool,
    pub accessibility: bool,
}

impl StaticPermissionGate {
    pub const fn granted() -> Self {
        Self {
            usage: true,
            accessibility: true,
        }
    }
}

impl PermissionGate for StaticPermissionGate {
    fn is_usage_readable(&self) -> bool {
        self.usage
    }

    fn is_accessibility_readable(&self) -> bool {
        self.accessibility
    }
}

/// Yields lifecycle events in delivery order.
pub trait RawEventSource {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Returns events with `from <= timestamp` and, when `to` is set,
    /// `timestamp < to`. `to = None` means no upper bound.
    fn query_events(
        &mut self,
        from: DateTime<Utc>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<RawLifecycleEvent>, Self::Error>;
}

/// The most recent event of a bucket, with its timestamp exactly as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestEvent {
    pub timestamp: String,
}

/// What the store did with a submitted heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatOutcome {
    /// Coalesced into the bucket's latest event.
    Merged,
    /// An event with the same payload already spans the heartbeat.
    Duplicate,
    /// Stored as a new event.
    Inserted,
}

/// Bucket-oriented event store with merge-on-write heartbeats.
pub trait EventStore {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Creates the bucket unless it exists. Returns `true` if it was created.
    fn create_bucket_if_absent(&mut self, bucket: &Bucket) -> Result<bool, Self::Error>;

    /// Returns up to `limit` of the most recent events in a bucket, newest first.
    fn query_latest_events(
        &self,
        bucket_id: &BucketId,
        limit: usize,
    ) -> Result<Vec<LatestEvent>, Self::Error>;

    /// Submits a heartbeat, merging it per the store's merge policy.
    fn submit_heartbeat(&mut self, heartbeat: &Heartbeat) -> Result<HeartbeatOutcome, Self::Error>;
}
