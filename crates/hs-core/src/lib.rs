//! Core logic for incremental activity-heartbeat synchronization.
//!
//! This crate contains:
//! - Classification: turning raw lifecycle events into heartbeats
//! - Merge semantics shared by every heartbeat store
//! - The sync pass and its single-flight scheduler

mod classify;
mod cursor;
mod emit;
pub mod engine;
mod error;
pub mod event;
pub mod heartbeat;
mod merge;
pub mod scheduler;
pub mod source;
#[cfg(test)]
mod testing;
pub mod ticker;
pub mod types;

pub use classify::{
    Classifier, ClassifierConfig, DEFAULT_MAX_REORDER, DEFAULT_SESSION_BOUND, ENTER_DURATION,
};
pub use cursor::resolve_cursor;
pub use emit::HeartbeatEmitter;
pub use engine::{SyncEngine, SyncPass, SyncReport, SyncSettings};
pub use error::{BoxError, SyncError};
pub use event::{LifecycleKind, RawLifecycleEvent};
pub use heartbeat::{Bucket, Heartbeat, Payload, StoredEvent};
pub use merge::{MergePolicy, PulseMergePolicy};
pub use scheduler::{SyncNotice, SyncNotices, SyncObserver, SyncScheduler, SyncState};
pub use source::{
    EventStore, HeartbeatOutcome, LatestEvent, PermissionGate, RawEventSource,
    StaticPermissionGate,
};
pub use ticker::{ManualTicker, TickCallback, Ticker};
pub use types::{BucketId, SubjectId, ValidationError};
