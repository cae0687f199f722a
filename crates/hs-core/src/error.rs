//! Error taxonomy for sync passes.
//!
//! None of these abort the process. Permission and source failures end a pass
//! early with zero heartbeats; the rest only skip a single event or heartbeat.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::types::BucketId;

/// Boxed error from a platform collaborator.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised while running a sync pass.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Required data is not readable; the pass ends with no side effects.
    #[error("{permission} data is not readable")]
    PermissionUnavailable { permission: &'static str },

    /// The raw event source could not be queried.
    #[error("raw event query failed: {source}")]
    SourceUnavailable {
        #[source]
        source: BoxError,
    },

    /// A store call failed; the affected heartbeat or bucket is skipped.
    #[error("store rejected {operation} for {bucket}: {source}")]
    TransientTransportFailure {
        operation: &'static str,
        bucket: BucketId,
        #[source]
        source: BoxError,
    },

    /// A single raw event could not be classified.
    #[error("malformed {kind} event at {timestamp}: {reason}")]
    MalformedEvent {
        kind: String,
        timestamp: DateTime<Utc>,
        reason: String,
    },

    /// The store could not produce a usable cursor.
    #[error("cursor for {bucket} is ambiguous: {reason}")]
    CursorResolutionAmbiguous { bucket: BucketId, reason: String },
}
