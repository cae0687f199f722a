//! Synchronization watermark resolution.
//!
//! The cursor is never persisted separately. Each pass asks the store for the
//! newest event of the primary bucket, which keeps the engine stateless across
//! restarts. Every failure resolves to `None`, meaning "sync from the beginning".

use chrono::{DateTime, Utc};

use crate::error::SyncError;
use crate::source::EventStore;
use crate::types::BucketId;

/// Resolves the cursor for `bucket_id`, falling back to `None` on any ambiguity.
pub fn resolve_cursor<S: EventStore>(store: &S, bucket_id: &BucketId) -> Option<DateTime<Utc>> {
    match try_resolve_cursor(store, bucket_id) {
        Ok(cursor) => {
            tracing::debug!(bucket = %bucket_id, cursor = %cursor, "resolved cursor");
            Some(cursor)
        }
        Err(err) => {
            tracing::warn!(bucket = %bucket_id, error = %err, "resyncing from the beginning");
            None
        }
    }
}

fn try_resolve_cursor<S: EventStore>(
    store: &S,
    bucket_id: &BucketId,
) -> Result<DateTime<Utc>, SyncError> {
    let events = store
        .query_latest_events(bucket_id, 1)
        .map_err(|source| SyncError::CursorResolutionAmbiguous {
            bucket: bucket_id.clone(),
            reason: format!("latest event query failed: {source}"),
        })?;

    let [latest] = events.as_slice() else {
        return Err(SyncError::CursorResolutionAmbiguous {
            bucket: bucket_id.clone(),
            reason: format!("expected exactly one latest event, got {}", events.len()),
        });
    };

    DateTime::parse_from_rfc3339(&latest.timestamp)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|err| SyncError::CursorResolutionAmbiguous {
            bucket: bucket_id.clone(),
            reason: format!("unparseable timestamp {:?}: {err}", latest.timestamp),
        })
}
