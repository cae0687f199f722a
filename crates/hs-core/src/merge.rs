//! Merge contract between submitted heartbeats and stored events.
//!
//! The classifier never computes session lengths itself. It relies on the store
//! coalescing a heartbeat into the bucket's latest event when both carry the same
//! payload and the heartbeat starts within `pulsetime` of that event's end.
//! [`MergePolicy`] makes that contract explicit so it can be exercised without a
//! real store.

use std::cmp::max;

use crate::heartbeat::{Heartbeat, StoredEvent};

/// Decides whether an incoming heartbeat coalesces with a stored event.
pub trait MergePolicy {
    /// Returns the merged event, or `None` if the heartbeat must be stored separately.
    fn merge(&self, last: &StoredEvent, incoming: &Heartbeat) -> Option<StoredEvent>;
}

/// Interval + payload equality merge.
///
/// Merges when payloads are equal and
/// `last.timestamp <= incoming.timestamp <= last.end + pulsetime`. The merged
/// event keeps the stored start and extends to the later of both ends.
#[derive(Debug, Clone, Copy, Default)]
pub struct PulseMergePolicy;

impl MergePolicy for PulseMergePolicy {
    fn merge(&self, last: &StoredEvent, incoming: &Heartbeat) -> Option<StoredEvent> {
        if last.data != incoming.data {
            return None;
        }
        let pulse_end = last.end() + incoming.pulsetime;
        if incoming.timestamp < last.timestamp || incoming.timestamp > pulse_end {
            return None;
        }
        let end = max(last.end(), incoming.end());
        Some(StoredEvent {
            id: last.id,
            timestamp: last.timestamp,
            duration: end - last.timestamp,
            data: last.data.clone(),
        })
    }
}
