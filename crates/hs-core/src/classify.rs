//! Lifecycle event classification.
//!
//! Turns raw lifecycle events into heartbeats in a single ordered pass. The
//! classifier never pairs enter/exit events itself:
//!
//! - an enter becomes a 1s heartbeat with a 1s pulsetime ("seen, end unknown"),
//! - an exit becomes a heartbeat whose duration and pulsetime equal the session
//!   bound, so the store's merge closes the session opened by the enter,
//! - an unlock becomes a zero-length marker in the unlock bucket.
//!
//! A lone exit therefore still yields a bounded heartbeat.

use chrono::{DateTime, TimeDelta, Utc};
use serde_json::Value;

use crate::error::SyncError;
use crate::event::{LifecycleKind, RawLifecycleEvent};
use crate::heartbeat::{Heartbeat, Payload};
use crate::types::{BucketId, SubjectId};

/// Default length of the longest plausible foreground session.
pub const DEFAULT_SESSION_BOUND: TimeDelta = TimeDelta::hours(24);

/// Default tolerance for events delivered slightly out of order.
pub const DEFAULT_MAX_REORDER: TimeDelta = TimeDelta::seconds(60);

/// Duration and pulsetime of a foreground-entered heartbeat.
pub const ENTER_DURATION: TimeDelta = TimeDelta::seconds(1);

/// Settings shared by every pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifierConfig {
    /// Bucket receiving foreground activity.
    pub primary_bucket: BucketId,
    /// Bucket receiving unlock markers.
    pub unlock_bucket: BucketId,
    /// Duration and pulsetime of exit heartbeats.
    pub session_bound: TimeDelta,
    /// How far an event may run behind the newest event seen in the pass.
    pub max_reorder: TimeDelta,
}

impl ClassifierConfig {
    pub const fn new(primary_bucket: BucketId, unlock_bucket: BucketId) -> Self {
        Self {
            primary_bucket,
            unlock_bucket,
            session_bound: DEFAULT_SESSION_BOUND,
            max_reorder: DEFAULT_MAX_REORDER,
        }
    }
}

/// Per-pass classification state.
#[derive(Debug)]
pub struct Classifier<'a> {
    config: &'a ClassifierConfig,
    cursor: Option<DateTime<Utc>>,
    include_class_names: bool,
    newest_seen: Option<DateTime<Utc>>,
}

impl<'a> Classifier<'a> {
    pub const fn new(
        config: &'a ClassifierConfig,
        cursor: Option<DateTime<Utc>>,
        include_class_names: bool,
    ) -> Self {
        Self {
            config,
            cursor,
            include_class_names,
            newest_seen: None,
        }
    }

    /// Classifies one event.
    ///
    /// Returns `Ok(None)` for event kinds that produce no heartbeat.
    pub fn classify(&mut self, event: &RawLifecycleEvent) -> Result<Option<Heartbeat>, SyncError> {
        if let LifecycleKind::Other(kind) = &event.kind {
            tracing::debug!(kind = %kind, timestamp = %event.timestamp, "ignoring lifecycle event");
            return Ok(None);
        }

        let heartbeat = match event.kind {
            LifecycleKind::AppForegroundEntered => Heartbeat::new(
                self.config.primary_bucket.clone(),
                event.timestamp,
                ENTER_DURATION,
                self.activity_payload(event)?,
                ENTER_DURATION,
            ),
            LifecycleKind::AppForegroundExited => Heartbeat::new(
                self.config.primary_bucket.clone(),
                event.timestamp,
                self.config.session_bound,
                self.activity_payload(event)?,
                self.config.session_bound,
            ),
            LifecycleKind::ScreenUnlocked => Heartbeat::new(
                self.config.unlock_bucket.clone(),
                event.timestamp,
                TimeDelta::zero(),
                Payload::new(),
                TimeDelta::zero(),
            ),
            LifecycleKind::Other(_) => return Ok(None),
        }
        .map_err(|err| malformed(event, err.to_string()))?;

        self.check_order(event)?;
        // Only accepted events move the reorder watermark.
        if self.newest_seen.is_none_or(|newest| event.timestamp > newest) {
            self.newest_seen = Some(event.timestamp);
        }

        Ok(Some(heartbeat))
    }

    fn check_order(&self, event: &RawLifecycleEvent) -> Result<(), SyncError> {
        if let Some(cursor) = self.cursor.filter(|cursor| event.timestamp < *cursor) {
            return Err(malformed(event, format!("precedes cursor {cursor}")));
        }
        if let Some(newest) = self
            .newest_seen
            .filter(|newest| event.timestamp < *newest - self.config.max_reorder)
        {
            return Err(malformed(
                event,
                format!("runs backwards from {newest} beyond the reorder tolerance"),
            ));
        }
        Ok(())
    }

    fn activity_payload(&self, event: &RawLifecycleEvent) -> Result<Payload, SyncError> {
        let subject =
            SubjectId::new(event.subject.as_str()).map_err(|err| malformed(event, err.to_string()))?;

        let app = event
            .label
            .as_deref()
            .filter(|label| !label.trim().is_empty())
            .unwrap_or(subject.as_str());

        let mut data = Payload::new();
        data.insert("app".to_string(), Value::from(app));
        data.insert("package".to_string(), Value::from(subject.as_str()));
        let class_name = event
            .class_name
            .as_deref()
            .filter(|class_name| self.include_class_names && !class_name.is_empty());
        if let Some(class_name) = class_name {
            data.insert("classname".to_string(), Value::from(class_name));
        }
        Ok(data)
    }
}

fn malformed(event: &RawLifecycleEvent, reason: String) -> SyncError {
    SyncError::MalformedEvent {
        kind: event.kind.to_string(),
        timestamp: event.timestamp,
        reason,
    }
}
