//! Heartbeats, buckets, and the stored events heartbeats merge into.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::{BucketId, ValidationError};

/// Key/value payload attached to a heartbeat.
///
/// Two heartbeats only merge when their payloads compare equal.
pub type Payload = Map<String, Value>;

/// A named, typed container of heartbeats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    pub id: BucketId,
    #[serde(rename = "type")]
    pub kind: String,
    pub hostname: String,
    pub client: String,
}

impl Bucket {
    pub fn new(
        id: BucketId,
        kind: impl Into<String>,
        hostname: impl Into<String>,
        client: impl Into<String>,
    ) -> Self {
        Self {
            id,
            kind: kind.into(),
            hostname: hostname.into(),
            client: client.into(),
        }
    }
}

/// A timestamped activity sample with a merge tolerance.
///
/// Reads as "this subject was active for `duration` starting at `timestamp`".
#[derive(Debug, Clone, PartialEq)]
pub struct Heartbeat {
    pub bucket_id: BucketId,
    pub timestamp: DateTime<Utc>,
    pub duration: TimeDelta,
    pub data: Payload,
    pub pulsetime: TimeDelta,
}

impl Heartbeat {
    /// Creates a heartbeat, rejecting negative durations or pulsetimes.
    pub fn new(
        bucket_id: BucketId,
        timestamp: DateTime<Utc>,
        duration: TimeDelta,
        data: Payload,
        pulsetime: TimeDelta,
    ) -> Result<Self, ValidationError> {
        if duration < TimeDelta::zero() {
            return Err(ValidationError::NegativeDuration {
                field: "duration",
                millis: duration.num_milliseconds(),
            });
        }
        if pulsetime < TimeDelta::zero() {
            return Err(ValidationError::NegativeDuration {
                field: "pulsetime",
                millis: pulsetime.num_milliseconds(),
            });
        }
        Ok(Self {
            bucket_id,
            timestamp,
            duration,
            data,
            pulsetime,
        })
    }

    /// End of the interval this heartbeat covers.
    pub fn end(&self) -> DateTime<Utc> {
        self.timestamp + self.duration
    }
}

/// An event as persisted in a bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEvent {
    /// Store-assigned row identifier, absent until persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub timestamp: DateTime<Utc>,
    #[serde(with = "duration_secs")]
    pub duration: TimeDelta,
    pub data: Payload,
}

impl StoredEvent {
    pub fn end(&self) -> DateTime<Utc> {
        self.timestamp + self.duration
    }

    /// Whether this event already records `heartbeat`: same payload, and the
    /// heartbeat's interval lies within this event's interval.
    pub fn covers(&self, heartbeat: &Heartbeat) -> bool {
        self.data == heartbeat.data
            && self.timestamp <= heartbeat.timestamp
            && heartbeat.end() <= self.end()
    }
}

impl From<&Heartbeat> for StoredEvent {
    fn from(heartbeat: &Heartbeat) -> Self {
        Self {
            id: None,
            timestamp: heartbeat.timestamp,
            duration: heartbeat.duration,
            data: heartbeat.data.clone(),
        }
    }
}

/// Converts a duration to fractional seconds.
#[expect(
    clippy::cast_precision_loss,
    reason = "millisecond counts stay far below 2^52"
)]
pub fn to_secs_f64(duration: TimeDelta) -> f64 {
    duration.num_milliseconds() as f64 / 1000.0
}

/// Converts fractional seconds to a duration, rounding to milliseconds.
#[expect(
    clippy::cast_possible_truncation,
    reason = "stored durations are bounded by the session bound"
)]
pub fn from_secs_f64(secs: f64) -> TimeDelta {
    TimeDelta::milliseconds((secs * 1000.0).round() as i64)
}

/// Serde support for durations as fractional seconds.
mod duration_secs {
    use chrono::TimeDelta;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(duration: &TimeDelta, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        super::to_secs_f64(*duration).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<TimeDelta, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Ok(super::from_secs_f64(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn heartbeat_rejects_negative_duration() {
        let err = Heartbeat::new(
            BucketId::new("b").unwrap(),
            ts("2025-01-01T00:00:00Z"),
            TimeDelta::seconds(-1),
            Payload::new(),
            TimeDelta::zero(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ValidationError::NegativeDuration {
                field: "duration",
                millis: -1000
            }
        );
    }

    #[test]
    fn heartbeat_end_adds_duration() {
        let hb = Heartbeat::new(
            BucketId::new("b").unwrap(),
            ts("2025-01-01T00:00:00Z"),
            TimeDelta::seconds(5),
            Payload::new(),
            TimeDelta::seconds(1),
        )
        .unwrap();
        assert_eq!(hb.end(), ts("2025-01-01T00:00:05Z"));
    }

    #[test]
    fn stored_event_serializes_duration_as_seconds() {
        let event = StoredEvent {
            id: None,
            timestamp: ts("2025-01-01T00:00:00Z"),
            duration: TimeDelta::milliseconds(1500),
            data: Payload::new(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["duration"], serde_json::json!(1.5));
        assert!(json.get("id").is_none());
    }

    #[test]
    fn stored_event_covers_contained_intervals_with_equal_payload() {
        let mut data = Payload::new();
        data.insert("app".to_string(), Value::from("mail"));
        let event = StoredEvent {
            id: Some(1),
            timestamp: ts("2025-01-01T00:00:00Z"),
            duration: TimeDelta::seconds(10),
            data: data.clone(),
        };
        let heartbeat = |at: &str, secs, data: Payload| {
            Heartbeat::new(
                BucketId::new("b").unwrap(),
                ts(at),
                TimeDelta::seconds(secs),
                data,
                TimeDelta::zero(),
            )
            .unwrap()
        };

        assert!(event.covers(&heartbeat("2025-01-01T00:00:00Z", 10, data.clone())));
        assert!(event.covers(&heartbeat("2025-01-01T00:00:04Z", 1, data.clone())));
        assert!(!event.covers(&heartbeat("2025-01-01T00:00:09Z", 2, data.clone())));
        assert!(!event.covers(&heartbeat("2024-12-31T23:59:59Z", 1, data)));
        assert!(!event.covers(&heartbeat("2025-01-01T00:00:04Z", 1, Payload::new())));
    }

    #[test]
    fn seconds_conversion_rounds_to_millis() {
        assert_eq!(from_secs_f64(0.0015), TimeDelta::milliseconds(2));
        assert_eq!(from_secs_f64(86_400.0), TimeDelta::hours(24));
    }
}
