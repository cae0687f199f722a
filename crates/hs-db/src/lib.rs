//! SQLite storage for heartsync.
//!
//! One database file holds both ends of a sync pass: the delivery-ordered raw
//! lifecycle log the engine reads from, and the bucketed heartbeat store it
//! writes to. [`Database`] implements [`RawEventSource`] and [`EventStore`], so
//! the CLI opens two connections to the same file and hands one to each side of
//! the engine.
//!
//! # Thread Safety
//!
//! [`Database`] wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! A `Database` can be moved onto the sync worker thread but not shared across
//! threads without external synchronization.
//!
//! # Schema
//!
//! ## Timestamp Format
//!
//! Timestamps are stored as TEXT in RFC 3339 with millisecond precision and a `Z`
//! suffix (e.g., `2025-01-15T10:30:00.000Z`). Every write goes through
//! [`format_timestamp`], so lexicographic ordering matches chronological ordering
//! and equality checks on the column are exact.
//!
//! ## Durations
//!
//! Heartbeat durations are stored as integer milliseconds in `duration_ms`.
//!
//! ## Payloads
//!
//! The `data` column holds the heartbeat payload as a JSON object. Payload keys
//! serialize in sorted order, so identical payloads produce identical text.

use std::path::Path;

use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use hs_core::{
    Bucket, BucketId, EventStore, Heartbeat, HeartbeatOutcome, LatestEvent, LifecycleKind,
    MergePolicy, Payload, PulseMergePolicy, RawEventSource, RawLifecycleEvent, StoredEvent,
    ValidationError,
};
use rusqlite::{Connection, OptionalExtension, Row, params};
use thiserror::Error;

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A stored timestamp is not valid RFC 3339.
    #[error("invalid stored timestamp: {timestamp}")]
    TimestampParse {
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },
    /// A stored payload is not a JSON object.
    #[error("invalid payload for event {event_id}: {source}")]
    InvalidPayload {
        event_id: i64,
        #[source]
        source: serde_json::Error,
    },
    /// A payload could not be serialized.
    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
    /// A stored identifier failed validation.
    #[error("invalid stored identifier: {0}")]
    Validation(#[from] ValidationError),
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

/// Per-bucket totals for status reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketSummary {
    pub bucket_id: String,
    pub kind: String,
    pub event_count: u64,
    pub latest: Option<String>,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn
            .execute_batch("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")?;
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS buckets (
                id TEXT PRIMARY KEY,
                type TEXT NOT NULL,
                hostname TEXT NOT NULL,
                client TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            -- Heartbeat events after merging
            -- timestamp: RFC 3339 millis (e.g., '2025-01-15T10:30:00.000Z')
            -- data: JSON object payload
            CREATE TABLE IF NOT EXISTS events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                bucket_id TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                duration_ms INTEGER NOT NULL,
                data TEXT NOT NULL,
                FOREIGN KEY (bucket_id) REFERENCES buckets(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_events_bucket_timestamp
                ON events(bucket_id, timestamp);

            -- Raw lifecycle events in delivery order
            CREATE TABLE IF NOT EXISTS raw_events (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                type TEXT NOT NULL,
                subject TEXT NOT NULL,
                class_name TEXT,
                label TEXT,
                timestamp TEXT NOT NULL,
                UNIQUE (type, subject, timestamp)
            );

            CREATE INDEX IF NOT EXISTS idx_raw_events_timestamp ON raw_events(timestamp);
            ",
        )?;
        Ok(())
    }

    /// Appends raw lifecycle events in the given order, ignoring events already logged.
    pub fn insert_raw_events(&mut self, events: &[RawLifecycleEvent]) -> Result<usize, DbError> {
        if events.is_empty() {
            return Ok(0);
        }
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "
                INSERT OR IGNORE INTO raw_events (type, subject, class_name, label, timestamp)
                VALUES (?, ?, ?, ?, ?)
                ",
            )?;
            for event in events {
                inserted += stmt.execute(params![
                    event.kind.as_str(),
                    event.subject,
                    event.class_name,
                    event.label,
                    format_timestamp(event.timestamp),
                ])?;
            }
        }
        tx.commit()?;
        tracing::debug!(inserted, total = events.len(), "stored raw events");
        Ok(inserted)
    }

    /// Lists a bucket's events ordered by timestamp.
    ///
    /// `since` keeps events starting at or after it; `limit` caps the row count.
    pub fn list_events(
        &self,
        bucket_id: &BucketId,
        since: Option<DateTime<Utc>>,
        limit: Option<usize>,
    ) -> Result<Vec<StoredEvent>, DbError> {
        let since = since.map(format_timestamp);
        let limit = limit.map_or(-1, |limit| i64::try_from(limit).unwrap_or(i64::MAX));
        let mut stmt = self.conn.prepare(
            "
            SELECT id, timestamp, duration_ms, data
            FROM events
            WHERE bucket_id = ?1 AND (?2 IS NULL OR timestamp >= ?2)
            ORDER BY timestamp ASC, id ASC
            LIMIT ?3
            ",
        )?;
        let rows = stmt.query_map(params![bucket_id.as_str(), since, limit], StoredRow::from_row)?;
        let mut events = Vec::new();
        for row in rows {
            events.push(row?.into_event()?);
        }
        Ok(events)
    }

    /// Returns event counts and latest timestamps per bucket, ordered by bucket ID.
    pub fn bucket_summaries(&self) -> Result<Vec<BucketSummary>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT b.id, b.type, COUNT(e.id), MAX(e.timestamp)
            FROM buckets b
            LEFT JOIN events e ON e.bucket_id = b.id
            GROUP BY b.id, b.type
            ORDER BY b.id ASC
            ",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(BucketSummary {
                bucket_id: row.get(0)?,
                kind: row.get(1)?,
                event_count: row.get(2)?,
                latest: row.get(3)?,
            })
        })?;
        let mut summaries = Vec::new();
        for row in rows {
            summaries.push(row?);
        }
        Ok(summaries)
    }

    /// Number of raw lifecycle events logged.
    pub fn raw_event_count(&self) -> Result<u64, DbError> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM raw_events", [], |row| row.get(0))?;
        Ok(count)
    }
}

impl EventStore for Database {
    type Error = DbError;

    fn create_bucket_if_absent(&mut self, bucket: &Bucket) -> Result<bool, DbError> {
        let created = self.conn.execute(
            "
            INSERT OR IGNORE INTO buckets (id, type, hostname, client, created_at)
            VALUES (?, ?, ?, ?, ?)
            ",
            params![
                bucket.id.as_str(),
                bucket.kind,
                bucket.hostname,
                bucket.client,
                format_timestamp(Utc::now()),
            ],
        )?;
        Ok(created > 0)
    }

    fn query_latest_events(
        &self,
        bucket_id: &BucketId,
        limit: usize,
    ) -> Result<Vec<LatestEvent>, DbError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = self.conn.prepare(
            "
            SELECT timestamp
            FROM events
            WHERE bucket_id = ?
            ORDER BY timestamp DESC, id DESC
            LIMIT ?
            ",
        )?;
        let rows = stmt.query_map(params![bucket_id.as_str(), limit], |row| {
            Ok(LatestEvent {
                timestamp: row.get(0)?,
            })
        })?;
        let mut latest = Vec::new();
        for row in rows {
            latest.push(row?);
        }
        Ok(latest)
    }

    fn submit_heartbeat(&mut self, heartbeat: &Heartbeat) -> Result<HeartbeatOutcome, DbError> {
        let tx = self.conn.transaction()?;
        let outcome = submit_in(&tx, heartbeat)?;
        tx.commit()?;
        Ok(outcome)
    }
}

impl RawEventSource for Database {
    type Error = DbError;

    fn query_events(
        &mut self,
        from: DateTime<Utc>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<RawLifecycleEvent>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT type, subject, class_name, label, timestamp
            FROM raw_events
            WHERE timestamp >= ?1 AND (?2 IS NULL OR timestamp < ?2)
            ORDER BY seq ASC
            ",
        )?;
        let rows = stmt.query_map(
            params![format_timestamp(from), to.map(format_timestamp)],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, String>(4)?,
                ))
            },
        )?;
        let mut events = Vec::new();
        for row in rows {
            let (kind, subject, class_name, label, timestamp) = row?;
            events.push(RawLifecycleEvent {
                kind: LifecycleKind::from(kind.as_str()),
                subject,
                class_name,
                label,
                timestamp: parse_timestamp(&timestamp)?,
            });
        }
        Ok(events)
    }
}

fn submit_in(conn: &Connection, heartbeat: &Heartbeat) -> Result<HeartbeatOutcome, DbError> {
    let bucket_id = heartbeat.bucket_id.as_str();
    let last = conn
        .query_row(
            "
            SELECT id, timestamp, duration_ms, data
            FROM events
            WHERE bucket_id = ?
            ORDER BY timestamp DESC, id DESC
            LIMIT 1
            ",
            [bucket_id],
            StoredRow::from_row,
        )
        .optional()?
        .map(StoredRow::into_event)
        .transpose()?;

    if let Some(merged) = last
        .as_ref()
        .and_then(|last| PulseMergePolicy.merge(last, heartbeat))
    {
        conn.execute(
            "UPDATE events SET timestamp = ?, duration_ms = ?, data = ? WHERE id = ?",
            params![
                format_timestamp(merged.timestamp),
                merged.duration.num_milliseconds(),
                serde_json::to_string(&merged.data)?,
                merged.id,
            ],
        )?;
        return Ok(HeartbeatOutcome::Merged);
    }

    let timestamp = format_timestamp(heartbeat.timestamp);
    let duration_ms = heartbeat.duration.num_milliseconds();
    let data = serde_json::to_string(&heartbeat.data)?;
    if covered_in(conn, heartbeat, &timestamp, &data)? {
        return Ok(HeartbeatOutcome::Duplicate);
    }

    conn.execute(
        "INSERT INTO events (bucket_id, timestamp, duration_ms, data) VALUES (?, ?, ?, ?)",
        params![bucket_id, timestamp, duration_ms, data],
    )?;
    Ok(HeartbeatOutcome::Inserted)
}

/// Whether an event with the same payload already spans the heartbeat.
fn covered_in(
    conn: &Connection,
    heartbeat: &Heartbeat,
    timestamp: &str,
    data: &str,
) -> Result<bool, DbError> {
    let mut stmt = conn.prepare(
        "
        SELECT id, timestamp, duration_ms, data
        FROM events
        WHERE bucket_id = ? AND data = ? AND timestamp <= ?
        ORDER BY timestamp DESC, id DESC
        ",
    )?;
    let rows = stmt.query_map(
        params![heartbeat.bucket_id.as_str(), data, timestamp],
        StoredRow::from_row,
    )?;
    for row in rows {
        if row?.into_event()?.covers(heartbeat) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// An `events` row before parsing.
struct StoredRow {
    id: i64,
    timestamp: String,
    duration_ms: i64,
    data: String,
}

impl StoredRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            timestamp: row.get(1)?,
            duration_ms: row.get(2)?,
            data: row.get(3)?,
        })
    }

    fn into_event(self) -> Result<StoredEvent, DbError> {
        let data: Payload =
            serde_json::from_str(&self.data).map_err(|source| DbError::InvalidPayload {
                event_id: self.id,
                source,
            })?;
        Ok(StoredEvent {
            id: Some(self.id),
            timestamp: parse_timestamp(&self.timestamp)?,
            duration: TimeDelta::milliseconds(self.duration_ms),
            data,
        })
    }
}

/// Parses a stored timestamp.
pub fn parse_timestamp(timestamp: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| DbError::TimestampParse {
            timestamp: timestamp.to_string(),
            source,
        })
}

/// Formats a timestamp the way every column stores it.
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}
