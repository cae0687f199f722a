//! Events command for dumping a bucket's stored heartbeats.
//!
//! Outputs one JSON object per line, oldest first.

use std::io::Write;

use anyhow::{Context, Result};
use clap::Args;

use hs_core::BucketId;
use hs_db::Database;

use super::util::parse_datetime;

#[derive(Debug, Args)]
pub struct EventsArgs {
    /// Bucket to read.
    pub bucket: String,

    /// Only events starting at or after this time (RFC 3339 or "N hours ago").
    #[arg(long)]
    pub since: Option<String>,

    /// Maximum number of events to print.
    #[arg(long)]
    pub limit: Option<usize>,
}

pub fn run<W: Write>(writer: &mut W, db: &Database, args: &EventsArgs) -> Result<usize> {
    let bucket = BucketId::new(args.bucket.as_str()).context("invalid bucket")?;
    let since = args
        .since
        .as_deref()
        .map(parse_datetime)
        .transpose()
        .context("invalid --since")?;

    let events = db.list_events(&bucket, since, args.limit)?;
    for event in &events {
        let json = serde_json::to_string(event)?;
        writeln!(writer, "{json}")?;
    }
    Ok(events.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{DateTime, TimeDelta, Utc};
    use hs_core::{Bucket, EventStore, Heartbeat, Payload};
    use serde_json::{Value, json};

    fn seeded() -> Database {
        let mut db = Database::open_in_memory().unwrap();
        let bucket = BucketId::new("primary").unwrap();
        db.create_bucket_if_absent(&Bucket::new(bucket.clone(), "currentwindow", "h", "c"))
            .unwrap();
        for (at, app) in [("2025-01-01T09:00:00Z", "mail"), ("2025-01-01T10:00:00Z", "chat")] {
            let mut data = Payload::new();
            data.insert("app".to_string(), json!(app));
            let heartbeat = Heartbeat::new(
                bucket.clone(),
                DateTime::parse_from_rfc3339(at).unwrap().with_timezone(&Utc),
                TimeDelta::milliseconds(1500),
                data,
                TimeDelta::seconds(1),
            )
            .unwrap();
            db.submit_heartbeat(&heartbeat).unwrap();
        }
        db
    }

    #[test]
    fn prints_jsonl_with_since_filter() {
        let db = seeded();
        let args = EventsArgs {
            bucket: "primary".to_string(),
            since: Some("2025-01-01T09:30:00Z".to_string()),
            limit: None,
        };
        let mut output = Vec::new();
        assert_eq!(run(&mut output, &db, &args).unwrap(), 1);

        let output = String::from_utf8(output).unwrap();
        let lines: Vec<Value> = output
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["data"]["app"], "chat");
        assert_eq!(lines[0]["duration"], 1.5);
    }

    #[test]
    fn rejects_bad_since() {
        let db = seeded();
        let args = EventsArgs {
            bucket: "primary".to_string(),
            since: Some("last tuesday".to_string()),
            limit: None,
        };
        let err = run(&mut Vec::new(), &db, &args).unwrap_err();
        assert!(err.to_string().contains("invalid --since"));
    }
}
