//! Status command for showing buckets and their latest heartbeat.

use std::io::Write;

use anyhow::{Context, Result};

use hs_db::Database;

use crate::Config;

pub fn run<W: Write>(writer: &mut W, config: &Config) -> Result<()> {
    let db = Database::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))?;
    let summaries = db.bucket_summaries()?;

    writeln!(writer, "Heartsync status")?;
    writeln!(writer, "Database: {}", config.database_path.display())?;
    writeln!(writer, "Raw events: {}", db.raw_event_count()?)?;

    if summaries.is_empty() {
        writeln!(writer, "No buckets yet. Run `hs sync` to create them.")?;
        return Ok(());
    }

    writeln!(writer, "Buckets:")?;
    for summary in summaries {
        write!(
            writer,
            "- {} ({}): {} event(s)",
            summary.bucket_id, summary.kind, summary.event_count
        )?;
        match summary.latest {
            Some(latest) => writeln!(writer, ", latest {latest}")?,
            None => writeln!(writer)?,
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{DateTime, TimeDelta, Utc};
    use hs_core::{Bucket, BucketId, EventStore, Heartbeat, Payload};

    use insta::assert_snapshot;

    fn config_for(temp: &tempfile::TempDir) -> Config {
        Config {
            database_path: temp.path().join("heartsync.db"),
            ..Config::default()
        }
    }

    fn render(config: &Config) -> String {
        let mut output = Vec::new();
        run(&mut output, config).unwrap();
        let output = String::from_utf8(output).unwrap();
        output.replace(
            &config.database_path.display().to_string(),
            "[TEMP]/heartsync.db",
        )
    }

    #[test]
    fn status_command_outputs_bucket_summaries() {
        let temp = tempfile::tempdir().unwrap();
        let config = config_for(&temp);
        let mut db = Database::open(&config.database_path).unwrap();

        let primary = BucketId::new("primary").unwrap();
        db.create_bucket_if_absent(&Bucket::new(primary.clone(), "currentwindow", "h", "c"))
            .unwrap();
        db.create_bucket_if_absent(&Bucket::new(
            BucketId::new("unlock").unwrap(),
            "os.lockscreen.unlocks",
            "h",
            "c",
        ))
        .unwrap();
        for at in ["2025-01-01T09:00:00Z", "2025-01-01T11:00:00Z"] {
            let heartbeat = Heartbeat::new(
                primary.clone(),
                DateTime::parse_from_rfc3339(at).unwrap().with_timezone(&Utc),
                TimeDelta::seconds(1),
                Payload::new(),
                TimeDelta::seconds(1),
            )
            .unwrap();
            db.submit_heartbeat(&heartbeat).unwrap();
        }

        assert_snapshot!(render(&config), @r"
        Heartsync status
        Database: [TEMP]/heartsync.db
        Raw events: 0
        Buckets:
        - primary (currentwindow): 2 event(s), latest 2025-01-01T11:00:00.000Z
        - unlock (os.lockscreen.unlocks): 0 event(s)
        ");
    }

    #[test]
    fn status_command_without_buckets() {
        let temp = tempfile::tempdir().unwrap();
        let config = config_for(&temp);

        assert_snapshot!(render(&config), @r"
        Heartsync status
        Database: [TEMP]/heartsync.db
        Raw events: 0
        No buckets yet. Run `hs sync` to create them.
        ");
    }
}
