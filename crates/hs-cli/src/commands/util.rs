//! Shared utilities for CLI commands.

use std::sync::LazyLock;

use anyhow::Context;
use chrono::{DateTime, TimeDelta, Utc};
use regex::Regex;

static RELATIVE_TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)\s*(second|minute|hour|day|week)s?\s+ago$")
        .expect("relative time pattern is valid")
});

/// Largest relative offset accepted, in seconds (~100 years).
const MAX_RELATIVE_SECS: i64 = 100 * 365 * 24 * 60 * 60;

/// Parses an instant given as RFC 3339 or as "N <unit>s ago".
///
/// Units: second, minute, hour, day, week.
pub fn parse_datetime(s: &str) -> anyhow::Result<DateTime<Utc>> {
    parse_datetime_at(s, Utc::now())
}

fn parse_datetime_at(s: &str, now: DateTime<Utc>) -> anyhow::Result<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    let Some(caps) = RELATIVE_TIME_RE.captures(s) else {
        anyhow::bail!(
            "Invalid datetime: {s}. Use RFC 3339 (e.g., 2025-01-15T10:30:00Z) or relative (e.g., '2 hours ago')"
        );
    };

    let n: i64 = caps[1]
        .parse()
        .context("failed to parse number in relative time")?;
    let secs_per_unit = match &caps[2] {
        "second" => 1,
        "minute" => 60,
        "hour" => 60 * 60,
        "day" => 24 * 60 * 60,
        "week" => 7 * 24 * 60 * 60,
        unit => anyhow::bail!("Unknown time unit: {unit}"),
    };

    let secs = n
        .checked_mul(secs_per_unit)
        .filter(|secs| *secs <= MAX_RELATIVE_SECS)
        .with_context(|| format!("Relative time value too large: {s}"))?;
    Ok(now - TimeDelta::seconds(secs))
}
