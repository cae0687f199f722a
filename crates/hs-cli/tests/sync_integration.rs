//! Integration tests for the import -> sync -> status pipeline.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use tempfile::{NamedTempFile, TempDir};

const MOCK_EVENTS: &str = r#"{"type":"screen_unlocked","timestamp":"2025-01-29T11:59:58Z"}
{"type":"app_foreground_entered","subject":"org.example.mail","label":"Mail","timestamp":"2025-01-29T12:00:00Z"}
{"type":"app_foreground_exited","subject":"org.example.mail","label":"Mail","timestamp":"2025-01-29T12:00:30Z"}
{"type":"configuration_changed","subject":"org.example.mail","timestamp":"2025-01-29T12:00:31Z"}
{"type":"app_foreground_entered","subject":"org.example.chat","timestamp":"2025-01-29T12:00:32Z"}
"#;

fn hs_binary() -> &'static str {
    env!("CARGO_BIN_EXE_hs")
}

/// Writes a config pointing at a database inside `temp`.
fn write_config(temp: &TempDir) -> NamedTempFile {
    let db_path = temp.path().join("heartsync.db");
    let mut config_file = NamedTempFile::new().unwrap();
    writeln!(config_file, r#"database_path = "{}""#, db_path.display()).unwrap();
    writeln!(config_file, r#"hostname = "test-host""#).unwrap();
    config_file.flush().unwrap();
    config_file
}

fn hs(config: &Path, args: &[&str]) -> Output {
    Command::new(hs_binary())
        .arg("--config")
        .arg(config)
        .args(args)
        .output()
        .expect("failed to run hs")
}

fn import_stdin(config: &Path, input: &str) -> Output {
    let mut child = Command::new(hs_binary())
        .arg("--config")
        .arg(config)
        .arg("import")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn hs import");
    {
        let stdin = child.stdin.as_mut().unwrap();
        stdin.write_all(input.as_bytes()).unwrap();
    }
    child.wait_with_output().expect("failed to wait for hs import")
}

fn stdout(output: &Output) -> String {
    assert!(
        output.status.success(),
        "hs failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_import_then_sync_is_idempotent() {
    let temp = TempDir::new().unwrap();
    let config = write_config(&temp);

    let imported = stdout(&import_stdin(config.path(), MOCK_EVENTS));
    assert!(imported.contains("Imported 5 events"), "{imported}");

    let first = stdout(&hs(config.path(), &["sync"]));
    assert!(first.contains("Sent 3 heartbeats"), "{first}");

    let events = stdout(&hs(config.path(), &["events", "heartsync-activity"]));
    let after_first: Vec<&str> = events.lines().collect();
    assert_eq!(after_first.len(), 2, "{events}");
    assert!(after_first[0].contains(r#""app":"Mail""#), "{events}");

    // The second pass replays from the cursor and must not add events.
    stdout(&hs(config.path(), &["sync"]));
    let events_again = stdout(&hs(config.path(), &["events", "heartsync-activity"]));
    assert_eq!(events_again, events);

    let unlocks = stdout(&hs(config.path(), &["events", "heartsync-unlock"]));
    assert_eq!(unlocks.lines().count(), 1);
}

#[test]
fn test_status_lists_buckets_after_sync() {
    let temp = TempDir::new().unwrap();
    let config = write_config(&temp);

    let input = temp.path().join("events.jsonl");
    std::fs::write(&input, MOCK_EVENTS).unwrap();
    let imported = stdout(&hs(
        config.path(),
        &["import", "--file", input.to_str().unwrap()],
    ));
    assert!(imported.contains("Imported 5 events"), "{imported}");

    let before = stdout(&hs(config.path(), &["status"]));
    assert!(before.contains("No buckets yet"), "{before}");

    stdout(&hs(config.path(), &["sync"]));
    let after = stdout(&hs(config.path(), &["status"]));
    assert!(after.contains("Raw events: 5"), "{after}");
    assert!(
        after.contains("- heartsync-activity (currentwindow): 2 event(s), latest 2025-01-29T12:00:32.000Z"),
        "{after}"
    );
    assert!(
        after.contains("- heartsync-unlock (os.lockscreen.unlocks): 1 event(s)"),
        "{after}"
    );
}

#[test]
fn test_events_rejects_bad_since() {
    let temp = TempDir::new().unwrap();
    let config = write_config(&temp);

    let output = hs(
        config.path(),
        &["events", "heartsync-activity", "--since", "last tuesday"],
    );
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid --since"), "{stderr}");
}

#[test]
fn test_commands_registered() {
    let output = Command::new(hs_binary())
        .arg("--help")
        .output()
        .expect("failed to run hs --help");

    assert!(output.status.success());
    let help_text = String::from_utf8_lossy(&output.stdout);
    for command in ["import", "sync", "watch", "status", "events"] {
        assert!(
            help_text.contains(command),
            "expected '{command}' in help output: {help_text}"
        );
    }
}
