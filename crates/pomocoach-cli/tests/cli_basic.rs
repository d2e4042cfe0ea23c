//! Basic CLI E2E tests.
//!
//! Tests invoke CLI commands via cargo run against a throwaway HOME and
//! verify outputs.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

/// Run a CLI command and return (stdout, stderr, exit code).
fn run_cli(home: &Path, args: &[&str], stdin: Option<&str>) -> (String, String, i32) {
    let mut child = Command::new("cargo")
        .args(["run", "-q", "-p", "pomocoach-cli", "--"])
        .args(args)
        .env("HOME", home)
        .env_remove("POMOCOACH_ENV")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to execute CLI command");

    {
        let mut pipe = child.stdin.take().expect("stdin is piped");
        if let Some(input) = stdin {
            pipe.write_all(input.as_bytes()).expect("write stdin");
        }
    }

    let output = child.wait_with_output().expect("CLI did not finish");
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

#[test]
fn test_defaults_prints_json() {
    let home = tempfile::tempdir().unwrap();
    let (stdout, _, code) = run_cli(home.path(), &["defaults"], None);
    assert_eq!(code, 0, "defaults failed");
    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(parsed["work_duration"], 25);
    assert_eq!(parsed["long_break_interval"], 4);
}

#[test]
fn test_config_set_then_get() {
    let home = tempfile::tempdir().unwrap();
    let (_, _, code) = run_cli(home.path(), &["config", "set", "defaults.work_duration", "40"], None);
    assert_eq!(code, 0, "config set failed");

    let (stdout, _, code) = run_cli(home.path(), &["config", "get", "defaults.work_duration"], None);
    assert_eq!(code, 0, "config get failed");
    assert_eq!(stdout.trim(), "40");

    let (stdout, _, _) = run_cli(home.path(), &["defaults"], None);
    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(parsed["work_duration"], 40);
}

#[test]
fn test_config_unknown_key_fails() {
    let home = tempfile::tempdir().unwrap();
    let (_, stderr, code) = run_cli(home.path(), &["config", "get", "defaults.nope"], None);
    assert_ne!(code, 0);
    assert!(stderr.contains("unknown key"));

    let (_, _, code) = run_cli(home.path(), &["config", "set", "defaults.nope", "1"], None);
    assert_ne!(code, 0);
}

#[test]
fn test_config_path_is_under_home() {
    let home = tempfile::tempdir().unwrap();
    let (stdout, _, code) = run_cli(home.path(), &["config", "path"], None);
    assert_eq!(code, 0);
    assert!(stdout.trim().ends_with("pomocoach/config.toml"));
    assert!(stdout.contains(&*home.path().to_string_lossy()));
}

#[test]
fn test_run_reports_status_and_stats() {
    let home = tempfile::tempdir().unwrap();
    let (stdout, _, code) = run_cli(
        home.path(),
        &["run", "--user", "tester", "--channel", "c1", "--no-coaching"],
        Some("status\npause\nstatus\nstop\n"),
    );
    assert_eq!(code, 0, "run failed");

    let lines: Vec<serde_json::Value> = stdout
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    let kinds: Vec<&str> = lines.iter().map(|l| l["type"].as_str().unwrap()).collect();
    assert_eq!(kinds, vec!["started", "status", "paused", "status", "stopped"]);
    assert_eq!(lines[1]["phase"], "work");
    assert_eq!(lines[2]["ok"], true);
    assert_eq!(lines[3]["is_paused"], true);
    assert_eq!(lines[4]["completed_pomodoros"], 0);
}
