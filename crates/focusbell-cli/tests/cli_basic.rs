//! Basic CLI E2E tests.
//!
//! Each test runs the built binary against its own temporary data directory.

use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

/// Run a CLI command and return (stdout, stderr, exit code).
fn run_cli(home: &Path, args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_focusbell"))
        .args(args)
        .env("FOCUSBELL_HOME", home)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

/// Run a CLI command and expect success.
fn run_cli_success(home: &Path, args: &[&str]) -> String {
    let (stdout, stderr, code) = run_cli(home, args);
    assert_eq!(code, 0, "CLI command {args:?} failed: {stderr}");
    stdout
}

fn parse_json(json: &str) -> serde_json::Value {
    serde_json::from_str(json).expect("Failed to parse JSON output")
}

#[test]
fn test_config_get_default() {
    let home = TempDir::new().unwrap();
    let out = run_cli_success(home.path(), &["config", "get", "timer.tick_interval_ms"]);
    assert_eq!(out.trim(), "100");
    assert!(home.path().join("config.toml").exists());
}

#[test]
fn test_config_set_persists() {
    let home = TempDir::new().unwrap();
    run_cli_success(home.path(), &["config", "set", "alerts.sound_enabled", "false"]);
    let out = run_cli_success(home.path(), &["config", "get", "alerts.sound_enabled"]);
    assert_eq!(out.trim(), "false");

    run_cli_success(home.path(), &["config", "reset"]);
    let out = run_cli_success(home.path(), &["config", "get", "alerts.sound_enabled"]);
    assert_eq!(out.trim(), "true");
}

#[test]
fn test_config_unknown_key_fails() {
    let home = TempDir::new().unwrap();
    let (_, stderr, code) = run_cli(home.path(), &["config", "set", "timer.nope", "1"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("error:"));
}

#[test]
fn test_stats_today_starts_empty() {
    let home = TempDir::new().unwrap();
    let out = run_cli_success(home.path(), &["stats", "today"]);
    let today = parse_json(&out);
    assert_eq!(today["sessions"], 0);
    assert_eq!(today["work_time_seconds"], 0);
    assert!(home.path().join("work_statistics.json").exists());
}

#[test]
fn test_mode_save_list_delete() {
    let home = TempDir::new().unwrap();
    let key = run_cli_success(
        home.path(),
        &[
            "mode", "save", "Reading", "--total", "40", "--interval", "10", "--tags", "books,slow",
        ],
    );
    let key = key.trim();
    assert!(!key.is_empty());

    let list = parse_json(&run_cli_success(home.path(), &["mode", "list"]));
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["key"], key);
    assert_eq!(list[0]["name"], "Reading");
    assert_eq!(list[0]["tags"][1], "slow");

    let shown = parse_json(&run_cli_success(home.path(), &["mode", "show", "Reading"]));
    assert_eq!(shown["total_minutes"], 40);

    run_cli_success(home.path(), &["mode", "delete", key]);
    let (_, _, code) = run_cli(home.path(), &["mode", "delete", key]);
    assert_eq!(code, 1);
}

#[test]
fn test_mode_save_rejects_invalid_params() {
    let home = TempDir::new().unwrap();
    let (_, stderr, code) = run_cli(
        home.path(),
        &["mode", "save", "Broken", "--total", "0", "--interval", "5"],
    );
    assert_eq!(code, 1);
    assert!(stderr.contains("total_minutes"));
}

#[test]
fn test_mode_export_import() {
    let home = TempDir::new().unwrap();
    run_cli_success(home.path(), &["mode", "save", "Deep", "--total", "60", "--interval", "15"]);
    let bundle = home.path().join("modes.json");
    let bundle_arg = bundle.to_str().unwrap();
    run_cli_success(home.path(), &["mode", "export", bundle_arg]);

    let other = TempDir::new().unwrap();
    let summary = parse_json(&run_cli_success(other.path(), &["mode", "import", bundle_arg]));
    assert_eq!(summary["created"], 1);
    let summary = parse_json(&run_cli_success(other.path(), &["mode", "import", bundle_arg]));
    assert_eq!(summary["skipped"], 1);
}

#[test]
fn test_mode_presets() {
    let home = TempDir::new().unwrap();
    let presets = parse_json(&run_cli_success(home.path(), &["mode", "presets"]));
    let ids: Vec<&str> = presets
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, ["deep-focus", "sprint", "pomodoro"]);
    assert_eq!(presets[2]["total_minutes"], 25);
}

#[test]
fn test_timer_run_rejects_invalid_params() {
    let home = TempDir::new().unwrap();
    let (_, stderr, code) = run_cli(
        home.path(),
        &["timer", "run", "--total", "0", "--interval", "1"],
    );
    assert_eq!(code, 1);
    assert!(stderr.contains("error:"));
    let today = parse_json(&run_cli_success(home.path(), &["stats", "today"]));
    assert_eq!(today["sessions"], 0);
}

#[test]
fn test_timer_run_unknown_mode() {
    let home = TempDir::new().unwrap();
    let (_, stderr, code) = run_cli(home.path(), &["timer", "run", "custom:missing"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("not found"));
}

#[test]
fn test_completions() {
    let home = TempDir::new().unwrap();
    let out = run_cli_success(home.path(), &["completions", "bash"]);
    assert!(out.contains("focusbell"));
}
