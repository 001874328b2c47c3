//! Integration tests for the awaitkit CLI
//!
//! These tests run the actual binary and verify its output.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Get the binary to test
fn awaitkit_cmd() -> Command {
    let mut cmd = Command::cargo_bin("awaitkit").unwrap();
    cmd.env_remove("AWAITKIT_POLL_INTERVAL_MS")
        .env_remove("AWAITKIT_RETRY_DELAY_MS")
        .env_remove("AWAITKIT_TTL_MS")
        .env_remove("AWAITKIT_BACKOFF_BASE_MS")
        .env_remove("AWAITKIT_BACKOFF_MAX_EXPONENT");
    cmd
}

#[test]
fn test_help_flag() {
    awaitkit_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("bounded waiting on concurrent work"))
        .stdout(predicate::str::contains("aggregate"))
        .stdout(predicate::str::contains("refresh"));
}

#[test]
fn test_aggregate_help() {
    awaitkit_cmd()
        .args(["aggregate", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--deadline-ms"))
        .stdout(predicate::str::contains("--runtime"));
}

// ============================================================================
// aggregate
// ============================================================================

#[test]
fn test_aggregate_all_succeed() {
    awaitkit_cmd()
        .args(["aggregate", "--jobs", "3", "--step-ms", "5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("job-1 = 10"))
        .stdout(predicate::str::contains("job-3 = 30"))
        .stdout(predicate::str::contains("successes=3, failures=0, timeouts=0"));
}

#[test]
fn test_aggregate_mixed_outcomes_json() {
    let output = awaitkit_cmd()
        .args([
            "aggregate",
            "--jobs",
            "3",
            "--fail-every",
            "2",
            "--hang",
            "1",
            "--deadline-ms",
            "150",
            "--json",
        ])
        .output()
        .unwrap();
    assert!(output.status.success());

    let doc: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(doc["summary"]["successes"], 1);
    assert_eq!(doc["summary"]["failures"], 1);
    assert_eq!(doc["summary"]["timeouts"], 1);
    assert_eq!(doc["successes"]["job-1"], 10);
    assert_eq!(doc["failures"]["job-2"], "job-2 failed");
    assert_eq!(doc["timeouts"][0], "job-3");
}

#[test]
fn test_aggregate_on_tokio_runtime() {
    awaitkit_cmd()
        .args(["aggregate", "--jobs", "4", "--runtime", "tokio", "--hang", "1", "--deadline-ms", "200"])
        .assert()
        .success()
        .stdout(predicate::str::contains("job-4 timed out"))
        .stdout(predicate::str::contains("successes=3"));
}

#[test]
fn test_aggregate_limit_abandons() {
    awaitkit_cmd()
        .args(["aggregate", "--jobs", "3", "--hang", "2", "--limit", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("abandoned=2"));
}

// ============================================================================
// refresh
// ============================================================================

#[test]
fn test_refresh_inline_caches() {
    awaitkit_cmd()
        .args(["refresh", "--reads", "3", "--ttl-ms", "60000"])
        .assert()
        .success()
        .stdout(predicate::str::contains("read 3: 1"))
        .stdout(predicate::str::contains("1 refresh call(s)"));
}

#[test]
fn test_refresh_background_reports_failure() {
    awaitkit_cmd()
        .args(["refresh", "--background", "--reads", "1", "--fail-every", "1"])
        .env("AWAITKIT_BACKOFF_BASE_MS", "1")
        .assert()
        .success()
        .stdout(predicate::str::contains("AWAIT-010"));
}

// ============================================================================
// config
// ============================================================================

#[test]
fn test_config_defaults() {
    awaitkit_cmd()
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("poll_interval_ms: 10"))
        .stdout(predicate::str::contains("retry_delay_ms: 100"))
        .stdout(predicate::str::contains("ttl_ms: 60000"));
}

#[test]
fn test_config_file_and_env_override() {
    let temp_dir = TempDir::new().unwrap();
    let file = temp_dir.path().join("awaitkit.yaml");
    fs::write(
        &file,
        "aggregate:\n  poll_interval_ms: 25\nrefresh:\n  ttl_ms: 500\n",
    )
    .unwrap();

    awaitkit_cmd()
        .args(["config", "--config", file.to_str().unwrap()])
        .env("AWAITKIT_TTL_MS", "750")
        .assert()
        .success()
        .stdout(predicate::str::contains("poll_interval_ms: 25"))
        .stdout(predicate::str::contains("ttl_ms: 750"));
}

#[test]
fn test_config_invalid_yaml() {
    let temp_dir = TempDir::new().unwrap();
    let file = temp_dir.path().join("broken.yaml");
    fs::write(&file, "aggregate: [unclosed\n").unwrap();

    awaitkit_cmd()
        .args(["--config", file.to_str().unwrap(), "config"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("AWAIT-031"))
        .stderr(predicate::str::contains("Fix:"));
}

#[test]
fn test_config_rejects_bad_env() {
    awaitkit_cmd()
        .arg("config")
        .env("AWAITKIT_POLL_INTERVAL_MS", "soon")
        .assert()
        .failure()
        .stderr(predicate::str::contains("AWAIT-030"));
}

#[test]
fn test_missing_config_file() {
    awaitkit_cmd()
        .args(["config", "--config", "/nonexistent/awaitkit.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("AWAIT-030"));
}
