//! Smoke tests for the courtside CLI
//!
//! None of these reach the browser: each run stops at argument or
//! configuration validation.

#![allow(deprecated)] // Command::cargo_bin
#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Command for the courtside binary with a clean credential environment
fn courtside() -> Command {
    let mut cmd = Command::cargo_bin("courtside").expect("courtside binary should exist");
    for var in [
        "ESC_USERNAME",
        "ESC_PASSWORD",
        "ESC_ADDITIONAL_PLAYER",
        "ESC_MEMBER_NAME",
        "INPUT_DAYS_AHEAD",
        "COURTSIDE_PROFILE",
        "RUST_LOG",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn test_version_flag() {
    courtside()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("0.4.0"));
}

#[test]
fn test_help_lists_booking_flags() {
    courtside()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--days-ahead"))
        .stdout(predicate::str::contains("--player"))
        .stdout(predicate::str::contains("--dry-run"))
        .stdout(predicate::str::contains("ESC_USERNAME"));
}

#[test]
fn test_missing_credentials_exit_1() {
    courtside()
        .assert()
        .code(1)
        .stderr(predicate::str::contains("ESC_USERNAME"));
}

#[test]
fn test_password_never_echoed() {
    courtside()
        .env("ESC_USERNAME", "member@club.test")
        .env("ESC_PASSWORD", "hunter2")
        .args(["--time", "teatime"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("teatime"))
        .stderr(predicate::str::contains("hunter2").not());
}

#[test]
fn test_bad_profile_is_configuration_error() {
    let dir = TempDir::new().unwrap();
    let profile = dir.path().join("club.yaml");
    fs::write(&profile, "schedule:\n  no_such_field: true\n").unwrap();

    courtside()
        .env("ESC_USERNAME", "member@club.test")
        .env("ESC_PASSWORD", "hunter2")
        .arg("--profile")
        .arg(&profile)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Configuration error"));
}

#[test]
fn test_json_output_reports_failure_kind() {
    courtside()
        .args(["--output", "json", "--time", "noon-ish"])
        .env("ESC_USERNAME", "member@club.test")
        .env("ESC_PASSWORD", "hunter2")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("\"status\": \"failed\""))
        .stdout(predicate::str::contains("\"kind\": \"internal\""));
}

#[test]
fn test_huge_wait_timeout_rejected() {
    courtside()
        .env("ESC_USERNAME", "member@club.test")
        .env("ESC_PASSWORD", "hunter2")
        .args(["--wait-timeout", "18446744073709551615"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--wait-timeout"));
}

#[test]
fn test_unknown_flag_rejected() {
    courtside()
        .arg("--court-number")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unexpected argument"));
}
