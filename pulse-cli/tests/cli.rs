//! Command-line tests for the pulse binary.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

fn pulse() -> Command {
    let mut cmd = Command::cargo_bin("pulse").unwrap();
    cmd.env_remove("PULSE_LOG").env_remove("RUST_LOG");
    cmd
}

#[test]
fn help_lists_commands() {
    pulse()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("probe"))
        .stdout(predicate::str::contains("track"))
        .stdout(predicate::str::contains("profile"))
        .stdout(predicate::str::contains("encrypt"));
}

#[test]
fn encrypt_prints_collector_envelope() {
    let dir = tempdir().unwrap();
    pulse()
        .current_dir(dir.path())
        .args(["encrypt", r#"{"test":"data"}"#])
        .assert()
        .success()
        .stdout("AAAAAAAAAAAAAAAAAAAAABRYGN/7IvcxRmptUQTIMfg=\n");
}

#[test]
fn status_shows_configured_collector() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("pulse.toml");
    std::fs::write(
        &config,
        "[collector]\nhost = \"collector.example.com\"\nuse_https = true\nidentity = \"user-1\"\n",
    )
    .unwrap();

    pulse()
        .arg("--config")
        .arg(&config)
        .arg("--data-dir")
        .arg(dir.path().join("data"))
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("https://collector.example.com/v1"))
        .stdout(predicate::str::contains("user-1"))
        .stdout(predicate::str::contains("not recorded"));
}

#[test]
fn invalid_config_is_reported() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("pulse.toml");
    std::fs::write(&config, "[queue]\nmax_events = 0\n").unwrap();

    pulse()
        .arg("--config")
        .arg(&config)
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("max_events"));
}

#[test]
fn track_requires_identity() {
    let dir = tempdir().unwrap();
    pulse()
        .current_dir(dir.path())
        .arg("--data-dir")
        .arg(dir.path().join("data"))
        .args(["track", "purchase", "--param", "price=9.99"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No user identity"));
}

#[test]
fn track_rejects_malformed_param() {
    let dir = tempdir().unwrap();
    pulse()
        .current_dir(dir.path())
        .args(["track", "purchase", "--identity", "u", "--param", "oops"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("expected key=value"));
}

#[test]
fn probe_unreachable_host_fails() {
    let dir = tempdir().unwrap();
    pulse()
        .current_dir(dir.path())
        .args(["probe", "--host", "127.0.0.1:1"])
        .assert()
        .failure();
}
