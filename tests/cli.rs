use assert_cmd::prelude::*;
use predicates::prelude::*;
use predicates::str::contains;
use std::process::Command;

#[test]
fn cli_help_lists_demonstrations() {
    Command::cargo_bin("conclab")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("channels").and(contains("pool")));
}

#[test]
fn cli_channels_demo() {
    Command::cargo_bin("conclab")
        .unwrap()
        .arg("channels")
        .assert()
        .success()
        .stderr(contains("received values").and(contains("buffered stage output")));
}

#[test]
fn cli_pool_demo() {
    Command::cargo_bin("conclab")
        .unwrap()
        .args(&["--workers", "2", "pool"])
        .assert()
        .success()
        .stderr(contains("tasks processed"));
}

#[test]
fn cli_rejects_zero_workers() {
    Command::cargo_bin("conclab")
        .unwrap()
        .args(&["--workers", "0", "pool"])
        .assert()
        .failure()
        .stderr(contains("worker count must be at least 1"));
}

#[test]
fn server_cli_help() {
    Command::cargo_bin("conclab-server")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("--addr"));
}
