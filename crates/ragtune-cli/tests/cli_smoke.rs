//! End-to-end smoke tests driving the compiled `ragtune` binary.

#![cfg(test)]

use assert_cmd::Command;
use predicates::str::contains;
use tempfile::tempdir;

#[test]
fn init_then_validate_then_run_round_trips_through_the_binary() {
    let dir = tempdir().expect("tempdir");
    let config_path = dir.path().join("ragtune.yaml");

    Command::cargo_bin("ragtune")
        .expect("ragtune bin")
        .arg("init")
        .arg(dir.path())
        .arg("--output")
        .arg(&config_path)
        .assert()
        .success();

    Command::cargo_bin("ragtune")
        .expect("ragtune bin")
        .arg("validate")
        .arg(&config_path)
        .assert()
        .success()
        .stdout(contains("valid"));

    Command::cargo_bin("ragtune")
        .expect("ragtune bin")
        .arg("run")
        .arg("--config")
        .arg(&config_path)
        .arg("hello world")
        .assert()
        .success();
}

#[test]
fn validate_reports_a_missing_retriever_as_a_nonzero_exit_not_a_panic() {
    let dir = tempdir().expect("tempdir");
    let config_path = dir.path().join("broken.yaml");
    std::fs::write(&config_path, "name: demo\n").unwrap();

    Command::cargo_bin("ragtune")
        .expect("ragtune bin")
        .arg("validate")
        .arg(&config_path)
        .assert()
        .failure()
        .stderr(contains("retriever"));
}

#[test]
fn list_without_a_config_prints_every_registered_category() {
    Command::cargo_bin("ragtune")
        .expect("ragtune bin")
        .arg("list")
        .assert()
        .success()
        .stdout(contains("retriever"))
        .stdout(contains("scheduler"));
}
