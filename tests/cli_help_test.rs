use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn test_help_lists_workflow_commands() {
    let mut cmd = Command::cargo_bin("office-hours").unwrap();

    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("submit"))
        .stdout(predicate::str::contains("decide"))
        .stdout(predicate::str::contains("follow-up"))
        .stdout(predicate::str::contains("availability"))
        .stdout(predicate::str::contains("directory"));
}

#[test]
fn test_decide_requires_outcome() {
    let mut cmd = Command::cargo_bin("office-hours").unwrap();

    cmd.args(["decide", "0b8f9b3e-6f7e-4d1a-9a57-2f0d3c1e4b5a", "--message", "ok"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--outcome"));
}

#[test]
fn test_decide_help_shows_outcomes() {
    let mut cmd = Command::cargo_bin("office-hours").unwrap();

    cmd.args(["decide", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("approve"))
        .stdout(predicate::str::contains("reject"));
}
