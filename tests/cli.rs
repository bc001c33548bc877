use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn test_help_lists_commands() {
    Command::cargo_bin("vidscribe")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("transcribe"));
}

#[test]
fn test_unknown_command_fails() {
    Command::cargo_bin("vidscribe")
        .unwrap()
        .arg("frobnicate")
        .assert()
        .failure();
}

#[test]
fn test_transcribe_requires_url() {
    Command::cargo_bin("vidscribe")
        .unwrap()
        .arg("transcribe")
        .assert()
        .failure()
        .stderr(predicate::str::contains("URL"));
}
