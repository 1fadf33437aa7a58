//! Fast CLI tests using assert_cmd.
//! These test the binary directly without needing a container runtime.

#![allow(deprecated)] // assert_cmd::Command::cargo_bin is deprecated but works fine

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn test_help_flag() {
    Command::cargo_bin("redock")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Rebuild an image and restart its container",
        ));
}

#[test]
fn test_version_flag() {
    Command::cargo_bin("redock")
        .unwrap()
        .arg("--version")
        .assert()
        .success();
}

#[test]
fn test_subcommand_help() {
    for subcmd in &["converge", "config"] {
        Command::cargo_bin("redock")
            .unwrap()
            .args([subcmd, "--help"])
            .assert()
            .success()
            .stdout(predicate::str::is_empty().not());
    }
}

#[test]
fn test_converge_help_documents_attach() {
    Command::cargo_bin("redock")
        .unwrap()
        .args(["converge", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--attach"))
        .stdout(predicate::str::contains("--no-cache"))
        .stdout(predicate::str::contains("--context"));
}

#[test]
fn test_unknown_subcommand_fails() {
    Command::cargo_bin("redock")
        .unwrap()
        .arg("nonexistent-subcommand")
        .assert()
        .failure();
}

#[test]
fn test_converge_requires_image_and_container() {
    Command::cargo_bin("redock")
        .unwrap()
        .arg("converge")
        .assert()
        .failure()
        .stderr(predicate::str::contains("IMAGE"));

    Command::cargo_bin("redock")
        .unwrap()
        .args(["converge", "demo_image"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("CONTAINER"));
}

#[test]
fn test_rejects_unknown_engine() {
    Command::cargo_bin("redock")
        .unwrap()
        .args(["--engine", "containerd", "converge", "a", "b"])
        .assert()
        .failure();
}
