use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn reelcut() -> Command {
    let mut cmd = Command::cargo_bin("reelcut").unwrap();
    cmd.env("RUST_LOG", "error").arg("--progress").arg("none");
    cmd
}

#[test]
fn test_help_lists_commands() {
    reelcut()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("compress"))
        .stdout(predicate::str::contains("extract"))
        .stdout(predicate::str::contains("highlights"))
        .stdout(predicate::str::contains("inspect"));
}

#[test]
fn test_extract_requires_range() {
    reelcut()
        .args(["extract", "--in", "match.mp4"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--start"));
}

#[test]
fn test_extract_rejects_bad_time() {
    let dir = TempDir::new().unwrap();
    reelcut()
        .current_dir(dir.path())
        .args(["extract", "--in", "match.mp4", "-s", "ninety", "-e", "100"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid time format: ninety"));
}

#[test]
fn test_missing_input_is_reported() {
    let dir = TempDir::new().unwrap();
    reelcut()
        .current_dir(dir.path())
        .args(["inspect", "--in", "missing.mp4"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Input file not found"));
}

#[test]
fn test_unknown_progress_mode_is_rejected() {
    Command::cargo_bin("reelcut")
        .unwrap()
        .args(["--progress", "loud", "inspect", "--in", "a.mp4"])
        .assert()
        .failure();
}
