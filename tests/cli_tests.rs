mod common;

use common::*;
use std::process::Command;

fn cli_command() -> Command {
    Command::new(env!("CARGO_BIN_EXE_gitstep"))
}

#[test]
fn test_cli_help() {
    let output = cli_command().arg("--help").output().unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Resumable and undoable git workflows"));
    for command in ["hack", "sync", "ship", "continue", "skip", "abort", "undo", "status"] {
        assert!(stdout.contains(command), "missing {}", command);
    }
}

#[test]
fn test_cli_version() {
    let output = cli_command().arg("--version").output().unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("gitstep"));
}

#[test]
fn test_cli_ship_help() {
    let output = cli_command().args(["ship", "--help"]).output().unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Squash-merge a feature branch into the main branch"));
    assert!(stdout.contains("--message"));
    assert!(stdout.contains("--author"));
}

#[test]
fn test_cli_sync_help() {
    let output = cli_command().args(["sync", "--help"]).output().unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("--all"));
}

#[test]
fn test_cli_hack_requires_branch() {
    let output = cli_command().arg("hack").output().unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("BRANCH"));
}

#[test]
fn test_cli_outside_repository_is_hard_error() {
    let dir = create_test_dir();
    let output = cli_command()
        .args(["status", "-C"])
        .arg(dir.path())
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_cli_status_and_hack_in_repository() {
    if !git_available() {
        return;
    }
    let dir = create_test_dir();
    let state_dir = create_test_dir();
    init_git_repo(dir.path());
    write_config(
        state_dir.path(),
        &format!("state_dir: {}\n", state_dir.path().display()),
    );
    let config = state_dir.path().join(".gitstep.yaml");
    let gitstep = |args: &[&str]| {
        cli_command()
            .arg("-C")
            .arg(dir.path())
            .arg("--config")
            .arg(&config)
            .args(args)
            .output()
            .unwrap()
    };

    let output = gitstep(&["status"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("No run state"));

    let output = gitstep(&["hack", "feature"]);
    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );

    let output = gitstep(&["status"]);
    assert!(String::from_utf8_lossy(&output.stdout).contains("The last `hack` command finished"));

    let output = gitstep(&["undo"]);
    assert!(output.status.success());

    let branches = Command::new("git")
        .args(["branch", "--format=%(refname:short)"])
        .current_dir(dir.path())
        .output()
        .unwrap();
    assert_eq!(String::from_utf8_lossy(&branches.stdout).trim(), "main");
}
