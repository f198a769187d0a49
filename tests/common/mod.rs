#![allow(dead_code)]

use std::path::Path;
use std::process::Command;

use gitstep::prelude::*;
use tempfile::TempDir;

pub fn create_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp directory")
}

pub fn store_in(dir: &TempDir) -> RunStateStore {
    RunStateStore::new(dir.path().join("run-state.json"))
}

/// `main` plus two feature branches, without a remote, `main` checked out
pub fn two_feature_repo() -> InMemoryBackend {
    InMemoryBackend::new("main")
        .with_branch("alpha")
        .with_branch("beta")
}

pub fn steps_of(state: &RunState) -> Vec<Step> {
    state.run_steps.iter().cloned().collect()
}

pub fn undo_steps_of(state: &RunState) -> Vec<Step> {
    state.undo_steps.iter().cloned().collect()
}

pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Initialise a repository with one commit on `main`
pub fn init_git_repo(dir: &Path) {
    let git = |args: &[&str]| {
        let output = Command::new("git")
            .args(args)
            .current_dir(dir)
            .output()
            .expect("Failed to run git");
        assert!(output.status.success(), "git {:?} failed", args);
    };
    git(&["init", "-q", "-b", "main"]);
    git(&["config", "user.email", "dev@example.test"]);
    git(&["config", "user.name", "Dev"]);
    git(&["commit", "-q", "--allow-empty", "-m", "initial"]);
}

pub fn write_config(dir: &Path, content: &str) {
    std::fs::write(dir.join(Config::FILE_NAME), content).expect("Failed to write config");
}
