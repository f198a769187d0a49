//! Run state persistence
//!
//! One snapshot per repository, stored outside the working tree. Saving
//! overwrites the previous snapshot; deleting a missing snapshot is a no-op.
//! Concurrent invocations against the same repository are not guarded.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::debug;

use super::run_state::RunState;

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("cannot write run state to {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },

    #[error("cannot read run state from {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("cannot delete run state {path}: {source}")]
    Delete {
        path: String,
        source: std::io::Error,
    },

    #[error("run state {path} is corrupt: {source}")]
    Corrupt {
        path: String,
        source: serde_json::Error,
    },

    #[error("cannot serialize run state: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// Location of the persisted run state of one repository
#[derive(Debug, Clone)]
pub struct RunStateStore {
    path: PathBuf,
}

impl RunStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store for the repository at `root`, inside `state_dir` or the OS temp dir
    pub fn for_repository(root: &Path, state_dir: Option<&Path>) -> Self {
        let dir = state_dir
            .map(Path::to_path_buf)
            .unwrap_or_else(std::env::temp_dir);
        Self::new(dir.join(format!("gitstep-{}.json", file_stem(root))))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Write the snapshot atomically, replacing any previous one
    pub fn save(&self, state: &RunState) -> Result<(), PersistenceError> {
        let json = serde_json::to_string_pretty(state).map_err(PersistenceError::Serialize)?;
        let write_err = |source| PersistenceError::Write {
            path: self.path.display().to_string(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(write_err)?;
        std::fs::rename(&tmp, &self.path).map_err(write_err)?;

        debug!(path = %self.path.display(), command = %state.command, "Saved run state");
        Ok(())
    }

    pub fn load(&self) -> Result<Option<RunState>, PersistenceError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(PersistenceError::Read {
                    path: self.path.display().to_string(),
                    source: e,
                })
            }
        };
        let state = serde_json::from_str(&content).map_err(|e| PersistenceError::Corrupt {
            path: self.path.display().to_string(),
            source: e,
        })?;
        Ok(Some(state))
    }

    pub fn delete(&self) -> Result<(), PersistenceError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "Deleted run state");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PersistenceError::Delete {
                path: self.path.display().to_string(),
                source: e,
            }),
        }
    }
}

/// Readable form of `root` plus a digest of the exact path, so roots that
/// only differ in punctuation get different files
fn file_stem(root: &Path) -> String {
    let raw = root.to_string_lossy();
    let readable: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    let digest = Sha256::digest(raw.as_bytes());
    format!("{}-{}", readable.trim_matches('-'), hex::encode(&digest[..6]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::{Step, StepList};
    use tempfile::tempdir;

    #[test]
    fn test_load_missing_snapshot() {
        let dir = tempdir().unwrap();
        let store = RunStateStore::new(dir.path().join("state.json"));
        assert!(store.load().unwrap().is_none());
        assert!(!store.exists());
    }

    #[test]
    fn test_save_and_load_full_state() {
        let dir = tempdir().unwrap();
        let store = RunStateStore::new(dir.path().join("nested/state.json"));
        let mut state = RunState::new("sync", StepList::from(vec![Step::ContinueMerge]));
        state.abort_steps.append(Step::AbortMerge);
        state.undo_steps.prepend(Step::checkout("main"));
        state.mark_as_unfinished("feature", true);

        store.save(&state).unwrap();

        assert_eq!(store.load().unwrap(), Some(state));
    }

    #[test]
    fn test_second_save_overwrites() {
        let dir = tempdir().unwrap();
        let store = RunStateStore::new(dir.path().join("state.json"));

        store.save(&RunState::new("hack", StepList::new())).unwrap();
        store.save(&RunState::new("sync", StepList::new())).unwrap();

        assert_eq!(store.load().unwrap().unwrap().command, "sync");
        let files = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(files, 1);
    }

    #[test]
    fn test_delete_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = RunStateStore::new(dir.path().join("state.json"));
        store.save(&RunState::new("hack", StepList::new())).unwrap();

        store.delete().unwrap();
        store.delete().unwrap();
        assert!(!store.exists());
    }

    #[test]
    fn test_corrupt_snapshot_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = RunStateStore::new(&path).load().unwrap_err();
        assert!(matches!(err, PersistenceError::Corrupt { .. }));
    }

    #[test]
    fn test_for_repository_is_scoped_to_root() {
        let dir = tempdir().unwrap();
        let a = RunStateStore::for_repository(Path::new("/home/dev/app"), Some(dir.path()));
        let b = RunStateStore::for_repository(Path::new("/home/dev/lib"), Some(dir.path()));

        assert_ne!(a.path(), b.path());
        let name = a.path().file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("gitstep-home-dev-app-"), "{}", name);
        assert!(name.ends_with(".json"));
        assert_eq!(
            a.path(),
            RunStateStore::for_repository(Path::new("/home/dev/app"), Some(dir.path())).path()
        );
    }

    #[test]
    fn test_punctuation_variants_get_separate_files() {
        let dir = tempdir().unwrap();
        let store = |root: &str| RunStateStore::for_repository(Path::new(root), Some(dir.path()));

        assert_ne!(store("/home/dev/a-b").path(), store("/home/dev/a/b").path());
        assert_ne!(store("/x/foo_bar").path(), store("/x/foo.bar").path());

        store("/home/dev/a-b")
            .save(&RunState::new("hack", StepList::new()))
            .unwrap();
        assert!(store("/home/dev/a/b").load().unwrap().is_none());
    }
}
