//! Version-control backend
//!
//! Steps talk to the repository exclusively through the [`Backend`] trait:
//! - `commands` - [`GitBackend`], the production implementation shelling out to `git`
//! - `memory` - [`InMemoryBackend`], a simulated repository with failure injection
//! - `error` - [`GitError`]

pub mod commands;
pub mod error;
pub mod memory;

pub use commands::GitBackend;
pub use error::GitError;
pub use memory::InMemoryBackend;

use async_trait::async_trait;
use std::path::PathBuf;

/// Branch queries and branch mutations available to steps
#[async_trait]
pub trait Backend: Send + Sync {
    /// Name of the tracking branch of `branch` on the configured remote
    fn tracking_branch(&self, branch: &str) -> String;

    async fn current_branch(&self) -> Result<String, GitError>;

    async fn current_sha(&self) -> Result<String, GitError>;

    async fn sha_for_branch(&self, branch: &str) -> Result<String, GitError>;

    async fn local_branches(&self) -> Result<Vec<String>, GitError>;

    async fn has_branch(&self, branch: &str) -> Result<bool, GitError>;

    /// Whether the configured remote exists
    async fn has_remote(&self) -> Result<bool, GitError>;

    async fn has_tracking_branch(&self, branch: &str) -> Result<bool, GitError>;

    async fn has_open_changes(&self) -> Result<bool, GitError>;

    async fn has_conflicts(&self) -> Result<bool, GitError>;

    async fn is_rebase_in_progress(&self) -> Result<bool, GitError>;

    async fn is_merge_in_progress(&self) -> Result<bool, GitError>;

    /// Authors of the commits on `branch` that are not on `parent`, most active first
    async fn branch_authors(&self, branch: &str, parent: &str) -> Result<Vec<String>, GitError>;

    async fn root_directory(&self) -> Result<PathBuf, GitError>;

    async fn checkout_branch(&self, branch: &str) -> Result<(), GitError>;

    async fn create_branch(&self, branch: &str, starting_point: &str) -> Result<(), GitError>;

    async fn delete_local_branch(&self, branch: &str, force: bool) -> Result<(), GitError>;

    async fn fetch(&self) -> Result<(), GitError>;

    /// Rebase the current branch onto `target`
    async fn rebase(&self, target: &str) -> Result<(), GitError>;

    async fn abort_rebase(&self) -> Result<(), GitError>;

    async fn continue_rebase(&self) -> Result<(), GitError>;

    /// Merge `branch` into the current branch without editing the message
    async fn merge_no_edit(&self, branch: &str) -> Result<(), GitError>;

    async fn abort_merge(&self) -> Result<(), GitError>;

    async fn commit_no_edit(&self) -> Result<(), GitError>;

    async fn squash_merge(&self, branch: &str) -> Result<(), GitError>;

    async fn commit(&self, message: &str, author: Option<&str>) -> Result<(), GitError>;

    async fn revert_commit(&self, sha: &str) -> Result<(), GitError>;

    async fn reset_to_sha(&self, sha: &str, hard: bool) -> Result<(), GitError>;

    async fn push_branch(&self, branch: &str, force: bool, set_upstream: bool)
        -> Result<(), GitError>;

    async fn stash(&self) -> Result<(), GitError>;

    async fn pop_stash(&self) -> Result<(), GitError>;

    async fn discard_open_changes(&self) -> Result<(), GitError>;
}
