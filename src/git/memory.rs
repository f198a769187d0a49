//! In-memory repository simulation
//!
//! [`InMemoryBackend`] models branches, a remote, open changes, a stash and
//! in-progress rebases/merges closely enough to drive whole workflows through
//! the engine without a real `git`. Operations can be told to fail once via
//! [`InMemoryBackend::fail_once`]; a failing rebase or merge leaves the
//! repository in the conflicted state real git would.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use super::{Backend, GitError};

const REMOTE: &str = "origin";

#[derive(Debug, Default)]
struct RepoModel {
    current: String,
    branches: BTreeMap<String, String>,
    /// Remote-tracking refs as of the last fetch or push
    remote_branches: BTreeMap<String, String>,
    /// Branches as they exist on the remote itself
    upstream: BTreeMap<String, String>,
    has_remote: bool,
    /// Commits present in the local object database
    objects: HashSet<String>,
    open_changes: bool,
    stash_entries: usize,
    rebase_in_progress: bool,
    merge_in_progress: bool,
    conflicts: bool,
    authors: BTreeMap<String, Vec<String>>,
    pending_failures: HashSet<String>,
    operations: Vec<String>,
    next_sha: usize,
}

impl RepoModel {
    fn next_id(&mut self) -> String {
        self.next_sha += 1;
        format!("sha-{}", self.next_sha)
    }

    /// A fresh commit in the local object database
    fn new_sha(&mut self) -> String {
        let sha = self.next_id();
        self.objects.insert(sha.clone());
        sha
    }

    fn current_sha(&self) -> Result<String, GitError> {
        self.branches
            .get(&self.current)
            .cloned()
            .ok_or_else(|| GitError::BranchNotFound(self.current.clone()))
    }

    fn resolve(&self, reference: &str) -> Result<String, GitError> {
        if let Some(sha) = self.branches.get(reference) {
            return Ok(sha.clone());
        }
        if let Some(branch) = reference.strip_prefix(&format!("{}/", REMOTE)) {
            if let Some(sha) = self.remote_branches.get(branch) {
                return Ok(sha.clone());
            }
        }
        if self.objects.contains(reference) {
            return Ok(reference.to_string());
        }
        Err(GitError::BranchNotFound(reference.to_string()))
    }

    fn set_current_sha(&mut self, sha: String) {
        let current = self.current.clone();
        self.branches.insert(current, sha);
    }

    /// Record the operation and consume a pending failure for it
    fn attempt(&mut self, operation: String) -> Result<(), GitError> {
        self.operations.push(operation.clone());
        if self.pending_failures.remove(&operation) {
            return Err(GitError::Rejected(format!(
                "simulated failure of `{}`",
                operation
            )));
        }
        Ok(())
    }
}

/// Simulated repository implementing [`Backend`]
#[derive(Debug)]
pub struct InMemoryBackend {
    model: Mutex<RepoModel>,
}

impl InMemoryBackend {
    /// Repository with a single `main_branch` that is checked out
    pub fn new(main_branch: &str) -> Self {
        let mut model = RepoModel::default();
        let sha = model.new_sha();
        model.branches.insert(main_branch.to_string(), sha);
        model.current = main_branch.to_string();
        Self {
            model: Mutex::new(model),
        }
    }

    pub fn with_branch(self, branch: &str) -> Self {
        {
            let mut model = self.lock();
            let sha = model.new_sha();
            model.branches.insert(branch.to_string(), sha);
        }
        self
    }

    /// Adds the remote and tracking branches for all existing local branches
    pub fn with_remote(self) -> Self {
        {
            let mut model = self.lock();
            model.has_remote = true;
            let branches = model.branches.clone();
            model.remote_branches.extend(branches.clone());
            model.upstream.extend(branches);
        }
        self
    }

    pub fn with_open_changes(self) -> Self {
        self.lock().open_changes = true;
        self
    }

    pub fn with_current_branch(self, branch: &str) -> Self {
        self.lock().current = branch.to_string();
        self
    }

    pub fn with_authors(self, branch: &str, authors: &[&str]) -> Self {
        self.lock().authors.insert(
            branch.to_string(),
            authors.iter().map(|a| a.to_string()).collect(),
        );
        self
    }

    /// Make the next attempt of `operation` (e.g. `"merge main"`) fail
    pub fn fail_once(&self, operation: &str) {
        self.lock().pending_failures.insert(operation.to_string());
    }

    /// Simulate someone else committing to `branch` on the remote.
    ///
    /// The new commit only becomes visible locally after a fetch.
    pub fn advance_remote(&self, branch: &str) -> String {
        let mut model = self.lock();
        let sha = model.next_id();
        model.upstream.insert(branch.to_string(), sha.clone());
        sha
    }

    /// Simulate a human resolving and staging all conflicts
    pub fn resolve_conflicts(&self) {
        self.lock().conflicts = false;
    }

    /// Every mutating operation attempted so far, in order
    pub fn operations(&self) -> Vec<String> {
        self.lock().operations.clone()
    }

    pub fn clear_operations(&self) {
        self.lock().operations.clear();
    }

    pub fn branch_names(&self) -> Vec<String> {
        self.lock().branches.keys().cloned().collect()
    }

    pub fn branch_sha(&self, branch: &str) -> Option<String> {
        self.lock().branches.get(branch).cloned()
    }

    pub fn remote_sha(&self, branch: &str) -> Option<String> {
        self.lock().remote_branches.get(branch).cloned()
    }

    pub fn checked_out(&self) -> String {
        self.lock().current.clone()
    }

    pub fn open_changes(&self) -> bool {
        self.lock().open_changes
    }

    pub fn stash_size(&self) -> usize {
        self.lock().stash_entries
    }

    pub fn set_rebase_in_progress(&self, in_progress: bool) {
        self.lock().rebase_in_progress = in_progress;
    }

    fn lock(&self) -> MutexGuard<'_, RepoModel> {
        self.model.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Backend for InMemoryBackend {
    fn tracking_branch(&self, branch: &str) -> String {
        format!("{}/{}", REMOTE, branch)
    }

    async fn current_branch(&self) -> Result<String, GitError> {
        Ok(self.lock().current.clone())
    }

    async fn current_sha(&self) -> Result<String, GitError> {
        self.lock().current_sha()
    }

    async fn sha_for_branch(&self, branch: &str) -> Result<String, GitError> {
        self.lock().resolve(branch)
    }

    async fn local_branches(&self) -> Result<Vec<String>, GitError> {
        Ok(self.branch_names())
    }

    async fn has_branch(&self, branch: &str) -> Result<bool, GitError> {
        Ok(self.lock().branches.contains_key(branch))
    }

    async fn has_remote(&self) -> Result<bool, GitError> {
        Ok(self.lock().has_remote)
    }

    async fn has_tracking_branch(&self, branch: &str) -> Result<bool, GitError> {
        Ok(self.lock().remote_branches.contains_key(branch))
    }

    async fn has_open_changes(&self) -> Result<bool, GitError> {
        Ok(self.lock().open_changes)
    }

    async fn has_conflicts(&self) -> Result<bool, GitError> {
        Ok(self.lock().conflicts)
    }

    async fn is_rebase_in_progress(&self) -> Result<bool, GitError> {
        Ok(self.lock().rebase_in_progress)
    }

    async fn is_merge_in_progress(&self) -> Result<bool, GitError> {
        Ok(self.lock().merge_in_progress)
    }

    async fn branch_authors(&self, branch: &str, _parent: &str) -> Result<Vec<String>, GitError> {
        Ok(self.lock().authors.get(branch).cloned().unwrap_or_default())
    }

    async fn root_directory(&self) -> Result<PathBuf, GitError> {
        Ok(PathBuf::from("/in-memory/repo"))
    }

    async fn checkout_branch(&self, branch: &str) -> Result<(), GitError> {
        let mut model = self.lock();
        model.attempt(format!("checkout {}", branch))?;
        if !model.branches.contains_key(branch) {
            return Err(GitError::BranchNotFound(branch.to_string()));
        }
        model.current = branch.to_string();
        Ok(())
    }

    async fn create_branch(&self, branch: &str, starting_point: &str) -> Result<(), GitError> {
        let mut model = self.lock();
        model.attempt(format!("create-branch {} {}", branch, starting_point))?;
        if model.branches.contains_key(branch) {
            return Err(GitError::Rejected(format!(
                "a branch named '{}' already exists",
                branch
            )));
        }
        let sha = model.resolve(starting_point)?;
        model.branches.insert(branch.to_string(), sha);
        Ok(())
    }

    async fn delete_local_branch(&self, branch: &str, _force: bool) -> Result<(), GitError> {
        let mut model = self.lock();
        model.attempt(format!("delete-branch {}", branch))?;
        if model.current == branch {
            return Err(GitError::Rejected(format!(
                "cannot delete branch '{}' checked out",
                branch
            )));
        }
        model
            .branches
            .remove(branch)
            .map(|_| ())
            .ok_or_else(|| GitError::BranchNotFound(branch.to_string()))
    }

    async fn fetch(&self) -> Result<(), GitError> {
        let mut model = self.lock();
        model.attempt("fetch".to_string())?;
        let upstream = model.upstream.clone();
        model.objects.extend(upstream.values().cloned());
        model.remote_branches.extend(upstream);
        Ok(())
    }

    async fn rebase(&self, target: &str) -> Result<(), GitError> {
        let mut model = self.lock();
        model.resolve(target)?;
        if let Err(e) = model.attempt(format!("rebase {}", target)) {
            model.rebase_in_progress = true;
            model.conflicts = true;
            return Err(e);
        }
        let sha = model.new_sha();
        model.set_current_sha(sha);
        Ok(())
    }

    async fn abort_rebase(&self) -> Result<(), GitError> {
        let mut model = self.lock();
        model.attempt("rebase --abort".to_string())?;
        if !model.rebase_in_progress {
            return Err(GitError::Rejected("no rebase in progress".to_string()));
        }
        model.rebase_in_progress = false;
        model.conflicts = false;
        Ok(())
    }

    async fn continue_rebase(&self) -> Result<(), GitError> {
        let mut model = self.lock();
        model.attempt("rebase --continue".to_string())?;
        if model.conflicts {
            return Err(GitError::Rejected("unresolved conflicts".to_string()));
        }
        model.rebase_in_progress = false;
        let sha = model.new_sha();
        model.set_current_sha(sha);
        Ok(())
    }

    async fn merge_no_edit(&self, branch: &str) -> Result<(), GitError> {
        let mut model = self.lock();
        model.resolve(branch)?;
        if let Err(e) = model.attempt(format!("merge {}", branch)) {
            model.merge_in_progress = true;
            model.conflicts = true;
            return Err(e);
        }
        let sha = model.new_sha();
        model.set_current_sha(sha);
        Ok(())
    }

    async fn abort_merge(&self) -> Result<(), GitError> {
        let mut model = self.lock();
        model.attempt("merge --abort".to_string())?;
        if !model.merge_in_progress {
            return Err(GitError::Rejected(
                "there is no merge to abort (MERGE_HEAD missing)".to_string(),
            ));
        }
        model.merge_in_progress = false;
        model.conflicts = false;
        Ok(())
    }

    async fn commit_no_edit(&self) -> Result<(), GitError> {
        let mut model = self.lock();
        model.attempt("commit --no-edit".to_string())?;
        if model.conflicts {
            return Err(GitError::Rejected("unresolved conflicts".to_string()));
        }
        model.merge_in_progress = false;
        let sha = model.new_sha();
        model.set_current_sha(sha);
        Ok(())
    }

    async fn squash_merge(&self, branch: &str) -> Result<(), GitError> {
        let mut model = self.lock();
        model.resolve(branch)?;
        model.attempt(format!("merge --squash {}", branch))?;
        model.open_changes = true;
        Ok(())
    }

    async fn commit(&self, message: &str, author: Option<&str>) -> Result<(), GitError> {
        let mut model = self.lock();
        let operation = match author {
            Some(author) => format!("commit -m {} --author {}", message, author),
            None => format!("commit -m {}", message),
        };
        model.attempt(operation)?;
        if !model.open_changes {
            return Err(GitError::Rejected("nothing to commit".to_string()));
        }
        model.open_changes = false;
        let sha = model.new_sha();
        model.set_current_sha(sha);
        Ok(())
    }

    async fn revert_commit(&self, sha: &str) -> Result<(), GitError> {
        let mut model = self.lock();
        model.attempt(format!("revert {}", sha))?;
        if !model.objects.contains(sha) {
            return Err(GitError::Rejected(format!("bad revision '{}'", sha)));
        }
        let sha = model.new_sha();
        model.set_current_sha(sha);
        Ok(())
    }

    async fn reset_to_sha(&self, sha: &str, hard: bool) -> Result<(), GitError> {
        let mut model = self.lock();
        let operation = if hard {
            format!("reset --hard {}", sha)
        } else {
            format!("reset {}", sha)
        };
        model.attempt(operation)?;
        if hard {
            model.open_changes = false;
        }
        model.set_current_sha(sha.to_string());
        Ok(())
    }

    async fn push_branch(
        &self,
        branch: &str,
        _force: bool,
        _set_upstream: bool,
    ) -> Result<(), GitError> {
        let mut model = self.lock();
        model.attempt(format!("push {}", branch))?;
        if !model.has_remote {
            return Err(GitError::Rejected(format!(
                "'{}' does not appear to be a git repository",
                REMOTE
            )));
        }
        let sha = model.resolve(branch)?;
        model.remote_branches.insert(branch.to_string(), sha.clone());
        model.upstream.insert(branch.to_string(), sha);
        Ok(())
    }

    async fn stash(&self) -> Result<(), GitError> {
        let mut model = self.lock();
        model.attempt("stash".to_string())?;
        if model.open_changes {
            model.stash_entries += 1;
            model.open_changes = false;
        }
        Ok(())
    }

    async fn pop_stash(&self) -> Result<(), GitError> {
        let mut model = self.lock();
        model.attempt("stash pop".to_string())?;
        if model.stash_entries == 0 {
            return Err(GitError::Rejected("no stash entries found".to_string()));
        }
        model.stash_entries -= 1;
        model.open_changes = true;
        Ok(())
    }

    async fn discard_open_changes(&self) -> Result<(), GitError> {
        let mut model = self.lock();
        model.attempt("reset --hard".to_string())?;
        model.open_changes = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_checkout_and_create() {
        let backend = InMemoryBackend::new("main");
        backend.create_branch("feature", "main").await.unwrap();
        backend.checkout_branch("feature").await.unwrap();

        assert_eq!(backend.current_branch().await.unwrap(), "feature");
        assert_eq!(backend.branch_sha("feature"), backend.branch_sha("main"));
        assert_eq!(
            backend.operations(),
            vec!["create-branch feature main", "checkout feature"]
        );
    }

    #[tokio::test]
    async fn test_failed_merge_leaves_conflict() {
        let backend = InMemoryBackend::new("main").with_branch("feature");
        backend.fail_once("merge feature");

        assert!(backend.merge_no_edit("feature").await.is_err());
        assert!(backend.is_merge_in_progress().await.unwrap());
        assert!(backend.has_conflicts().await.unwrap());

        assert!(backend.commit_no_edit().await.is_err());
        backend.resolve_conflicts();
        backend.commit_no_edit().await.unwrap();
        assert!(!backend.is_merge_in_progress().await.unwrap());
    }

    #[tokio::test]
    async fn test_abort_needs_operation_in_progress() {
        let backend = InMemoryBackend::new("main").with_branch("feature");
        assert!(backend.abort_merge().await.is_err());
        assert!(backend.abort_rebase().await.is_err());

        backend.fail_once("merge feature");
        assert!(backend.merge_no_edit("feature").await.is_err());
        backend.abort_merge().await.unwrap();
        assert!(!backend.has_conflicts().await.unwrap());
    }

    #[tokio::test]
    async fn test_remote_commits_arrive_with_fetch() {
        let backend = InMemoryBackend::new("main").with_remote();
        let sha = backend.advance_remote("main");

        assert_ne!(backend.remote_sha("main").as_ref(), Some(&sha));
        assert!(backend.revert_commit(&sha).await.is_err());

        backend.fetch().await.unwrap();
        assert_eq!(backend.remote_sha("main"), Some(sha.clone()));
        backend.revert_commit(&sha).await.unwrap();
    }

    #[tokio::test]
    async fn test_failure_is_consumed() {
        let backend = InMemoryBackend::new("main").with_branch("feature");
        backend.fail_once("checkout feature");

        assert!(backend.checkout_branch("feature").await.is_err());
        backend.checkout_branch("feature").await.unwrap();
        assert_eq!(backend.checked_out(), "feature");
    }

    #[tokio::test]
    async fn test_stash_round_trip() {
        let backend = InMemoryBackend::new("main").with_open_changes();
        backend.stash().await.unwrap();
        assert!(!backend.open_changes());
        assert_eq!(backend.stash_size(), 1);

        backend.pop_stash().await.unwrap();
        assert!(backend.open_changes());
        assert!(backend.pop_stash().await.is_err());
    }

    #[tokio::test]
    async fn test_push_requires_remote() {
        let backend = InMemoryBackend::new("main");
        assert!(backend.push_branch("main", false, false).await.is_err());

        let backend = InMemoryBackend::new("main").with_remote().with_branch("feature");
        backend.push_branch("feature", false, true).await.unwrap();
        assert!(backend.has_tracking_branch("feature").await.unwrap());
        assert_eq!(backend.remote_sha("feature"), backend.branch_sha("feature"));
    }
}
