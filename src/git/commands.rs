//! Git backend backed by the `git` executable

use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;

use super::{Backend, GitError};
use crate::process::BackendRunner;

/// Production [`Backend`] running `git` through a [`BackendRunner`]
#[derive(Debug, Clone)]
pub struct GitBackend {
    runner: BackendRunner,
    remote: String,
}

impl GitBackend {
    pub fn new(runner: BackendRunner, remote: impl Into<String>) -> Self {
        Self {
            runner,
            remote: remote.into(),
        }
    }

    pub fn runner(&self) -> &BackendRunner {
        &self.runner
    }

    pub fn remote(&self) -> &str {
        &self.remote
    }

    async fn git(&self, args: &[&str]) -> Result<String, GitError> {
        Ok(self.runner.run("git", args).await?)
    }

    /// Run a query whose answer is encoded in the exit status
    async fn succeeds(&self, args: &[&str]) -> Result<bool, GitError> {
        match self.runner.run("git", args).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_exit_failure() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn status(&self) -> Result<String, GitError> {
        self.git(&["status"]).await
    }

    /// Branch being rebased, read from git's rebase bookkeeping
    async fn rebased_branch(&self) -> Result<Option<String>, GitError> {
        for dir in ["rebase-merge", "rebase-apply"] {
            let rel = self
                .git(&["rev-parse", "--git-path", &format!("{}/head-name", dir)])
                .await?;
            let path = match self.runner.dir() {
                Some(base) => base.join(&rel),
                None => PathBuf::from(&rel),
            };
            match tokio::fs::read_to_string(&path).await {
                Ok(content) => {
                    let name = content.trim();
                    return Ok(Some(
                        name.strip_prefix("refs/heads/").unwrap_or(name).to_string(),
                    ));
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl Backend for GitBackend {
    fn tracking_branch(&self, branch: &str) -> String {
        format!("{}/{}", self.remote, branch)
    }

    async fn current_branch(&self) -> Result<String, GitError> {
        if self.is_rebase_in_progress().await? {
            if let Some(branch) = self.rebased_branch().await? {
                return Ok(branch);
            }
        }
        let branch = self.git(&["rev-parse", "--abbrev-ref", "HEAD"]).await?;
        if branch.is_empty() {
            return Err(GitError::UnexpectedOutput(
                "cannot determine the current branch".to_string(),
            ));
        }
        Ok(branch)
    }

    async fn current_sha(&self) -> Result<String, GitError> {
        self.git(&["rev-parse", "HEAD"]).await
    }

    async fn sha_for_branch(&self, branch: &str) -> Result<String, GitError> {
        match self.git(&["rev-parse", branch]).await {
            Ok(sha) => Ok(sha),
            Err(GitError::Process(e)) if e.is_exit_failure() => {
                Err(GitError::BranchNotFound(branch.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    async fn local_branches(&self) -> Result<Vec<String>, GitError> {
        let output = self.git(&["branch", "--format=%(refname:short)"]).await?;
        Ok(output
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }

    async fn has_branch(&self, branch: &str) -> Result<bool, GitError> {
        self.succeeds(&["rev-parse", "--verify", "-q", &format!("refs/heads/{}", branch)])
            .await
    }

    async fn has_remote(&self) -> Result<bool, GitError> {
        let output = self.git(&["remote"]).await?;
        Ok(output.lines().any(|l| l.trim() == self.remote))
    }

    async fn has_tracking_branch(&self, branch: &str) -> Result<bool, GitError> {
        let reference = format!("refs/remotes/{}/{}", self.remote, branch);
        self.succeeds(&["rev-parse", "--verify", "-q", &reference]).await
    }

    async fn has_open_changes(&self) -> Result<bool, GitError> {
        let output = self
            .git(&["status", "--porcelain", "--ignore-submodules"])
            .await?;
        Ok(!output.is_empty())
    }

    async fn has_conflicts(&self) -> Result<bool, GitError> {
        Ok(self.status().await?.contains("Unmerged paths"))
    }

    async fn is_rebase_in_progress(&self) -> Result<bool, GitError> {
        let status = self.status().await?;
        Ok(status.contains("rebase in progress") || status.contains("You are currently rebasing"))
    }

    async fn is_merge_in_progress(&self) -> Result<bool, GitError> {
        self.succeeds(&["rev-parse", "-q", "--verify", "MERGE_HEAD"]).await
    }

    async fn branch_authors(&self, branch: &str, parent: &str) -> Result<Vec<String>, GitError> {
        let range = format!("{}..{}", parent, branch);
        let output = self.git(&["shortlog", "-s", "-n", "-e", &range]).await?;
        let mut authors = Vec::new();
        for line in output.lines().filter(|l| !l.trim().is_empty()) {
            let (_, author) = line
                .split_once('\t')
                .ok_or_else(|| GitError::UnexpectedOutput(line.to_string()))?;
            authors.push(author.trim().to_string());
        }
        Ok(authors)
    }

    async fn root_directory(&self) -> Result<PathBuf, GitError> {
        Ok(PathBuf::from(self.git(&["rev-parse", "--show-toplevel"]).await?))
    }

    async fn checkout_branch(&self, branch: &str) -> Result<(), GitError> {
        self.git(&["checkout", branch]).await?;
        Ok(())
    }

    async fn create_branch(&self, branch: &str, starting_point: &str) -> Result<(), GitError> {
        self.git(&["branch", branch, starting_point]).await?;
        Ok(())
    }

    async fn delete_local_branch(&self, branch: &str, force: bool) -> Result<(), GitError> {
        let flag = if force { "-D" } else { "-d" };
        self.git(&["branch", flag, branch]).await?;
        Ok(())
    }

    async fn fetch(&self) -> Result<(), GitError> {
        self.git(&["fetch", "--prune", &self.remote]).await?;
        Ok(())
    }

    async fn rebase(&self, target: &str) -> Result<(), GitError> {
        self.git(&["rebase", target]).await?;
        Ok(())
    }

    async fn abort_rebase(&self) -> Result<(), GitError> {
        self.git(&["rebase", "--abort"]).await?;
        Ok(())
    }

    async fn continue_rebase(&self) -> Result<(), GitError> {
        self.git(&["-c", "core.editor=true", "rebase", "--continue"])
            .await?;
        Ok(())
    }

    async fn merge_no_edit(&self, branch: &str) -> Result<(), GitError> {
        self.git(&["merge", "--no-edit", branch]).await?;
        Ok(())
    }

    async fn abort_merge(&self) -> Result<(), GitError> {
        self.git(&["merge", "--abort"]).await?;
        Ok(())
    }

    async fn commit_no_edit(&self) -> Result<(), GitError> {
        self.git(&["commit", "--no-edit"]).await?;
        Ok(())
    }

    async fn squash_merge(&self, branch: &str) -> Result<(), GitError> {
        self.git(&["merge", "--squash", branch]).await?;
        Ok(())
    }

    async fn commit(&self, message: &str, author: Option<&str>) -> Result<(), GitError> {
        let mut args = vec!["commit", "-m", message];
        if let Some(author) = author {
            args.push("--author");
            args.push(author);
        }
        self.git(&args).await?;
        Ok(())
    }

    async fn revert_commit(&self, sha: &str) -> Result<(), GitError> {
        self.git(&["revert", "--no-edit", sha]).await?;
        Ok(())
    }

    async fn reset_to_sha(&self, sha: &str, hard: bool) -> Result<(), GitError> {
        let mut args = vec!["reset"];
        if hard {
            args.push("--hard");
        }
        args.push(sha);
        self.git(&args).await?;
        Ok(())
    }

    async fn push_branch(
        &self,
        branch: &str,
        force: bool,
        set_upstream: bool,
    ) -> Result<(), GitError> {
        let mut args = vec!["push"];
        if set_upstream {
            args.push("-u");
        }
        if force {
            args.push("--force-with-lease");
        }
        args.push(&self.remote);
        args.push(branch);
        self.git(&args).await?;
        Ok(())
    }

    async fn stash(&self) -> Result<(), GitError> {
        self.git(&["stash", "push", "--include-untracked"]).await?;
        Ok(())
    }

    async fn pop_stash(&self) -> Result<(), GitError> {
        self.git(&["stash", "pop"]).await?;
        Ok(())
    }

    async fn discard_open_changes(&self) -> Result<(), GitError> {
        debug!("Discarding open changes");
        self.git(&["reset", "--hard"]).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    async fn scratch_repo(dir: &Path) -> GitBackend {
        let runner = BackendRunner::new().in_dir(dir);
        runner.run("git", &["init", "-q", "-b", "main"]).await.unwrap();
        runner
            .run("git", &["config", "user.email", "dev@example.com"])
            .await
            .unwrap();
        runner
            .run("git", &["config", "user.name", "Dev"])
            .await
            .unwrap();
        runner
            .run("git", &["commit", "-q", "--allow-empty", "-m", "initial"])
            .await
            .unwrap();
        GitBackend::new(runner, "origin")
    }

    fn git_available() -> bool {
        which::which("git").is_ok()
    }

    #[test]
    fn test_tracking_branch_name() {
        let backend = GitBackend::new(BackendRunner::new(), "upstream");
        assert_eq!(backend.tracking_branch("main"), "upstream/main");
    }

    #[tokio::test]
    async fn test_branch_queries_against_real_repo() {
        if !git_available() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let backend = scratch_repo(dir.path()).await;

        assert_eq!(backend.current_branch().await.unwrap(), "main");
        backend.create_branch("feature", "main").await.unwrap();
        assert!(backend.has_branch("feature").await.unwrap());
        assert!(!backend.has_branch("missing").await.unwrap());

        backend.checkout_branch("feature").await.unwrap();
        assert_eq!(backend.current_branch().await.unwrap(), "feature");
        assert!(!backend.has_open_changes().await.unwrap());
        assert!(!backend.is_rebase_in_progress().await.unwrap());
        assert!(!backend.is_merge_in_progress().await.unwrap());
        assert!(!backend.has_remote().await.unwrap());

        let mut branches = backend.local_branches().await.unwrap();
        branches.sort();
        assert_eq!(branches, vec!["feature", "main"]);
    }

    #[tokio::test]
    async fn test_missing_branch_sha() {
        if !git_available() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let backend = scratch_repo(dir.path()).await;

        let err = backend.sha_for_branch("nope").await.unwrap_err();
        assert!(matches!(err, GitError::BranchNotFound(_)));
    }
}
