//! Workflow steps
//!
//! A [`Step`] is one atomic, reversible unit of a workflow. The catalog is a
//! closed enum; every capability (run, abort counterpart, continuation, undo
//! counterpart, automatic-abort policy) is spelled out per variant so the
//! mapping from variant to behavior stays total.
//!
//! Two variants are meta-steps ([`Step::SkipCurrentBranchSteps`] and
//! [`Step::PushBranchAfterCurrentBranchSteps`]): the engine intercepts them
//! and mutates the run-list instead of executing anything.

pub mod list;

pub use list::{StepList, WrapOptions};

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::git::{Backend, GitError};
use crate::hosting::{Connector, ConnectorError};

/// Errors raised by a step
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Connector(#[from] ConnectorError),

    #[error("no code hosting connector configured")]
    NoConnector,

    #[error("cannot determine undo step for `{step}`: {reason}")]
    UndoUnavailable { step: String, reason: &'static str },

    #[error("meta-step `{0}` cannot be executed directly")]
    MetaStep(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Step {
    /// Does nothing
    Empty,

    Checkout {
        branch: String,
        #[serde(default)]
        previous_branch: Option<String>,
    },

    CreateBranch {
        branch: String,
        starting_point: String,
    },

    DeleteLocalBranch {
        branch: String,
        force: bool,
        #[serde(default)]
        sha: Option<String>,
    },

    Fetch,

    /// Rebase the current branch onto `branch`
    RebaseBranch {
        branch: String,
        #[serde(default)]
        previous_sha: Option<String>,
    },

    AbortRebase,

    ContinueRebase,

    /// Merge `branch` into the current branch
    MergeBranch {
        branch: String,
        #[serde(default)]
        previous_sha: Option<String>,
    },

    AbortMerge,

    ContinueMerge,

    PushBranch {
        branch: String,
        force: bool,
        set_upstream: bool,
    },

    ResetToSha {
        sha: String,
        hard: bool,
    },

    /// Squash-merge `branch` into the current branch as a single commit
    SquashMerge {
        branch: String,
        commit_message: String,
        #[serde(default)]
        author: Option<String>,
    },

    RevertCommit {
        sha: String,
    },

    DiscardOpenChanges,

    StashOpenChanges,

    RestoreOpenChanges,

    /// Merge the branch's proposal through the hosting connector
    ConnectorMergeProposal {
        branch: String,
        number: u64,
        commit_message: String,
        #[serde(default)]
        merge_sha: Option<String>,
    },

    /// Meta-step: drop the remaining steps of the current branch group
    SkipCurrentBranchSteps,

    /// Meta-step: push the current branch once its group has finished
    PushBranchAfterCurrentBranchSteps,
}

impl Step {
    pub fn checkout(branch: impl Into<String>) -> Self {
        Step::Checkout {
            branch: branch.into(),
            previous_branch: None,
        }
    }

    pub fn create_branch(branch: impl Into<String>, starting_point: impl Into<String>) -> Self {
        Step::CreateBranch {
            branch: branch.into(),
            starting_point: starting_point.into(),
        }
    }

    pub fn delete_local_branch(branch: impl Into<String>, force: bool) -> Self {
        Step::DeleteLocalBranch {
            branch: branch.into(),
            force,
            sha: None,
        }
    }

    pub fn rebase(branch: impl Into<String>) -> Self {
        Step::RebaseBranch {
            branch: branch.into(),
            previous_sha: None,
        }
    }

    pub fn merge(branch: impl Into<String>) -> Self {
        Step::MergeBranch {
            branch: branch.into(),
            previous_sha: None,
        }
    }

    pub fn push(branch: impl Into<String>) -> Self {
        Step::PushBranch {
            branch: branch.into(),
            force: false,
            set_upstream: false,
        }
    }

    pub fn push_new(branch: impl Into<String>) -> Self {
        Step::PushBranch {
            branch: branch.into(),
            force: false,
            set_upstream: true,
        }
    }

    /// Checkouts delimit branch groups
    pub fn is_checkout(&self) -> bool {
        matches!(self, Step::Checkout { .. })
    }

    pub fn is_meta(&self) -> bool {
        matches!(
            self,
            Step::SkipCurrentBranchSteps | Step::PushBranchAfterCurrentBranchSteps
        )
    }

    /// Perform the step's side effects.
    ///
    /// Steps that need pre-state for their undo counterpart record it here.
    pub async fn run(
        &mut self,
        backend: &dyn Backend,
        connector: Option<&dyn Connector>,
    ) -> Result<(), StepError> {
        match self {
            Step::Empty => Ok(()),
            Step::Checkout {
                branch,
                previous_branch,
            } => {
                let current = backend.current_branch().await?;
                let needs_checkout = current != *branch;
                *previous_branch = Some(current);
                if needs_checkout {
                    backend.checkout_branch(branch).await?;
                }
                Ok(())
            }
            Step::CreateBranch {
                branch,
                starting_point,
            } => Ok(backend.create_branch(branch, starting_point).await?),
            Step::DeleteLocalBranch { branch, force, sha } => {
                *sha = Some(backend.sha_for_branch(branch).await?);
                Ok(backend.delete_local_branch(branch, *force).await?)
            }
            Step::Fetch => Ok(backend.fetch().await?),
            Step::RebaseBranch {
                branch,
                previous_sha,
            } => {
                *previous_sha = Some(backend.current_sha().await?);
                Ok(backend.rebase(branch).await?)
            }
            Step::AbortRebase => {
                if backend.is_rebase_in_progress().await? {
                    backend.abort_rebase().await?;
                }
                Ok(())
            }
            Step::ContinueRebase => {
                if backend.is_rebase_in_progress().await? {
                    backend.continue_rebase().await?;
                }
                Ok(())
            }
            Step::MergeBranch {
                branch,
                previous_sha,
            } => {
                *previous_sha = Some(backend.current_sha().await?);
                Ok(backend.merge_no_edit(branch).await?)
            }
            Step::AbortMerge => {
                if backend.is_merge_in_progress().await? {
                    backend.abort_merge().await?;
                }
                Ok(())
            }
            Step::ContinueMerge => {
                if backend.is_merge_in_progress().await? {
                    backend.commit_no_edit().await?;
                }
                Ok(())
            }
            Step::PushBranch {
                branch,
                force,
                set_upstream,
            } => Ok(backend.push_branch(branch, *force, *set_upstream).await?),
            Step::ResetToSha { sha, hard } => Ok(backend.reset_to_sha(sha, *hard).await?),
            Step::SquashMerge {
                branch,
                commit_message,
                author,
            } => {
                backend.squash_merge(branch).await?;
                Ok(backend.commit(commit_message, author.as_deref()).await?)
            }
            Step::RevertCommit { sha } => Ok(backend.revert_commit(sha).await?),
            Step::DiscardOpenChanges => Ok(backend.discard_open_changes().await?),
            Step::StashOpenChanges => Ok(backend.stash().await?),
            Step::RestoreOpenChanges => Ok(backend.pop_stash().await?),
            Step::ConnectorMergeProposal {
                number,
                commit_message,
                merge_sha,
                ..
            } => {
                let connector = connector.ok_or(StepError::NoConnector)?;
                *merge_sha = Some(
                    connector
                        .squash_merge_proposal(*number, commit_message)
                        .await?,
                );
                Ok(())
            }
            Step::SkipCurrentBranchSteps => {
                Err(StepError::MetaStep("skip current branch".to_string()))
            }
            Step::PushBranchAfterCurrentBranchSteps => Err(StepError::MetaStep(
                "push branch after current branch".to_string(),
            )),
        }
    }

    /// Step that cleans up this step's partial side effects when the workflow is aborted
    pub fn create_abort_step(&self) -> Step {
        match self {
            Step::RebaseBranch { .. } => Step::AbortRebase,
            Step::MergeBranch { .. } => Step::AbortMerge,
            Step::SquashMerge { .. } => Step::DiscardOpenChanges,
            Step::RestoreOpenChanges => Step::DiscardOpenChanges,
            Step::Empty
            | Step::Checkout { .. }
            | Step::CreateBranch { .. }
            | Step::DeleteLocalBranch { .. }
            | Step::Fetch
            | Step::AbortRebase
            | Step::ContinueRebase
            | Step::AbortMerge
            | Step::ContinueMerge
            | Step::PushBranch { .. }
            | Step::ResetToSha { .. }
            | Step::RevertCommit { .. }
            | Step::DiscardOpenChanges
            | Step::StashOpenChanges
            | Step::ConnectorMergeProposal { .. }
            | Step::SkipCurrentBranchSteps
            | Step::PushBranchAfterCurrentBranchSteps => Step::Empty,
        }
    }

    /// Step that resumes work after a human resolved the cause of this step's failure
    pub fn create_continue_step(&self) -> Step {
        match self {
            Step::RebaseBranch { .. } => Step::ContinueRebase,
            Step::MergeBranch { .. } => Step::ContinueMerge,
            Step::Empty
            | Step::Checkout { .. }
            | Step::CreateBranch { .. }
            | Step::DeleteLocalBranch { .. }
            | Step::Fetch
            | Step::AbortRebase
            | Step::ContinueRebase
            | Step::AbortMerge
            | Step::ContinueMerge
            | Step::PushBranch { .. }
            | Step::ResetToSha { .. }
            | Step::SquashMerge { .. }
            | Step::RevertCommit { .. }
            | Step::DiscardOpenChanges
            | Step::StashOpenChanges
            | Step::RestoreOpenChanges
            | Step::ConnectorMergeProposal { .. }
            | Step::SkipCurrentBranchSteps
            | Step::PushBranchAfterCurrentBranchSteps => Step::Empty,
        }
    }

    /// Step reversing this step's effect; called after a successful run
    pub async fn create_undo_step(&self, backend: &dyn Backend) -> Result<Step, StepError> {
        match self {
            Step::Checkout {
                previous_branch, ..
            } => {
                let previous = previous_branch
                    .clone()
                    .ok_or_else(|| self.undo_unavailable("previous branch unknown"))?;
                Ok(Step::checkout(previous))
            }
            Step::CreateBranch { branch, .. } => Ok(Step::delete_local_branch(branch.clone(), true)),
            Step::DeleteLocalBranch { branch, sha, .. } => {
                let sha = sha
                    .clone()
                    .ok_or_else(|| self.undo_unavailable("branch sha unknown"))?;
                Ok(Step::create_branch(branch.clone(), sha))
            }
            Step::RebaseBranch { previous_sha, .. } | Step::MergeBranch { previous_sha, .. } => {
                let sha = previous_sha
                    .clone()
                    .ok_or_else(|| self.undo_unavailable("previous sha unknown"))?;
                Ok(Step::ResetToSha { sha, hard: true })
            }
            Step::SquashMerge { .. } => Ok(Step::RevertCommit {
                sha: backend.current_sha().await?,
            }),
            Step::ConnectorMergeProposal { merge_sha, .. } => {
                let sha = merge_sha
                    .clone()
                    .ok_or_else(|| self.undo_unavailable("merge sha unknown"))?;
                Ok(Step::RevertCommit { sha })
            }
            Step::StashOpenChanges => Ok(Step::RestoreOpenChanges),
            Step::RestoreOpenChanges => Ok(Step::StashOpenChanges),
            Step::Empty
            | Step::Fetch
            | Step::AbortRebase
            | Step::ContinueRebase
            | Step::AbortMerge
            | Step::ContinueMerge
            | Step::PushBranch { .. }
            | Step::ResetToSha { .. }
            | Step::RevertCommit { .. }
            | Step::DiscardOpenChanges
            | Step::SkipCurrentBranchSteps
            | Step::PushBranchAfterCurrentBranchSteps => Ok(Step::Empty),
        }
    }

    /// Whether a failure cascades into an automatic abort instead of pausing
    pub fn should_automatically_abort_on_error(&self) -> bool {
        !self.automatic_abort_error_message().is_empty()
    }

    pub fn automatic_abort_error_message(&self) -> &'static str {
        match self {
            Step::SquashMerge { .. } => "aborted because commit exited with error",
            Step::RestoreOpenChanges => {
                "conflicts between your uncommitted changes and the main branch"
            }
            Step::ConnectorMergeProposal { .. } => "aborted because merge exited with error",
            Step::Empty
            | Step::Checkout { .. }
            | Step::CreateBranch { .. }
            | Step::DeleteLocalBranch { .. }
            | Step::Fetch
            | Step::RebaseBranch { .. }
            | Step::AbortRebase
            | Step::ContinueRebase
            | Step::MergeBranch { .. }
            | Step::AbortMerge
            | Step::ContinueMerge
            | Step::PushBranch { .. }
            | Step::ResetToSha { .. }
            | Step::RevertCommit { .. }
            | Step::DiscardOpenChanges
            | Step::StashOpenChanges
            | Step::SkipCurrentBranchSteps
            | Step::PushBranchAfterCurrentBranchSteps => "",
        }
    }

    fn undo_unavailable(&self, reason: &'static str) -> StepError {
        StepError::UndoUnavailable {
            step: self.to_string(),
            reason,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Empty => write!(f, "(no-op)"),
            Step::Checkout { branch, .. } => write!(f, "checkout {}", branch),
            Step::CreateBranch {
                branch,
                starting_point,
            } => write!(f, "create branch {} from {}", branch, starting_point),
            Step::DeleteLocalBranch { branch, .. } => write!(f, "delete branch {}", branch),
            Step::Fetch => write!(f, "fetch"),
            Step::RebaseBranch { branch, .. } => write!(f, "rebase onto {}", branch),
            Step::AbortRebase => write!(f, "abort rebase"),
            Step::ContinueRebase => write!(f, "continue rebase"),
            Step::MergeBranch { branch, .. } => write!(f, "merge {}", branch),
            Step::AbortMerge => write!(f, "abort merge"),
            Step::ContinueMerge => write!(f, "continue merge"),
            Step::PushBranch { branch, force, .. } => {
                if *force {
                    write!(f, "force-push {}", branch)
                } else {
                    write!(f, "push {}", branch)
                }
            }
            Step::ResetToSha { sha, .. } => write!(f, "reset to {}", sha),
            Step::SquashMerge { branch, .. } => write!(f, "squash-merge {}", branch),
            Step::RevertCommit { sha } => write!(f, "revert {}", sha),
            Step::DiscardOpenChanges => write!(f, "discard open changes"),
            Step::StashOpenChanges => write!(f, "stash open changes"),
            Step::RestoreOpenChanges => write!(f, "restore open changes"),
            Step::ConnectorMergeProposal { branch, number, .. } => {
                write!(f, "merge proposal #{} ({})", number, branch)
            }
            Step::SkipCurrentBranchSteps => write!(f, "skip current branch"),
            Step::PushBranchAfterCurrentBranchSteps => {
                write!(f, "push branch after current branch")
            }
        }
    }
}
