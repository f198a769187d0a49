//! Git backend error types

use crate::process::ProcessError;

#[derive(Debug, thiserror::Error)]
pub enum GitError {
    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unexpected git output: {0}")]
    UnexpectedOutput(String),

    #[error("branch not found: {0}")]
    BranchNotFound(String),

    #[error("{0}")]
    Rejected(String),
}
