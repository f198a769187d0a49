//! Engine error types

use crate::git::GitError;
use crate::steps::StepError;

use super::persistence::PersistenceError;

/// Hard failures of a run; pauses and automatic aborts are outcomes, not errors
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("cannot determine undo step for `{step}`: {source}")]
    UndoDerivation {
        step: String,
        #[source]
        source: StepError,
    },

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("automatic abort failed, the repository needs a manual fix: {0}")]
    CascadingAbort(#[source] Box<EngineError>),

    #[error("{mode} step `{step}` failed, the repository needs a manual fix: {source}")]
    RecoveryStepFailed {
        step: String,
        mode: &'static str,
        #[source]
        source: StepError,
    },

    #[error("Backend error: {0}")]
    Backend(#[from] GitError),
}
