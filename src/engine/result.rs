//! Engine outcomes

use crate::steps::StepError;

use super::run_state::RunState;

/// How a run ended when no hard error occurred
#[derive(Debug)]
pub enum RunOutcome {
    /// Every step ran; the state carries the undo-list of the run
    Finished(RunState),

    /// A step failed and waits for continue, skip or abort
    Paused { state: RunState, error: StepError },

    /// A step failed, the abort-list ran to completion
    AutomaticallyAborted {
        message: &'static str,
        error: StepError,
    },
}

impl RunOutcome {
    pub fn is_finished(&self) -> bool {
        matches!(self, RunOutcome::Finished(_))
    }

    /// Process exit status the binary reports for this outcome
    pub fn exit_code(&self) -> u8 {
        match self {
            RunOutcome::Finished(_) => 0,
            RunOutcome::Paused { .. } | RunOutcome::AutomaticallyAborted { .. } => 1,
        }
    }
}
