//! Recovery entry points
//!
//! Each one reloads the persisted run state and re-enters the engine in a
//! specific mode. `status` only reports.

use std::fmt;

use tracing::instrument;

use crate::engine::{RunOutcome, RunState};

use super::{CommandError, Session};

fn load_unfinished(session: &Session<'_>, action: &'static str) -> Result<RunState, CommandError> {
    match session.store.load()? {
        Some(state) if state.is_unfinished() => Ok(state),
        _ => Err(CommandError::NothingTo(action)),
    }
}

/// Resume a paused run; its continuation is already at the head of the run-list
#[instrument(skip(session))]
pub async fn continue_run(session: &Session<'_>) -> Result<RunOutcome, CommandError> {
    let state = load_unfinished(session, "continue")?;
    if session.backend.has_conflicts().await? {
        return Err(CommandError::ConflictsRemain);
    }
    Ok(session.engine().run(state).await?)
}

/// Abort the failed step, drop the rest of its branch group and carry on
#[instrument(skip(session))]
pub async fn skip_run(session: &Session<'_>) -> Result<RunOutcome, CommandError> {
    let state = load_unfinished(session, "skip")?;
    if !state.can_skip() {
        return Err(CommandError::CannotSkip(state.command));
    }
    Ok(session.engine().run(state.create_skip_run_state()).await?)
}

/// Abort the paused run and roll back everything it did
#[instrument(skip(session))]
pub async fn abort_run(session: &Session<'_>) -> Result<RunOutcome, CommandError> {
    let state = load_unfinished(session, "abort")?;
    Ok(session.engine().run(state.create_abort_run_state()).await?)
}

/// Revert the last finished run
#[instrument(skip(session))]
pub async fn undo_run(session: &Session<'_>) -> Result<RunOutcome, CommandError> {
    session.ensure_no_unfinished_run()?;
    let state = match session.store.load()? {
        Some(state) if state.has_undo_steps() => state,
        _ => return Err(CommandError::NothingTo("undo")),
    };
    Ok(session.engine().run(state.create_undo_run_state()).await?)
}

/// Summary of the persisted run state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub command: String,
    pub unfinished: bool,
    pub can_skip: bool,
    pub end_branch: Option<String>,
    pub remaining_steps: Vec<String>,
    pub undo_steps: usize,
}

impl From<&RunState> for StatusReport {
    fn from(state: &RunState) -> Self {
        Self {
            command: state.command.clone(),
            unfinished: state.is_unfinished(),
            can_skip: state.can_skip(),
            end_branch: state
                .unfinished_details
                .as_ref()
                .map(|d| d.end_branch.clone()),
            remaining_steps: state.run_steps.iter().map(ToString::to_string).collect(),
            undo_steps: state.undo_steps.len(),
        }
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.unfinished {
            return write!(
                f,
                "The last `{}` command finished ({} undo steps recorded).",
                self.command, self.undo_steps
            );
        }
        writeln!(
            f,
            "The `{}` command is unfinished on the `{}` branch.",
            self.command,
            self.end_branch.as_deref().unwrap_or("?")
        )?;
        writeln!(f, "Remaining steps:")?;
        for step in &self.remaining_steps {
            writeln!(f, "  {}", step)?;
        }
        write!(
            f,
            "Skipping is {}.",
            if self.can_skip { "allowed" } else { "not allowed" }
        )
    }
}

pub fn status(session: &Session<'_>) -> Result<Option<StatusReport>, CommandError> {
    Ok(session.store.load()?.as_ref().map(StatusReport::from))
}
