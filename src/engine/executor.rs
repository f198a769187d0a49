//! Step interpreter
//!
//! [`Engine::run`] drains the run-list of a [`RunState`] one step at a time:
//! 1. An empty run-list finishes the run
//! 2. Meta-steps rewrite the run-list and execute nothing
//! 3. Every successful step records its undo step at the head of the undo-list
//! 4. A failing step either aborts the run automatically or pauses it for a human
//!
//! Abort and undo runs go through the same loop but never pause and never
//! trigger a nested abort: their failures are hard errors.

use futures::future::BoxFuture;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::git::Backend;
use crate::hosting::Connector;
use crate::steps::{Step, StepError};

use super::error::EngineError;
use super::persistence::RunStateStore;
use super::result::RunOutcome;
use super::run_state::RunState;

/// Which commands may offer "skip" after a failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipPolicy {
    pub skippable_commands: Vec<String>,

    /// Skip is withheld while a rebase is in progress on this branch
    pub main_branch: String,
}

impl SkipPolicy {
    pub fn new(skippable_commands: Vec<String>, main_branch: impl Into<String>) -> Self {
        Self {
            skippable_commands,
            main_branch: main_branch.into(),
        }
    }

    pub fn allows_command(&self, command: &str) -> bool {
        self.skippable_commands.iter().any(|c| c == command)
    }
}

impl Default for SkipPolicy {
    fn default() -> Self {
        Self::new(vec!["sync".to_string()], "main")
    }
}

/// Interpreter driving a [`RunState`] against a backend and optional connector
pub struct Engine<'a> {
    backend: &'a dyn Backend,
    connector: Option<&'a dyn Connector>,
    store: &'a RunStateStore,
    skip_policy: SkipPolicy,
}

impl<'a> Engine<'a> {
    pub fn new(backend: &'a dyn Backend, store: &'a RunStateStore) -> Self {
        Self {
            backend,
            connector: None,
            store,
            skip_policy: SkipPolicy::default(),
        }
    }

    pub fn with_connector(mut self, connector: Option<&'a dyn Connector>) -> Self {
        self.connector = connector;
        self
    }

    pub fn with_skip_policy(mut self, skip_policy: SkipPolicy) -> Self {
        self.skip_policy = skip_policy;
        self
    }

    pub fn store(&self) -> &RunStateStore {
        self.store
    }

    /// Run `state` until it finishes, pauses or aborts
    pub fn run(&self, state: RunState) -> BoxFuture<'_, Result<RunOutcome, EngineError>> {
        let span = info_span!(
            "run",
            command = %state.command,
            run_id = %state.run_id,
            abort = state.is_abort_run,
            undo = state.is_undo_run
        );
        Box::pin(self.run_loop(state).instrument(span))
    }

    async fn run_loop(&self, mut state: RunState) -> Result<RunOutcome, EngineError> {
        loop {
            let Some(mut step) = state.run_steps.pop() else {
                return self.finish(state);
            };

            match step {
                Step::SkipCurrentBranchSteps => {
                    let skipped = state.skip_current_branch_steps();
                    debug!(skipped, "Skipped remaining steps of current branch");
                    continue;
                }
                Step::PushBranchAfterCurrentBranchSteps => {
                    let branch = self.backend.current_branch().await?;
                    debug!(branch = %branch, "Queued push after current branch steps");
                    state.add_push_branch_step_after_current_branch_steps(&branch);
                    continue;
                }
                _ => {}
            }

            debug!(step = %step, "Running step");
            match step.run(self.backend, self.connector).await {
                Ok(()) => {
                    let undo = step.create_undo_step(self.backend).await.map_err(|e| {
                        EngineError::UndoDerivation {
                            step: step.to_string(),
                            source: e,
                        }
                    })?;
                    state.undo_steps.prepend(undo);
                }
                Err(error) => return self.handle_failure(state, step, error).await,
            }
        }
    }

    fn finish(&self, mut state: RunState) -> Result<RunOutcome, EngineError> {
        state.mark_as_finished();
        if state.is_recovery_run() {
            self.store.delete()?;
        } else {
            self.store.save(&state)?;
        }
        info!(command = %state.command, "Run finished");
        Ok(RunOutcome::Finished(state))
    }

    async fn handle_failure(
        &self,
        mut state: RunState,
        step: Step,
        error: StepError,
    ) -> Result<RunOutcome, EngineError> {
        if state.is_recovery_run() {
            return Err(EngineError::RecoveryStepFailed {
                step: step.to_string(),
                mode: if state.is_abort_run { "abort" } else { "undo" },
                source: error,
            });
        }

        warn!(step = %step, error = %error, "Step failed");
        state.abort_steps.append(step.create_abort_step());

        if step.should_automatically_abort_on_error() {
            let message = step.automatic_abort_error_message();
            let abort_state = state.create_abort_run_state();
            info!(reason = message, "Aborting automatically");
            // Recovery runs either finish or fail, they never pause
            return match self.run(abort_state).await {
                Ok(_) => Ok(RunOutcome::AutomaticallyAborted { message, error }),
                Err(e) => Err(EngineError::CascadingAbort(Box::new(e))),
            };
        }

        state.run_steps.prepend(step.create_continue_step());
        let current_branch = self.backend.current_branch().await?;
        let can_skip = self.can_skip(&state, &current_branch).await?;
        state.mark_as_unfinished(current_branch, can_skip);
        self.store.save(&state)?;
        info!(can_skip, "Run paused");
        Ok(RunOutcome::Paused { state, error })
    }

    async fn can_skip(&self, state: &RunState, current_branch: &str) -> Result<bool, EngineError> {
        if !self.skip_policy.allows_command(&state.command) {
            return Ok(false);
        }
        let rebasing_main = current_branch == self.skip_policy.main_branch
            && self.backend.is_rebase_in_progress().await?;
        Ok(!rebasing_main)
    }
}
