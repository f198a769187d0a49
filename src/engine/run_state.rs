//! Run state - the unit of persistence and recovery
//!
//! A [`RunState`] holds three independent step lists:
//! - `run_steps` - what still has to execute
//! - `abort_steps` - counterparts of failed steps, filled while running
//! - `undo_steps` - inverse of everything executed so far, newest first
//!
//! Abort, skip and undo each derive a fresh run state from a persisted one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::steps::{Step, StepList};

/// Bookkeeping of a run that paused on a failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnfinishedDetails {
    /// Whether skipping the current branch group is allowed
    pub can_skip: bool,

    /// Branch checked out when the run paused
    pub end_branch: String,

    pub end_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunState {
    pub run_id: String,

    /// Name of the workflow command that created this state
    pub command: String,

    #[serde(default)]
    pub is_abort_run: bool,

    #[serde(default)]
    pub is_undo_run: bool,

    pub run_steps: StepList,

    #[serde(default)]
    pub abort_steps: StepList,

    #[serde(default)]
    pub undo_steps: StepList,

    #[serde(default)]
    pub unfinished_details: Option<UnfinishedDetails>,
}

impl RunState {
    pub fn new(command: impl Into<String>, run_steps: StepList) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            command: command.into(),
            is_abort_run: false,
            is_undo_run: false,
            run_steps,
            abort_steps: StepList::new(),
            undo_steps: StepList::new(),
            unfinished_details: None,
        }
    }

    /// Abort mode: run the abort steps, then roll back what already happened
    pub fn create_abort_run_state(&self) -> RunState {
        let mut run_steps = self.abort_steps.clone();
        run_steps.append_list(self.undo_steps.clone());
        RunState {
            is_abort_run: true,
            ..RunState::new(self.command.clone(), run_steps)
        }
    }

    /// Abort the failed step, drop the rest of the current branch group, carry on
    pub fn create_skip_run_state(&self) -> RunState {
        let mut run_steps = self.abort_steps.clone();
        run_steps.append(Step::SkipCurrentBranchSteps);
        run_steps.append_list(self.run_steps.clone());
        RunState {
            undo_steps: self.undo_steps.clone(),
            ..RunState::new(self.command.clone(), run_steps)
        }
    }

    /// Undo mode: replay the undo steps of a finished run
    pub fn create_undo_run_state(&self) -> RunState {
        RunState {
            is_undo_run: true,
            ..RunState::new(self.command.clone(), self.undo_steps.clone())
        }
    }

    /// Remove the remaining steps of the current branch group; returns how many were dropped
    pub fn skip_current_branch_steps(&mut self) -> usize {
        let count = self.run_steps.current_branch_group_len();
        for _ in 0..count {
            self.run_steps.pop();
        }
        count
    }

    /// Queue a push of `branch` right after the remaining steps of the current branch group
    pub fn add_push_branch_step_after_current_branch_steps(&mut self, branch: &str) {
        let mut group = StepList::new();
        for _ in 0..self.run_steps.current_branch_group_len() {
            if let Some(step) = self.run_steps.pop() {
                group.append(step);
            }
        }
        self.run_steps.prepend(Step::push_new(branch));
        self.run_steps.prepend_list(group);
    }

    pub fn mark_as_finished(&mut self) {
        self.unfinished_details = None;
    }

    pub fn mark_as_unfinished(&mut self, end_branch: impl Into<String>, can_skip: bool) {
        self.unfinished_details = Some(UnfinishedDetails {
            can_skip,
            end_branch: end_branch.into(),
            end_time: Utc::now(),
        });
    }

    pub fn is_unfinished(&self) -> bool {
        self.unfinished_details.is_some()
    }

    pub fn can_skip(&self) -> bool {
        self.unfinished_details
            .as_ref()
            .map(|d| d.can_skip)
            .unwrap_or(false)
    }

    pub fn has_undo_steps(&self) -> bool {
        self.undo_steps.iter().any(|s| *s != Step::Empty)
    }

    /// Abort and undo runs never pause and never abort automatically
    pub fn is_recovery_run(&self) -> bool {
        self.is_abort_run || self.is_undo_run
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steps(list: &StepList) -> Vec<Step> {
        list.iter().cloned().collect()
    }

    #[test]
    fn test_skip_current_branch_steps() {
        let mut state = RunState::new(
            "sync",
            StepList::from(vec![
                Step::merge("main"),
                Step::push("feature-x"),
                Step::checkout("feature-y"),
                Step::merge("main"),
            ]),
        );

        assert_eq!(state.skip_current_branch_steps(), 2);
        assert_eq!(
            steps(&state.run_steps),
            vec![Step::checkout("feature-y"), Step::merge("main")]
        );
    }

    #[test]
    fn test_skip_without_following_group_drains_list() {
        let mut state = RunState::new("sync", StepList::from(vec![Step::merge("main")]));
        state.skip_current_branch_steps();
        assert!(state.run_steps.is_empty());
    }

    #[test]
    fn test_add_push_after_current_branch_steps() {
        let mut state = RunState::new(
            "sync",
            StepList::from(vec![
                Step::merge("main"),
                Step::checkout("feature-y"),
            ]),
        );

        state.add_push_branch_step_after_current_branch_steps("feature-x");

        assert_eq!(
            steps(&state.run_steps),
            vec![
                Step::merge("main"),
                Step::push_new("feature-x"),
                Step::checkout("feature-y"),
            ]
        );
    }

    #[test]
    fn test_add_push_at_end_of_list() {
        let mut state = RunState::new("sync", StepList::from(vec![Step::merge("main")]));
        state.add_push_branch_step_after_current_branch_steps("feature-x");
        assert_eq!(
            steps(&state.run_steps),
            vec![Step::merge("main"), Step::push_new("feature-x")]
        );
    }

    #[test]
    fn test_abort_run_state_runs_abort_then_undo() {
        let mut state = RunState::new("sync", StepList::from(vec![Step::Fetch]));
        state.abort_steps.append(Step::AbortMerge);
        state.undo_steps.prepend(Step::checkout("main"));

        let abort = state.create_abort_run_state();

        assert!(abort.is_abort_run);
        assert!(!abort.is_undo_run);
        assert_eq!(abort.command, "sync");
        assert_ne!(abort.run_id, state.run_id);
        assert_eq!(
            steps(&abort.run_steps),
            vec![Step::AbortMerge, Step::checkout("main")]
        );
        assert!(abort.abort_steps.is_empty());
    }

    #[test]
    fn test_skip_run_state() {
        let mut state = RunState::new(
            "sync",
            StepList::from(vec![
                Step::ContinueMerge,
                Step::push("feature-x"),
                Step::checkout("feature-y"),
            ]),
        );
        state.abort_steps.append(Step::AbortMerge);
        state.undo_steps.prepend(Step::checkout("main"));
        state.mark_as_unfinished("feature-x", true);

        let skip = state.create_skip_run_state();

        assert!(!skip.is_recovery_run());
        assert!(!skip.is_unfinished());
        assert_eq!(
            steps(&skip.run_steps),
            vec![
                Step::AbortMerge,
                Step::SkipCurrentBranchSteps,
                Step::ContinueMerge,
                Step::push("feature-x"),
                Step::checkout("feature-y"),
            ]
        );
        assert_eq!(steps(&skip.undo_steps), vec![Step::checkout("main")]);
    }

    #[test]
    fn test_undo_run_state() {
        let mut state = RunState::new("hack", StepList::new());
        state.undo_steps.prepend(Step::checkout("main"));
        state.undo_steps.prepend(Step::delete_local_branch("feature", true));

        let undo = state.create_undo_run_state();

        assert!(undo.is_undo_run);
        assert_eq!(
            steps(&undo.run_steps),
            vec![
                Step::delete_local_branch("feature", true),
                Step::checkout("main")
            ]
        );
    }

    #[test]
    fn test_unfinished_bookkeeping() {
        let mut state = RunState::new("sync", StepList::new());
        assert!(!state.is_unfinished());
        assert!(!state.can_skip());

        state.mark_as_unfinished("feature", true);
        assert!(state.is_unfinished());
        assert!(state.can_skip());
        assert_eq!(
            state.unfinished_details.as_ref().unwrap().end_branch,
            "feature"
        );

        state.mark_as_finished();
        assert!(!state.is_unfinished());
    }

    #[test]
    fn test_has_undo_steps_ignores_no_ops() {
        let mut state = RunState::new("sync", StepList::new());
        state.undo_steps.prepend(Step::Empty);
        assert!(!state.has_undo_steps());

        state.undo_steps.prepend(Step::checkout("main"));
        assert!(state.has_undo_steps());
    }
}
