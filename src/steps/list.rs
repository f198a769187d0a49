//! Ordered step sequences

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::Step;

/// FIFO list of steps with head and tail insertion
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepList {
    steps: VecDeque<Step>,
}

/// How to surround a planned step list before running it
#[derive(Debug, Clone, Default)]
pub struct WrapOptions {
    /// Stash uncommitted changes first and restore them at the end
    pub stash_open_changes: bool,

    /// Check this branch out again once the plan is done
    pub return_to_branch: Option<String>,
}

impl StepList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return the head
    pub fn pop(&mut self) -> Option<Step> {
        self.steps.pop_front()
    }

    pub fn peek(&self) -> Option<&Step> {
        self.steps.front()
    }

    pub fn prepend(&mut self, step: Step) {
        self.steps.push_front(step);
    }

    /// Insert all steps of `other` at the head, keeping their order
    pub fn prepend_list(&mut self, other: StepList) {
        for step in other.steps.into_iter().rev() {
            self.steps.push_front(step);
        }
    }

    pub fn append(&mut self, step: Step) {
        self.steps.push_back(step);
    }

    pub fn append_list(&mut self, other: StepList) {
        self.steps.extend(other.steps);
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Step> {
        self.steps.iter()
    }

    /// Number of leading steps before the next branch group starts
    pub fn current_branch_group_len(&self) -> usize {
        self.steps.iter().take_while(|s| !s.is_checkout()).count()
    }

    pub fn wrap(&mut self, options: WrapOptions) {
        if let Some(branch) = options.return_to_branch {
            self.append(Step::checkout(branch));
        }
        if options.stash_open_changes {
            self.prepend(Step::StashOpenChanges);
            self.append(Step::RestoreOpenChanges);
        }
    }
}

impl From<Vec<Step>> for StepList {
    fn from(steps: Vec<Step>) -> Self {
        Self {
            steps: steps.into(),
        }
    }
}

impl FromIterator<Step> for StepList {
    fn from_iter<I: IntoIterator<Item = Step>>(iter: I) -> Self {
        Self {
            steps: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for StepList {
    type Item = Step;
    type IntoIter = std::collections::vec_deque::IntoIter<Step>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.into_iter()
    }
}
