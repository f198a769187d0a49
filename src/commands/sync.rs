//! `sync`: update feature branches with their tracking branch and the main branch

use tracing::instrument;

use crate::config::Config;
use crate::engine::{RunOutcome, RunState};
use crate::git::Backend;
use crate::steps::{Step, StepList, WrapOptions};

use super::{CommandError, Session};

/// One branch group per synced branch, main branch first.
///
/// With `all` every local feature branch is synced, otherwise only the
/// current one. The plan returns to the branch that was checked out initially.
pub async fn plan_sync(
    backend: &dyn Backend,
    config: &Config,
    all: bool,
) -> Result<StepList, CommandError> {
    let main = config.main_branch.as_str();
    let initial = backend.current_branch().await?;
    let has_remote = backend.has_remote().await?;

    let feature_branches: Vec<String> = if all {
        backend
            .local_branches()
            .await?
            .into_iter()
            .filter(|b| !config.is_main_branch(b))
            .collect()
    } else if config.is_main_branch(&initial) {
        Vec::new()
    } else {
        vec![initial.clone()]
    };

    let mut steps = StepList::new();
    if has_remote {
        steps.append(Step::Fetch);
    }

    steps.append(Step::checkout(main));
    if has_remote && backend.has_tracking_branch(main).await? {
        steps.append(Step::rebase(backend.tracking_branch(main)));
        steps.append(Step::push(main));
    }

    for branch in &feature_branches {
        let tracked = has_remote && backend.has_tracking_branch(branch).await?;
        steps.append(Step::checkout(branch.as_str()));
        if !tracked && has_remote && config.push_new_branches {
            steps.append(Step::PushBranchAfterCurrentBranchSteps);
        }
        if tracked {
            steps.append(Step::merge(backend.tracking_branch(branch)));
        }
        steps.append(Step::merge(main));
        if tracked {
            steps.append(Step::push(branch.as_str()));
        }
    }

    steps.wrap(WrapOptions {
        stash_open_changes: backend.has_open_changes().await?,
        return_to_branch: Some(initial),
    });
    Ok(steps)
}

#[instrument(skip(session))]
pub async fn sync(session: &Session<'_>, all: bool) -> Result<RunOutcome, CommandError> {
    session.ensure_no_unfinished_run()?;
    let steps = plan_sync(session.backend, session.config, all).await?;
    session.run_new(RunState::new("sync", steps)).await
}
