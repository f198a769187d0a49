//! `hack`: start a new feature branch

use tracing::instrument;

use crate::config::Config;
use crate::engine::{RunOutcome, RunState};
use crate::git::Backend;
use crate::steps::{Step, StepList, WrapOptions};

use super::{CommandError, Session};

/// Steps creating `branch` off an up-to-date main branch and checking it out
pub async fn plan_hack(
    backend: &dyn Backend,
    config: &Config,
    branch: &str,
) -> Result<StepList, CommandError> {
    if backend.has_branch(branch).await? {
        return Err(CommandError::BranchExists(branch.to_string()));
    }
    let main = config.main_branch.as_str();
    let has_remote = backend.has_remote().await?;

    let mut steps = StepList::new();
    steps.append(Step::checkout(main));
    if has_remote {
        steps.append(Step::Fetch);
        if backend.has_tracking_branch(main).await? {
            steps.append(Step::rebase(backend.tracking_branch(main)));
        }
    }
    steps.append(Step::create_branch(branch, main));
    steps.append(Step::checkout(branch));
    if has_remote && config.push_new_branches {
        steps.append(Step::push_new(branch));
    }

    steps.wrap(WrapOptions {
        stash_open_changes: backend.has_open_changes().await?,
        return_to_branch: None,
    });
    Ok(steps)
}

#[instrument(skip(session))]
pub async fn hack(session: &Session<'_>, branch: &str) -> Result<RunOutcome, CommandError> {
    session.ensure_no_unfinished_run()?;
    let steps = plan_hack(session.backend, session.config, branch).await?;
    session.run_new(RunState::new("hack", steps)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::InMemoryBackend;

    #[tokio::test]
    async fn test_plan_without_remote() {
        let backend = InMemoryBackend::new("main");
        let steps = plan_hack(&backend, &Config::default(), "feature")
            .await
            .unwrap();

        assert_eq!(
            steps.into_iter().collect::<Vec<_>>(),
            vec![
                Step::checkout("main"),
                Step::create_branch("feature", "main"),
                Step::checkout("feature"),
            ]
        );
    }

    #[tokio::test]
    async fn test_plan_with_remote_and_open_changes() {
        let backend = InMemoryBackend::new("main").with_remote().with_open_changes();
        let config = Config {
            push_new_branches: true,
            ..Config::default()
        };

        let steps: Vec<_> = plan_hack(&backend, &config, "feature")
            .await
            .unwrap()
            .into_iter()
            .collect();

        assert_eq!(
            steps,
            vec![
                Step::StashOpenChanges,
                Step::checkout("main"),
                Step::Fetch,
                Step::rebase("origin/main"),
                Step::create_branch("feature", "main"),
                Step::checkout("feature"),
                Step::push_new("feature"),
                Step::RestoreOpenChanges,
            ]
        );
    }

    #[tokio::test]
    async fn test_existing_branch_is_refused() {
        let backend = InMemoryBackend::new("main").with_branch("feature");
        let err = plan_hack(&backend, &Config::default(), "feature")
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::BranchExists(b) if b == "feature"));
    }
}
