//! `ship`: squash-merge a feature branch into the main branch and delete it

use tracing::{debug, instrument};

use crate::config::Config;
use crate::engine::{RunOutcome, RunState};
use crate::git::Backend;
use crate::hosting::Connector;
use crate::steps::{Step, StepList, WrapOptions};

use super::{CommandError, Session};

#[derive(Debug, Clone, Default)]
pub struct ShipOptions {
    /// Branch to ship; the current branch when absent
    pub branch: Option<String>,

    pub message: Option<String>,

    /// Author of the squash commit when several people worked on the branch
    pub author: Option<String>,
}

/// Pick the author for the squash commit of `branch`.
///
/// A single author is used directly. With several authors one must be chosen
/// explicitly; `chosen` has to be one of them.
pub fn select_squash_commit_author(
    branch: &str,
    authors: &[String],
    chosen: Option<&str>,
) -> Result<Option<String>, CommandError> {
    if let Some(chosen) = chosen {
        if !authors.is_empty() && !authors.iter().any(|a| a == chosen) {
            return Err(CommandError::UnknownAuthor {
                branch: branch.to_string(),
                author: chosen.to_string(),
            });
        }
        return Ok(Some(chosen.to_string()));
    }
    match authors {
        [] => Ok(None),
        [author] => Ok(Some(author.clone())),
        _ => Err(CommandError::SquashAuthorRequired {
            branch: branch.to_string(),
            authors: authors.to_vec(),
        }),
    }
}

pub async fn plan_ship(
    backend: &dyn Backend,
    connector: Option<&dyn Connector>,
    config: &Config,
    options: &ShipOptions,
) -> Result<StepList, CommandError> {
    let main = config.main_branch.as_str();
    let initial = backend.current_branch().await?;
    let branch = options.branch.clone().unwrap_or_else(|| initial.clone());

    if config.is_main_branch(&branch) {
        return Err(CommandError::CannotShipMain(branch));
    }
    if !backend.has_branch(&branch).await? {
        return Err(CommandError::NoSuchBranch(branch));
    }
    if backend.has_open_changes().await? {
        return Err(CommandError::OpenChanges);
    }

    let has_remote = backend.has_remote().await?;
    let main_tracked = has_remote && backend.has_tracking_branch(main).await?;
    let branch_tracked = has_remote && backend.has_tracking_branch(&branch).await?;

    let mut steps = StepList::new();
    if has_remote {
        steps.append(Step::Fetch);
    }
    steps.append(Step::checkout(main));
    if main_tracked {
        steps.append(Step::rebase(backend.tracking_branch(main)));
    }
    steps.append(Step::checkout(branch.as_str()));
    if branch_tracked {
        steps.append(Step::merge(backend.tracking_branch(&branch)));
    }
    steps.append(Step::merge(main));

    let proposal = match connector {
        Some(connector) if branch_tracked => connector.find_proposal(&branch, main).await?,
        _ => None,
    };

    match proposal {
        Some(proposal) => {
            debug!(number = proposal.number, url = %proposal.url, "Shipping through proposal");
            let commit_message = options.message.clone().unwrap_or(proposal.title);
            steps.append(Step::push(branch.as_str()));
            steps.append(Step::ConnectorMergeProposal {
                branch: branch.clone(),
                number: proposal.number,
                commit_message,
                merge_sha: None,
            });
            steps.append(Step::checkout(main));
            steps.append(Step::Fetch);
            if main_tracked {
                steps.append(Step::rebase(backend.tracking_branch(main)));
            }
        }
        None => {
            let commit_message = options
                .message
                .clone()
                .ok_or(CommandError::MissingCommitMessage)?;
            let authors = backend.branch_authors(&branch, main).await?;
            let author =
                select_squash_commit_author(&branch, &authors, options.author.as_deref())?;
            steps.append(Step::checkout(main));
            steps.append(Step::SquashMerge {
                branch: branch.clone(),
                commit_message,
                author,
            });
            if main_tracked {
                steps.append(Step::push(main));
            }
        }
    }
    steps.append(Step::delete_local_branch(branch.as_str(), true));

    steps.wrap(WrapOptions {
        stash_open_changes: false,
        return_to_branch: (initial != branch).then_some(initial),
    });
    Ok(steps)
}

#[instrument(skip(session))]
pub async fn ship(session: &Session<'_>, options: &ShipOptions) -> Result<RunOutcome, CommandError> {
    session.ensure_no_unfinished_run()?;
    let steps = plan_ship(session.backend, session.connector, session.config, options).await?;
    session.run_new(RunState::new("ship", steps)).await
}
