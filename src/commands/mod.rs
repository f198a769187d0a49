//! Workflow commands
//!
//! Planners turn a request into a [`StepList`](crate::steps::StepList) and hand it
//! to the engine; recovery entry points reload the persisted run state instead.
//! - `hack` - create a feature branch off the main branch
//! - `sync` - bring feature branches up to date with the main branch
//! - `ship` - squash a feature branch into the main branch
//! - `recovery` - continue, skip, abort, undo and status

pub mod hack;
pub mod recovery;
pub mod ship;
pub mod sync;

pub use hack::{hack, plan_hack};
pub use recovery::{abort_run, continue_run, skip_run, status, undo_run, StatusReport};
pub use ship::{plan_ship, select_squash_commit_author, ship, ShipOptions};
pub use sync::{plan_sync, sync};

use tracing::info;

use crate::config::Config;
use crate::engine::{Engine, EngineError, PersistenceError, RunOutcome, RunState, RunStateStore};
use crate::git::{Backend, GitError};
use crate::hosting::{Connector, ConnectorError};

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Connector(#[from] ConnectorError),

    #[error("you have an unfinished `{command}` command that ended on the `{end_branch}` branch; run \"gitstep continue\", \"gitstep skip\" or \"gitstep abort\" first")]
    UnfinishedRun { command: String, end_branch: String },

    #[error("nothing to {0}")]
    NothingTo(&'static str),

    #[error("you must resolve the conflicts before continuing")]
    ConflictsRemain,

    #[error("the `{0}` command cannot be skipped at this point")]
    CannotSkip(String),

    #[error("a branch named `{0}` already exists")]
    BranchExists(String),

    #[error("there is no branch named `{0}`")]
    NoSuchBranch(String),

    #[error("the main branch `{0}` cannot be shipped")]
    CannotShipMain(String),

    #[error("you have uncommitted changes; commit or stash them before shipping")]
    OpenChanges,

    #[error("a commit message is required, pass it with -m")]
    MissingCommitMessage,

    #[error("multiple people authored the `{branch}` branch ({}); choose one with --author", .authors.join(", "))]
    SquashAuthorRequired {
        branch: String,
        authors: Vec<String>,
    },

    #[error("`{author}` did not author the `{branch}` branch")]
    UnknownAuthor { branch: String, author: String },
}

/// Everything a command needs to plan and run a workflow
pub struct Session<'a> {
    pub backend: &'a dyn Backend,
    pub connector: Option<&'a dyn Connector>,
    pub store: &'a RunStateStore,
    pub config: &'a Config,
}

impl<'a> Session<'a> {
    pub fn new(backend: &'a dyn Backend, store: &'a RunStateStore, config: &'a Config) -> Self {
        Self {
            backend,
            connector: None,
            store,
            config,
        }
    }

    pub fn with_connector(mut self, connector: Option<&'a dyn Connector>) -> Self {
        self.connector = connector;
        self
    }

    pub fn engine(&self) -> Engine<'a> {
        Engine::new(self.backend, self.store)
            .with_connector(self.connector)
            .with_skip_policy(self.config.skip_policy())
    }

    /// Refuse to start a new workflow while a paused one exists
    pub fn ensure_no_unfinished_run(&self) -> Result<(), CommandError> {
        match self.store.load()? {
            Some(state) if state.is_unfinished() => Err(CommandError::UnfinishedRun {
                end_branch: state
                    .unfinished_details
                    .map(|d| d.end_branch)
                    .unwrap_or_default(),
                command: state.command,
            }),
            _ => Ok(()),
        }
    }

    pub(crate) async fn run_new(&self, state: RunState) -> Result<RunOutcome, CommandError> {
        info!(command = %state.command, steps = state.run_steps.len(), "Starting workflow");
        Ok(self.engine().run(state).await?)
    }
}
