//! # gitstep
//!
//! Multi-step git workflows that can be paused, resumed, skipped, aborted and
//! undone.
//!
//! ## Features
//!
//! - **Step interpreter** - Workflows are plans of atomic, reversible steps
//! - **Pause and resume** - A conflicting merge pauses the run; the state survives the process
//! - **Automatic abort** - Unrecoverable failures roll back everything done so far
//! - **Undo** - Every finished run records the inverse of each step
//!
//! ## Layers
//!
//! - **process**: runs external programs and renders diagnostics
//! - **git**: the [`Backend`] trait with a real and an in-memory implementation
//! - **hosting**: optional pull request [`Connector`] (GitHub)
//! - **steps**: the [`Step`] catalog and [`StepList`]
//! - **engine**: [`RunState`], the [`Engine`] loop and snapshot persistence
//! - **commands**: `hack`, `sync`, `ship` and the recovery entry points
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gitstep::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let backend = InMemoryBackend::new("main").with_branch("feature");
//!     let store = RunStateStore::new(std::env::temp_dir().join("gitstep-demo.json"));
//!
//!     let steps = StepList::from(vec![Step::checkout("feature"), Step::merge("main")]);
//!     let outcome = Engine::new(&backend, &store)
//!         .run(RunState::new("sync", steps))
//!         .await?;
//!
//!     println!("finished: {}", outcome.is_finished());
//!     Ok(())
//! }
//! ```

pub mod commands;
pub mod config;
pub mod engine;
pub mod git;
pub mod hosting;
pub mod process;
pub mod steps;

// Re-export main types
pub use commands::{CommandError, Session, ShipOptions, StatusReport};
pub use config::{Config, ConfigError, HostingConfig, HostingPlatform};
pub use engine::{
    Engine, EngineError, PersistenceError, RunOutcome, RunState, RunStateStore, SkipPolicy,
    UnfinishedDetails,
};
pub use git::{Backend, GitBackend, GitError, InMemoryBackend};
pub use hosting::{Connector, ConnectorError, GitHubConnector, Proposal};
pub use process::{BackendRunner, ProcessError, Statistics};
pub use steps::{Step, StepError, StepList, WrapOptions};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::commands::{self, CommandError, Session, ShipOptions};
    pub use crate::config::Config;
    pub use crate::engine::{Engine, RunOutcome, RunState, RunStateStore, SkipPolicy};
    pub use crate::git::{Backend, GitBackend, InMemoryBackend};
    pub use crate::hosting::{Connector, GitHubConnector};
    pub use crate::process::BackendRunner;
    pub use crate::steps::{Step, StepList};
}
