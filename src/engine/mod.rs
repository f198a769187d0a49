//! Workflow execution engine module
//!
//! This module contains:
//! - `executor` - The step interpreter and skip policy
//! - `run_state` - Run state with its run, abort and undo lists
//! - `persistence` - The per-repository run state snapshot
//! - `error` - Engine error types
//! - `result` - Run outcomes

pub mod error;
pub mod executor;
pub mod persistence;
pub mod result;
pub mod run_state;

pub use error::EngineError;
pub use executor::{Engine, SkipPolicy};
pub use persistence::{PersistenceError, RunStateStore};
pub use result::RunOutcome;
pub use run_state::{RunState, UnfinishedDetails};
