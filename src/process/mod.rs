//! Process execution
//!
//! This module contains:
//! - `runner` - The backend runner that spawns external programs
//! - `error` - Diagnostic error types for failed invocations
//! - `stats` - Invocation counter

pub mod error;
pub mod runner;
pub mod stats;

pub use error::{FailureReason, ProcessError};
pub use runner::{strip_ansi, BackendRunner};
pub use stats::Statistics;
