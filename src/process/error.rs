//! Process execution error types

use std::process::ExitStatus;

/// Why a spawned program did not complete successfully
#[derive(Debug, thiserror::Error)]
pub enum FailureReason {
    #[error("{0}")]
    Spawn(#[from] std::io::Error),

    #[error("executable not found: {0}")]
    NotFound(#[from] which::Error),

    #[error("{0}")]
    Exit(ExitStatus),
}

/// Errors produced by the [`BackendRunner`](super::BackendRunner)
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    /// A single invocation failed. Renders as a self-contained diagnostic block.
    #[error("{}", render_diagnostic(.executable, .args, .reason, .output))]
    Failed {
        executable: String,
        args: Vec<String>,
        reason: FailureReason,
        output: String,
    },

    #[error("error running command {command:?}: {source}")]
    Sequence {
        command: Vec<String>,
        #[source]
        source: Box<ProcessError>,
    },

    #[error("cannot run an empty command")]
    EmptyCommand,
}

impl ProcessError {
    /// Raw captured output of the failed invocation
    pub fn output(&self) -> &str {
        match self {
            ProcessError::Failed { output, .. } => output,
            ProcessError::Sequence { source, .. } => source.output(),
            ProcessError::EmptyCommand => "",
        }
    }

    /// True when the program ran but exited with a nonzero status.
    ///
    /// Query commands such as `git rev-parse --verify` report "no" this way.
    pub fn is_exit_failure(&self) -> bool {
        match self {
            ProcessError::Failed { reason, .. } => matches!(reason, FailureReason::Exit(_)),
            ProcessError::Sequence { source, .. } => source.is_exit_failure(),
            ProcessError::EmptyCommand => false,
        }
    }
}

fn render_diagnostic(
    executable: &str,
    args: &[String],
    reason: &FailureReason,
    output: &str,
) -> String {
    format!(
        "\n----------------------------------------\n\
         Diagnostic information of failed command\n\n\
         Command: {} {}\n\
         Error: {}\n\
         Output:\n\
         {}\n\
         ----------------------------------------",
        executable,
        args.join(" "),
        reason,
        output
    )
}
