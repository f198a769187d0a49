//! Backend runner - executes shell commands without forwarding output to the CLI
//!
//! Output of stdout and stderr is captured into a single buffer in arrival
//! order, stripped of ANSI color codes and trimmed. Failures carry the full
//! diagnostic context (see [`ProcessError`]).

use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tracing::debug;

use super::error::{FailureReason, ProcessError};
use super::stats::Statistics;

static ANSI_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]|\x1b\][^\x07\x1b]*(\x07|\x1b\\)").unwrap()
});

/// Remove ANSI escape sequences from the given text
pub fn strip_ansi(text: &str) -> Cow<'_, str> {
    ANSI_REGEX.replace_all(text, "")
}

/// Executes external programs and captures their combined output
#[derive(Debug, Clone, Default)]
pub struct BackendRunner {
    /// If set, runs the commands in the given directory.
    /// If not set, runs the commands in the current working directory.
    dir: Option<PathBuf>,

    /// Echo executed commands and their output
    verbose: bool,

    stats: Arc<Statistics>,
}

impl BackendRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    pub fn statistics(&self) -> &Statistics {
        &self.stats
    }

    /// Run the given executable and return its trimmed, color-stripped output
    pub async fn run<S: AsRef<str>>(
        &self,
        executable: &str,
        args: &[S],
    ) -> Result<String, ProcessError> {
        self.stats.register_run();
        let args: Vec<String> = args.iter().map(|a| a.as_ref().to_string()).collect();
        if self.verbose {
            println!("\n(debug) {} {}", executable, args.join(" "));
        }
        debug!(executable, args = ?args, dir = ?self.dir, "Running command");

        let (raw, reason) = match self.spawn_and_capture(executable, &args).await {
            Ok((raw, status)) if status.success() => (raw, None),
            Ok((raw, status)) => (raw, Some(FailureReason::Exit(status))),
            Err(reason) => (Vec::new(), Some(reason)),
        };

        let raw = String::from_utf8_lossy(&raw).to_string();
        let output = strip_ansi(&raw).trim().to_string();
        if self.verbose && !output.is_empty() {
            println!("{}", output);
        }

        match reason {
            None => Ok(output),
            Some(reason) => Err(ProcessError::Failed {
                executable: executable.to_string(),
                args,
                reason,
                output: raw,
            }),
        }
    }

    /// Run all given argv-style commands in order.
    ///
    /// The first failing command aborts the remaining ones.
    pub async fn run_many(&self, commands: &[Vec<String>]) -> Result<(), ProcessError> {
        for argv in commands {
            let (executable, args) = argv.split_first().ok_or(ProcessError::EmptyCommand)?;
            self.run(executable, args)
                .await
                .map_err(|e| ProcessError::Sequence {
                    command: argv.clone(),
                    source: Box::new(e),
                })?;
        }
        Ok(())
    }

    async fn spawn_and_capture(
        &self,
        executable: &str,
        args: &[String],
    ) -> Result<(Vec<u8>, std::process::ExitStatus), FailureReason> {
        let program = which::which(executable)?;
        let mut cmd = Command::new(program);
        cmd.args(args);

        if let Some(dir) = &self.dir {
            cmd.current_dir(dir);
        }

        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd.spawn()?;
        let combined = capture_combined(&mut child).await?;
        let status = child.wait().await?;
        Ok((combined, status))
    }
}

/// Read stdout and stderr into one buffer in the order the chunks arrive
async fn capture_combined(child: &mut Child) -> std::io::Result<Vec<u8>> {
    let mut stdout = child.stdout.take();
    let mut stderr = child.stderr.take();
    let mut combined = Vec::new();
    let mut out_buf = [0u8; 4096];
    let mut err_buf = [0u8; 4096];

    loop {
        let chunk = tokio::select! {
            read = read_chunk(&mut stdout, &mut out_buf), if stdout.is_some() => Chunk::Stdout(read?),
            read = read_chunk(&mut stderr, &mut err_buf), if stderr.is_some() => Chunk::Stderr(read?),
            else => break,
        };

        match chunk {
            Chunk::Stdout(0) => stdout = None,
            Chunk::Stdout(n) => combined.extend_from_slice(&out_buf[..n]),
            Chunk::Stderr(0) => stderr = None,
            Chunk::Stderr(n) => combined.extend_from_slice(&err_buf[..n]),
        }
    }

    Ok(combined)
}

enum Chunk {
    Stdout(usize),
    Stderr(usize),
}

async fn read_chunk<R: AsyncRead + Unpin>(
    reader: &mut Option<R>,
    buf: &mut [u8],
) -> std::io::Result<usize> {
    match reader {
        Some(r) => r.read(buf).await,
        None => Ok(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_ansi() {
        assert_eq!(strip_ansi("\x1b[1;31mred\x1b[0m plain"), "red plain");
        assert_eq!(strip_ansi("no color"), "no color");
    }

    #[tokio::test]
    async fn test_run_trims_output() {
        let runner = BackendRunner::new();
        let output = runner.run("echo", &["  hello  "]).await.unwrap();
        assert_eq!(output, "hello");
    }

    #[tokio::test]
    async fn test_run_combines_stdout_and_stderr() {
        let runner = BackendRunner::new();
        let output = runner
            .run("sh", &["-c", "echo out; echo err 1>&2"])
            .await
            .unwrap();
        assert!(output.contains("out"));
        assert!(output.contains("err"));
    }

    #[tokio::test]
    async fn test_run_strips_colors() {
        let runner = BackendRunner::new();
        let output = runner
            .run("printf", &["\\033[32mgreen\\033[0m"])
            .await
            .unwrap();
        assert_eq!(output, "green");
    }

    #[tokio::test]
    async fn test_run_in_dir() {
        let dir = tempfile::tempdir().unwrap();
        let runner = BackendRunner::new().in_dir(dir.path());
        let output = runner.run("pwd", &[] as &[&str]).await.unwrap();
        let expected = dir.path().canonicalize().unwrap();
        assert_eq!(Path::new(&output).canonicalize().unwrap(), expected);
    }

    #[tokio::test]
    async fn test_failure_embeds_diagnostics() {
        let runner = BackendRunner::new();
        let err = runner
            .run("sh", &["-c", "echo broken; exit 3"])
            .await
            .unwrap_err();

        assert!(err.is_exit_failure());
        assert_eq!(err.output().trim(), "broken");
        let rendered = err.to_string();
        assert!(rendered.contains("Command: sh -c echo broken; exit 3"));
        assert!(rendered.contains("broken"));
    }

    #[tokio::test]
    async fn test_missing_executable_is_reported() {
        let runner = BackendRunner::new();
        let err = runner
            .run("definitely-not-a-real-program-xyz", &["--flag"])
            .await
            .unwrap_err();

        assert!(!err.is_exit_failure());
        assert!(err
            .to_string()
            .contains("Command: definitely-not-a-real-program-xyz --flag"));
    }

    #[tokio::test]
    async fn test_counts_every_invocation() {
        let runner = BackendRunner::new();
        let _ = runner.run("true", &[] as &[&str]).await;
        let _ = runner.run("false", &[] as &[&str]).await;
        assert_eq!(runner.statistics().run_count(), 2);
    }

    #[tokio::test]
    async fn test_run_many_stops_at_first_failure() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("marker");
        let runner = BackendRunner::new();
        let commands = vec![
            vec!["true".to_string()],
            vec!["false".to_string()],
            vec!["touch".to_string(), marker.display().to_string()],
        ];

        let err = runner.run_many(&commands).await.unwrap_err();

        assert!(matches!(err, ProcessError::Sequence { .. }));
        assert!(!marker.exists());
        assert_eq!(runner.statistics().run_count(), 2);
    }

    #[tokio::test]
    async fn test_run_many_rejects_empty_command() {
        let runner = BackendRunner::new();
        let err = runner.run_many(&[vec![]]).await.unwrap_err();
        assert!(matches!(err, ProcessError::EmptyCommand));
    }
}
