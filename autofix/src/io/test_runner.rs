//! Test runner adapter for the project's declared test command.
//!
//! The [`TestRunner`] trait decouples the pipeline from subprocess execution.
//! Tests use scripted runners that return canned output without spawning
//! anything.

use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, instrument, warn};

use crate::core::frames::excerpt;
use crate::core::types::TestRunResult;
use crate::io::process::run_bounded;

/// Shell exit statuses that mean the command itself could not run.
const SHELL_NOT_EXECUTABLE: i32 = 126;
const SHELL_NOT_FOUND: i32 = 127;

pub trait TestRunner {
    /// Run the test suite once.
    ///
    /// A failing suite is `Ok` with `passed == false`. `Err` is reserved for
    /// infrastructure problems: the command cannot launch, is not found, or
    /// times out.
    fn run(&self) -> Result<TestRunResult>;
}

/// Runs a shell command via `sh -c` with stderr folded into stdout.
#[derive(Debug, Clone)]
pub struct ShellTestRunner {
    workdir: PathBuf,
    command: Option<String>,
    timeout: Duration,
    output_limit_bytes: usize,
}

impl ShellTestRunner {
    pub fn new(
        workdir: impl Into<PathBuf>,
        command: Option<String>,
        timeout: Duration,
        output_limit_bytes: usize,
    ) -> Self {
        Self {
            workdir: workdir.into(),
            command,
            timeout,
            output_limit_bytes,
        }
    }

    pub fn command(&self) -> Option<&str> {
        self.command.as_deref()
    }
}

impl TestRunner for ShellTestRunner {
    #[instrument(skip_all, fields(command = ?self.command, timeout_secs = self.timeout.as_secs()))]
    fn run(&self) -> Result<TestRunResult> {
        let command = self
            .command
            .as_deref()
            .ok_or_else(|| anyhow!("no test command declared"))?;
        info!(workdir = %self.workdir.display(), "running tests");

        // `exec 2>&1` merges the streams inside the shell so the captured text
        // keeps the order in which the suite wrote it.
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(format!("exec 2>&1\n{command}"))
            .current_dir(&self.workdir);

        let output = run_bounded(cmd, self.timeout, self.output_limit_bytes)
            .with_context(|| format!("run test command `{command}`"))?;
        let combined_output = output.combined_text();

        if output.timed_out {
            warn!(timeout_secs = self.timeout.as_secs(), "test command timed out");
            return Err(anyhow!(
                "test command `{command}` timed out after {:?}",
                self.timeout
            ));
        }
        match output.status.code() {
            Some(0) => {
                debug!("tests passed");
                Ok(TestRunResult::passed(combined_output))
            }
            Some(code @ (SHELL_NOT_EXECUTABLE | SHELL_NOT_FOUND)) => Err(anyhow!(
                "test command `{command}` could not be executed (exit {code}): {}",
                excerpt(&combined_output, 300)
            )),
            Some(code) => {
                info!(exit_code = code, "tests failed");
                Ok(TestRunResult::failed(combined_output))
            }
            None => Err(anyhow!(
                "test command `{command}` terminated by signal"
            )),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn runner(dir: &std::path::Path, command: &str) -> ShellTestRunner {
        ShellTestRunner::new(
            dir,
            Some(command.to_string()),
            Duration::from_secs(10),
            10_000,
        )
    }

    #[test]
    fn zero_exit_passes() {
        let temp = tempfile::tempdir().expect("tempdir");
        let result = runner(temp.path(), "echo all good").run().expect("run");
        assert!(result.passed);
        assert_eq!(result.combined_output.trim(), "all good");
    }

    #[test]
    fn nonzero_exit_is_failure_not_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let result = runner(temp.path(), "echo boom; exit 1").run().expect("run");
        assert!(!result.passed);
        assert!(result.combined_output.contains("boom"));
    }

    #[test]
    fn streams_are_interleaved_in_order() {
        let temp = tempfile::tempdir().expect("tempdir");
        let result = runner(temp.path(), "echo one; echo two 1>&2; echo three; exit 2")
            .run()
            .expect("run");
        assert_eq!(result.combined_output, "one\ntwo\nthree\n");
    }

    #[test]
    fn runs_in_workdir() {
        let temp = tempfile::tempdir().expect("tempdir");
        std::fs::write(temp.path().join("marker.txt"), "here").expect("write");
        let result = runner(temp.path(), "cat marker.txt").run().expect("run");
        assert_eq!(result.combined_output, "here");
    }

    #[test]
    fn missing_binary_is_infrastructure_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = runner(temp.path(), "autofix-no-such-test-binary")
            .run()
            .unwrap_err();
        assert!(err.to_string().contains("could not be executed"));
    }

    #[test]
    fn timeout_is_infrastructure_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let runner = ShellTestRunner::new(
            temp.path(),
            Some("exec sleep 5".to_string()),
            Duration::from_millis(200),
            100,
        );
        let err = runner.run().unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn timeout_holds_for_commands_that_fork() {
        let temp = tempfile::tempdir().expect("tempdir");
        let runner = ShellTestRunner::new(
            temp.path(),
            Some("sleep 6; echo done".to_string()),
            Duration::from_millis(300),
            1000,
        );
        let started = std::time::Instant::now();
        let err = runner.run().unwrap_err();
        assert!(err.to_string().contains("timed out"));
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[test]
    fn undeclared_command_is_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let runner = ShellTestRunner::new(temp.path(), None, Duration::from_secs(1), 100);
        assert!(runner.run().is_err());
    }
}
