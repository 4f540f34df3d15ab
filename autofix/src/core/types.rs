//! Shared deterministic types for the auto-fix pipeline.
//!
//! These types define the contracts passed between pipeline stages. They carry
//! no I/O handles and are immutable once produced.

use std::fmt;
use std::path::PathBuf;

/// Outcome of one invocation of the project's test command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestRunResult {
    /// True when the test command exited with status 0.
    pub passed: bool,
    /// Stdout and stderr in execution order, plus truncation notices.
    pub combined_output: String,
}

impl TestRunResult {
    pub fn passed(output: impl Into<String>) -> Self {
        Self {
            passed: true,
            combined_output: output.into(),
        }
    }

    pub fn failed(output: impl Into<String>) -> Self {
        Self {
            passed: false,
            combined_output: output.into(),
        }
    }
}

/// The single source file implicated by a failing test run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    /// Path relative to the project root. Always an existing, non-excluded file.
    pub source_file: PathBuf,
    /// Full raw test output.
    pub error_context: String,
}

/// Record of one patch attempt against a source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixAttempt {
    /// File content captured before any mutation. Sole basis for rollback.
    pub original_content: String,
    /// Cleaned candidate produced by the patch generator.
    pub candidate_content: String,
    /// Whether the verification run passed against the candidate.
    pub verified: bool,
    /// Combined output of the verification run; `None` when it was skipped.
    pub verification_output: Option<String>,
}

/// Why a publish call did or did not create a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitReason {
    NoChanges,
    Success,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitOutcome {
    pub committed: bool,
    pub reason: CommitReason,
}

impl CommitOutcome {
    pub fn no_changes() -> Self {
        Self {
            committed: false,
            reason: CommitReason::NoChanges,
        }
    }

    pub fn success() -> Self {
        Self {
            committed: true,
            reason: CommitReason::Success,
        }
    }
}

/// States of the pipeline driver, in the order they can be entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Probing,
    Running,
    Passed,
    Failed,
    Parsing,
    NoTarget,
    Fixing,
    Verified,
    Unverified,
    Publishing,
    Terminal,
}

impl PipelineState {
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineState::Idle => "idle",
            PipelineState::Probing => "probing",
            PipelineState::Running => "running",
            PipelineState::Passed => "passed",
            PipelineState::Failed => "failed",
            PipelineState::Parsing => "parsing",
            PipelineState::NoTarget => "no_target",
            PipelineState::Fixing => "fixing",
            PipelineState::Verified => "verified",
            PipelineState::Unverified => "unverified",
            PipelineState::Publishing => "publishing",
            PipelineState::Terminal => "terminal",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Successful terminal outcomes of a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// The fixer is switched off in configuration.
    Disabled,
    /// No test command or no test files; nothing to do.
    NoTests,
    /// The initial test run passed.
    Passed,
    /// A verified fix was written and handed to the publisher.
    Fixed {
        source_file: PathBuf,
        commit: CommitOutcome,
    },
}
