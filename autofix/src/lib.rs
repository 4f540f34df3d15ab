//! CI failure-driven auto-fix pipeline.
//!
//! Given a project with a test suite, the pipeline runs the tests, locates the
//! source file implicated by the first usable stack frame, asks a patch
//! generator for a corrected version, re-runs the tests against it, and only
//! then commits and pushes. A candidate that does not pass is rolled back.
//!
//! - **[`core`]**: Pure logic (frame scanning, exclusion, fence stripping,
//!   shared types). No I/O.
//! - **[`io`]**: Side effects (config, subprocesses, git, HTTP). Each external
//!   capability sits behind a trait so tests can script it.
//!
//! [`parse`], [`patch`], [`publish`] and [`pipeline`] compose the two into the
//! stages of a run.

pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod parse;
pub mod patch;
pub mod pipeline;
pub mod publish;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
