//! Stable exit codes for the autofix CLI.

/// Tests absent, tests passed, or a fix was verified and published.
pub const OK: i32 = 0;
/// Invalid invocation or configuration.
pub const INVALID: i32 = 1;
/// A subprocess or the patch generator failed, or timed out.
pub const INFRASTRUCTURE: i32 = 2;
/// No source file could be identified from failing test output.
pub const PARSE: i32 = 3;
/// The candidate fix did not pass the verification run.
pub const VERIFICATION: i32 = 4;
/// A verified fix could not be committed or pushed.
pub const PUBLISH: i32 = 5;
