//! I/O adapters for the pipeline: config, subprocesses, git and HTTP.

pub mod config;
pub mod dotenv;
pub mod git;
pub mod llm;
pub mod manifest;
pub mod probe;
pub mod process;
pub mod prompt;
pub mod test_runner;
