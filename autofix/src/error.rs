//! Fatal pipeline conditions and their exit codes.

use std::path::PathBuf;

use crate::exit_codes;

/// Every way a pipeline run can end unsuccessfully.
///
/// Absence of tests is not represented here: it is a successful outcome.
#[derive(Debug, thiserror::Error)]
pub enum FixError {
    /// A subprocess could not launch or timed out, or the patch generator was
    /// unreachable or returned unusable output.
    #[error("infrastructure failure: {0:#}")]
    Infrastructure(anyhow::Error),

    /// The failing output contained no acceptable stack frame.
    #[error("could not identify source file from test output:\n{excerpt}")]
    Parse { excerpt: String },

    /// The candidate fix did not make the tests pass; the original was restored.
    #[error("fix for {} did not pass verification (original restored)", .source_file.display())]
    Verification { source_file: PathBuf, output: String },

    /// A verified fix could not be staged, committed or pushed.
    #[error("failed to publish verified fix for {}: {cause:#}", .source_file.display())]
    Publish {
        source_file: PathBuf,
        cause: anyhow::Error,
    },
}

impl FixError {
    pub fn exit_code(&self) -> i32 {
        match self {
            FixError::Infrastructure(_) => exit_codes::INFRASTRUCTURE,
            FixError::Parse { .. } => exit_codes::PARSE,
            FixError::Verification { .. } => exit_codes::VERIFICATION,
            FixError::Publish { .. } => exit_codes::PUBLISH,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            FixError::Infrastructure(_) => "infrastructure",
            FixError::Parse { .. } => "parse",
            FixError::Verification { .. } => "verification",
            FixError::Publish { .. } => "publish",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn exit_codes_are_distinct_and_nonzero() {
        let errors = [
            FixError::Infrastructure(anyhow!("spawn")),
            FixError::Parse {
                excerpt: "x".to_string(),
            },
            FixError::Verification {
                source_file: PathBuf::from("a.js"),
                output: String::new(),
            },
            FixError::Publish {
                source_file: PathBuf::from("a.js"),
                cause: anyhow!("push rejected"),
            },
        ];
        let mut codes: Vec<i32> = errors.iter().map(FixError::exit_code).collect();
        assert!(codes.iter().all(|c| *c != exit_codes::OK));
        codes.dedup();
        assert_eq!(codes.len(), 4);
    }

    #[test]
    fn messages_carry_context_chain() {
        let err = FixError::Infrastructure(anyhow!("exit 127").context("run test command"));
        assert_eq!(
            err.to_string(),
            "infrastructure failure: run test command: exit 127"
        );
        let err = FixError::Publish {
            source_file: PathBuf::from("src/util.js"),
            cause: anyhow!("rejected"),
        };
        assert!(err.to_string().contains("src/util.js"));
        assert!(err.to_string().contains("rejected"));
    }
}
