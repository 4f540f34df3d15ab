//! Patch orchestration: generate a candidate, write it, verify it, or roll back.
//!
//! The working tree is never left holding a candidate that has not passed the
//! same test command that originally failed. Rollback is held by a drop guard,
//! so an infrastructure error (or panic) during verification still restores the
//! original content.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, info, instrument, warn};

use crate::core::fences::strip_code_fences;
use crate::core::language::detect_language;
use crate::core::types::{Failure, FixAttempt};
use crate::error::FixError;
use crate::io::test_runner::TestRunner;

/// Input handed to the patch generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchRequest {
    /// Path of the file, relative to the project root.
    pub file_path: PathBuf,
    /// Language hint derived from the extension.
    pub language: String,
    pub current_content: String,
    pub error_context: String,
}

/// Produces a candidate replacement for a source file.
///
/// The response is free-form text expected to be the full corrected file,
/// possibly wrapped in markdown fences. Callers validate before writing.
pub trait PatchGenerator {
    fn generate(&self, request: &PatchRequest) -> Result<String>;
}

/// Drives one fix attempt against one file.
pub struct PatchOrchestrator<'a, R: TestRunner, G: PatchGenerator> {
    root: PathBuf,
    runner: &'a R,
    generator: &'a G,
}

impl<'a, R: TestRunner, G: PatchGenerator> PatchOrchestrator<'a, R, G> {
    pub fn new(root: impl Into<PathBuf>, runner: &'a R, generator: &'a G) -> Self {
        Self {
            root: root.into(),
            runner,
            generator,
        }
    }

    /// Attempt a fix for `failure.source_file`.
    ///
    /// Returns `verified == false` (with the original restored) when the
    /// verification run still fails. `Err` means nothing usable was produced or
    /// a subprocess broke; in both cases the file holds its original content.
    #[instrument(skip_all, fields(file = %failure.source_file.display(), skip_verification))]
    pub fn fix(&self, failure: &Failure, skip_verification: bool) -> Result<FixAttempt, FixError> {
        let path = self.root.join(&failure.source_file);
        let original_content = fs::read_to_string(&path)
            .with_context(|| format!("read {}", path.display()))
            .map_err(FixError::Infrastructure)?;

        let request = PatchRequest {
            file_path: failure.source_file.clone(),
            language: detect_language(&failure.source_file).to_string(),
            current_content: original_content.clone(),
            error_context: failure.error_context.clone(),
        };
        info!(language = %request.language, "requesting candidate fix");
        let raw = self
            .generator
            .generate(&request)
            .context("generate candidate fix")
            .map_err(FixError::Infrastructure)?;
        let candidate_content = clean_candidate(&raw).map_err(FixError::Infrastructure)?;

        let rollback = Rollback::write(&path, &original_content, &candidate_content)
            .map_err(FixError::Infrastructure)?;
        info!("applied candidate fix");

        if skip_verification {
            warn!("skipping verification run");
            rollback.keep();
            return Ok(FixAttempt {
                original_content,
                candidate_content,
                verified: true,
                verification_output: None,
            });
        }

        // On `Err` the guard drops here and restores the original.
        let rerun = self
            .runner
            .run()
            .context("verification test run")
            .map_err(FixError::Infrastructure)?;

        if rerun.passed {
            info!("verification run passed");
            rollback.keep();
            return Ok(FixAttempt {
                original_content,
                candidate_content,
                verified: true,
                verification_output: Some(rerun.combined_output),
            });
        }

        rollback.restore().map_err(FixError::Infrastructure)?;
        warn!("verification run failed, original restored");
        Ok(FixAttempt {
            original_content,
            candidate_content,
            verified: false,
            verification_output: Some(rerun.combined_output),
        })
    }
}

/// Validate and normalize a raw generator response.
fn clean_candidate(raw: &str) -> Result<String> {
    let mut candidate = strip_code_fences(raw);
    if candidate.trim().is_empty() {
        return Err(anyhow!("patch generator returned an empty candidate"));
    }
    candidate.push('\n');
    Ok(candidate)
}

/// Restores a file's original content unless explicitly kept.
struct Rollback<'p> {
    path: &'p Path,
    original: &'p str,
    armed: bool,
}

impl<'p> Rollback<'p> {
    /// Write `candidate` to `path`, arming a restore of `original`.
    fn write(path: &'p Path, original: &'p str, candidate: &str) -> Result<Self> {
        let guard = Self {
            path,
            original,
            armed: true,
        };
        fs::write(path, candidate)
            .with_context(|| format!("write candidate to {}", path.display()))?;
        debug!(bytes = candidate.len(), "candidate written");
        Ok(guard)
    }

    fn keep(mut self) {
        self.armed = false;
    }

    fn restore(mut self) -> Result<()> {
        self.armed = false;
        fs::write(self.path, self.original)
            .with_context(|| format!("restore original {}", self.path.display()))
    }
}

impl Drop for Rollback<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match fs::write(self.path, self.original) {
            Ok(()) => warn!(path = %self.path.display(), "restored original after interrupted fix"),
            Err(err) => {
                error!(path = %self.path.display(), err = %err, "failed to restore original content");
            }
        }
    }
}
