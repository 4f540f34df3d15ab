//! Top-level driver for one CI auto-fix run.
//!
//! Sequences probe, test run, failure parse, fix and publish. Every run ends in
//! exactly one terminal outcome; the states entered along the way are recorded
//! so callers (and tests) can see which stages ran.

use std::path::PathBuf;

use tracing::{error, info, instrument, warn};

use crate::core::frames::excerpt;
use crate::core::types::{PipelineOutcome, PipelineState};
use crate::error::FixError;
use crate::exit_codes;
use crate::io::config::AutofixConfig;
use crate::io::probe::TestProbe;
use crate::io::test_runner::TestRunner;
use crate::parse::FailureParser;
use crate::patch::{PatchGenerator, PatchOrchestrator};
use crate::publish::Publisher;

/// Knobs the driver reads from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    pub enabled: bool,
    /// Characters of raw output kept in parse and verification diagnostics.
    pub excerpt_chars: usize,
}

impl PipelineSettings {
    pub fn from_config(cfg: &AutofixConfig) -> Self {
        Self {
            enabled: cfg.enabled,
            excerpt_chars: cfg.parser.excerpt_chars,
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&AutofixConfig::default())
    }
}

/// Result of a pipeline run plus the states it passed through.
#[derive(Debug)]
pub struct PipelineReport {
    pub trace: Vec<PipelineState>,
    pub result: Result<PipelineOutcome, FixError>,
}

impl PipelineReport {
    pub fn exit_code(&self) -> i32 {
        match &self.result {
            Ok(_) => exit_codes::OK,
            Err(err) => err.exit_code(),
        }
    }

    pub fn visited(&self, state: PipelineState) -> bool {
        self.trace.contains(&state)
    }
}

pub struct Orchestrator<'a, P, R, G, B>
where
    P: TestProbe,
    R: TestRunner,
    G: PatchGenerator,
    B: Publisher,
{
    root: PathBuf,
    probe: &'a P,
    runner: &'a R,
    generator: &'a G,
    publisher: &'a B,
    parser: FailureParser,
    settings: PipelineSettings,
}

impl<'a, P, R, G, B> Orchestrator<'a, P, R, G, B>
where
    P: TestProbe,
    R: TestRunner,
    G: PatchGenerator,
    B: Publisher,
{
    pub fn new(
        root: impl Into<PathBuf>,
        probe: &'a P,
        runner: &'a R,
        generator: &'a G,
        publisher: &'a B,
        parser: FailureParser,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            root: root.into(),
            probe,
            runner,
            generator,
            publisher,
            parser,
            settings,
        }
    }

    /// Run the pipeline once. Never retries; at most one fix attempt.
    #[instrument(skip_all, fields(root = %self.root.display()))]
    pub fn run(&self) -> PipelineReport {
        let mut trace = vec![PipelineState::Idle];
        let result = self.drive(&mut trace);
        trace.push(PipelineState::Terminal);
        match &result {
            Ok(outcome) => info!(?outcome, "pipeline finished"),
            Err(err) => error!(kind = err.kind(), err = %err, "pipeline failed"),
        }
        PipelineReport { trace, result }
    }

    fn drive(&self, trace: &mut Vec<PipelineState>) -> Result<PipelineOutcome, FixError> {
        trace.push(PipelineState::Probing);
        if !self.settings.enabled {
            warn!("auto-fix disabled in configuration");
            return Ok(PipelineOutcome::Disabled);
        }
        if !self.probe.has_tests() {
            info!("no test suite configured, nothing to do");
            return Ok(PipelineOutcome::NoTests);
        }

        trace.push(PipelineState::Running);
        let run = self.runner.run().map_err(FixError::Infrastructure)?;
        if run.passed {
            trace.push(PipelineState::Passed);
            info!("tests passed");
            return Ok(PipelineOutcome::Passed);
        }
        trace.push(PipelineState::Failed);
        warn!(output_bytes = run.combined_output.len(), "tests failed");

        trace.push(PipelineState::Parsing);
        let Some(failure) = self.parser.parse(&run.combined_output) else {
            trace.push(PipelineState::NoTarget);
            return Err(FixError::Parse {
                excerpt: excerpt(&run.combined_output, self.settings.excerpt_chars),
            });
        };
        info!(file = %failure.source_file.display(), "identified failing source file");

        trace.push(PipelineState::Fixing);
        let attempt = PatchOrchestrator::new(&self.root, self.runner, self.generator)
            .fix(&failure, false)?;
        if !attempt.verified {
            trace.push(PipelineState::Unverified);
            let output = attempt.verification_output.unwrap_or_default();
            return Err(FixError::Verification {
                source_file: failure.source_file,
                output: excerpt(&output, self.settings.excerpt_chars),
            });
        }
        trace.push(PipelineState::Verified);

        trace.push(PipelineState::Publishing);
        let commit = self
            .publisher
            .publish()
            .map_err(|cause| FixError::Publish {
                source_file: failure.source_file.clone(),
                cause,
            })?;
        Ok(PipelineOutcome::Fixed {
            source_file: failure.source_file,
            commit,
        })
    }
}
