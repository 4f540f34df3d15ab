//! `autofix` command-line front-end.
//!
//! `autofix ci` is the entry point used by CI jobs: it runs the project's
//! tests and, on failure, attempts one verified fix and pushes it.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};

use autofix::core::types::{Failure, PipelineOutcome};
use autofix::error::FixError;
use autofix::exit_codes;
use autofix::io::config::{AutofixConfig, DEFAULT_CONFIG_FILE, load_config, write_config};
use autofix::io::dotenv::DotEnv;
use autofix::io::git::Git;
use autofix::io::llm::ChatCompletionsGenerator;
use autofix::io::manifest::resolve_test_command;
use autofix::io::probe::{ProjectProbe, TestProbe};
use autofix::io::test_runner::ShellTestRunner;
use autofix::logging;
use autofix::parse::FailureParser;
use autofix::patch::PatchOrchestrator;
use autofix::pipeline::{Orchestrator, PipelineSettings};
use autofix::publish::GitPublisher;

#[derive(Parser)]
#[command(
    name = "autofix",
    version,
    about = "Run tests, fix the failing source file, verify, commit"
)]
struct Cli {
    /// Project root.
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Config file (defaults to `<root>/.autofix.toml`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log pipeline progress to stderr (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run tests and, on failure, fix, verify, commit and push.
    Ci,
    /// Ask for a fix to one file. Never commits.
    Fix {
        /// File to fix, relative to the project root.
        file: PathBuf,
        /// Error message handed to the patch generator.
        error: Option<String>,
        /// Re-run the tests and roll back if they still fail.
        #[arg(long)]
        verify: bool,
    },
    /// Report whether the project has a test suite.
    Probe,
    /// Print the source file implicated by test output (file or stdin).
    Parse {
        file: Option<PathBuf>,
    },
    /// Write a default `.autofix.toml`.
    Init {
        /// Overwrite an existing config.
        #[arg(short, long)]
        force: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("autofix: {err:#}");
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    // Stack frames name absolute, resolved paths; match them against the same.
    let root = cli
        .root
        .canonicalize()
        .with_context(|| format!("resolve project root {}", cli.root.display()))?;
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| root.join(DEFAULT_CONFIG_FILE));
    let load = || load_config(&config_path);
    match cli.command {
        Command::Init { force } => cmd_init(&config_path, force),
        Command::Ci => cmd_ci(&root, &load()?),
        Command::Fix {
            file,
            error,
            verify,
        } => cmd_fix(&root, &load()?, &file, error.unwrap_or_default(), verify),
        Command::Probe => Ok(cmd_probe(&root, &load()?)),
        Command::Parse { file } => cmd_parse(&root, &load()?, file.as_deref()),
    }
}

fn cmd_init(config_path: &Path, force: bool) -> Result<i32> {
    if config_path.exists() && !force {
        println!(
            "autofix: {} already exists (use --force to overwrite)",
            config_path.display()
        );
        return Ok(exit_codes::OK);
    }
    write_config(config_path, &AutofixConfig::default())?;
    println!("autofix: wrote {}", config_path.display());
    Ok(exit_codes::OK)
}

fn cmd_ci(root: &Path, cfg: &AutofixConfig) -> Result<i32> {
    let probe = ProjectProbe::new(root, cfg.tests.clone());
    let runner = test_runner(root, cfg);
    let generator = generator(root, cfg)?;
    let publisher = GitPublisher::new(Git::new(root), &cfg.publish);
    let parser = FailureParser::from_config(root, cfg)?;

    let report = Orchestrator::new(
        root,
        &probe,
        &runner,
        &generator,
        &publisher,
        parser,
        PipelineSettings::from_config(cfg),
    )
    .run();

    match &report.result {
        Ok(PipelineOutcome::Disabled) => println!("autofix: disabled in configuration"),
        Ok(PipelineOutcome::NoTests) => println!("autofix: no tests found, nothing to do"),
        Ok(PipelineOutcome::Passed) => println!("autofix: tests passed"),
        Ok(PipelineOutcome::Fixed {
            source_file,
            commit,
        }) => {
            let state = if commit.committed {
                "committed and pushed"
            } else {
                "nothing to commit"
            };
            println!("autofix: fixed {} ({state})", source_file.display());
        }
        Err(err) => report_failure(err),
    }
    Ok(report.exit_code())
}

fn cmd_fix(
    root: &Path,
    cfg: &AutofixConfig,
    file: &Path,
    error_context: String,
    verify: bool,
) -> Result<i32> {
    let source_file = relative_to_root(root, file)?;
    if !root.join(&source_file).is_file() {
        return Err(anyhow!("{} is not a file", root.join(&source_file).display()));
    }
    let runner = test_runner(root, cfg);
    if verify && runner.command().is_none() {
        return Err(anyhow!("--verify needs a test command (none declared)"));
    }
    let generator = generator(root, cfg)?;
    let failure = Failure {
        source_file,
        error_context,
    };

    match PatchOrchestrator::new(root, &runner, &generator).fix(&failure, !verify) {
        Ok(attempt) if attempt.verified => {
            println!("autofix: wrote fix to {}", failure.source_file.display());
            Ok(exit_codes::OK)
        }
        Ok(attempt) => {
            let err = FixError::Verification {
                source_file: failure.source_file,
                output: attempt.verification_output.unwrap_or_default(),
            };
            report_failure(&err);
            Ok(err.exit_code())
        }
        Err(err) => {
            report_failure(&err);
            Ok(err.exit_code())
        }
    }
}

fn cmd_probe(root: &Path, cfg: &AutofixConfig) -> i32 {
    let probe = ProjectProbe::new(root, cfg.tests.clone());
    if probe.has_tests() {
        let command = resolve_test_command(root, &cfg.tests).unwrap_or_default();
        println!("autofix: tests found (command: {command})");
    } else {
        println!("autofix: no tests found");
    }
    exit_codes::OK
}

fn cmd_parse(root: &Path, cfg: &AutofixConfig, file: Option<&Path>) -> Result<i32> {
    let output = match file {
        Some(path) => {
            fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?
        }
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("read test output from stdin")?;
            buf
        }
    };
    let parser = FailureParser::from_config(root, cfg)?;
    match parser.parse(&output) {
        Some(failure) => {
            println!("{}", failure.source_file.display());
            Ok(exit_codes::OK)
        }
        None => {
            let err = FixError::Parse {
                excerpt: autofix::core::frames::excerpt(&output, cfg.parser.excerpt_chars),
            };
            report_failure(&err);
            Ok(err.exit_code())
        }
    }
}

fn test_runner(root: &Path, cfg: &AutofixConfig) -> ShellTestRunner {
    ShellTestRunner::new(
        root,
        resolve_test_command(root, &cfg.tests),
        Duration::from_secs(cfg.tests.timeout_secs),
        cfg.tests.output_limit_bytes,
    )
}

fn generator(root: &Path, cfg: &AutofixConfig) -> Result<ChatCompletionsGenerator> {
    let dotenv = DotEnv::load(&root.join(&cfg.llm.env_file))?;
    ChatCompletionsGenerator::new(&cfg.llm, cfg.llm.resolve_api_key(&dotenv))
}

fn relative_to_root(root: &Path, file: &Path) -> Result<PathBuf> {
    if file.is_relative() {
        return Ok(file.to_path_buf());
    }
    let root = root
        .canonicalize()
        .with_context(|| format!("resolve {}", root.display()))?;
    file.strip_prefix(&root)
        .map(Path::to_path_buf)
        .map_err(|_| anyhow!("{} is outside {}", file.display(), root.display()))
}

fn report_failure(err: &FixError) {
    eprintln!("autofix: {err}");
    if let FixError::Verification { output, .. } = err
        && !output.trim().is_empty()
    {
        eprintln!("{}", output.trim_end());
    }
}
