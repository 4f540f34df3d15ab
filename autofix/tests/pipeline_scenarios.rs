//! End-to-end pipeline scenarios against a scratch git project.
//!
//! The test command is a real shell command and publishing goes through real
//! git to a bare remote. Only the patch generator is scripted.

#![cfg(unix)]

use std::time::Duration;

use autofix::core::types::{CommitOutcome, PipelineOutcome, PipelineState};
use autofix::error::FixError;
use autofix::exit_codes;
use autofix::io::config::{AutofixConfig, TestsConfig};
use autofix::io::git::Git;
use autofix::io::manifest::resolve_test_command;
use autofix::io::probe::ProjectProbe;
use autofix::io::test_runner::ShellTestRunner;
use autofix::parse::FailureParser;
use autofix::pipeline::{Orchestrator, PipelineReport, PipelineSettings};
use autofix::publish::GitPublisher;
use autofix::test_support::{ScriptedGenerator, ScriptedTestRunner, TestProject};

const BROKEN: &str = "export const add = (a, b) => a - b;\n";
const FIXED: &str = "export const add = (a, b) => a + b;\n";

/// Passes once `src/util.js` contains `a + b`; otherwise prints a stack trace
/// whose first frame is the test file and second is the source file.
const TEST_COMMAND: &str = r#"grep -q 'a + b' src/util.js && echo "1 passing" && exit 0
echo "1 failing"
echo "    at Context.<anonymous> (tests/util.test.js:5:12)"
echo "    at run (/src/util.js:10:4)" >&2
exit 1"#;

fn config(command: Option<&str>) -> AutofixConfig {
    AutofixConfig {
        tests: TestsConfig {
            command: command.map(str::to_string),
            timeout_secs: 30,
            ..TestsConfig::default()
        },
        ..AutofixConfig::default()
    }
}

fn project(files: &[(&str, &str)]) -> TestProject {
    let project = TestProject::new().expect("project");
    for (path, contents) in files {
        project.write(path, contents).expect("write");
    }
    project.commit_all("setup").expect("commit");
    project
}

fn run(project: &TestProject, cfg: &AutofixConfig, generator: &ScriptedGenerator) -> PipelineReport {
    let root = project.root();
    let probe = ProjectProbe::new(root, cfg.tests.clone());
    let runner = ShellTestRunner::new(
        root,
        resolve_test_command(root, &cfg.tests),
        Duration::from_secs(cfg.tests.timeout_secs),
        cfg.tests.output_limit_bytes,
    );
    let publisher = GitPublisher::new(Git::new(root), &cfg.publish);
    let parser = FailureParser::from_config(root, cfg).expect("parser");
    Orchestrator::new(
        root,
        &probe,
        &runner,
        generator,
        &publisher,
        parser,
        PipelineSettings::from_config(cfg),
    )
    .run()
}

#[test]
fn no_test_command_is_a_successful_no_op() {
    let project = project(&[("src/util.js", BROKEN), ("tests/util.test.js", "")]);
    let root = project.root();
    let cfg = config(None);
    let probe = ProjectProbe::new(root, cfg.tests.clone());
    let runner = ScriptedTestRunner::new(Vec::new());
    let generator = ScriptedGenerator::new(Vec::new());
    let publisher = GitPublisher::new(Git::new(root), &cfg.publish);

    let report = Orchestrator::new(
        root,
        &probe,
        &runner,
        &generator,
        &publisher,
        FailureParser::from_config(root, &cfg).expect("parser"),
        PipelineSettings::from_config(&cfg),
    )
    .run();

    assert_eq!(report.exit_code(), exit_codes::OK);
    assert_eq!(report.result.as_ref().ok(), Some(&PipelineOutcome::NoTests));
    assert_eq!(runner.calls(), 0);
    assert!(!report.visited(PipelineState::Running));
}

#[test]
fn passing_suite_stops_before_parsing() {
    let project = project(&[("src/util.js", FIXED), ("tests/util.test.js", "")]);
    let generator = ScriptedGenerator::new(Vec::new());

    let report = run(&project, &config(Some(TEST_COMMAND)), &generator);

    assert_eq!(report.result.as_ref().ok(), Some(&PipelineOutcome::Passed));
    assert!(!report.visited(PipelineState::Parsing));
    assert!(generator.requests().is_empty());
}

#[test]
fn verified_fix_is_committed_and_pushed() {
    let project = project(&[("src/util.js", BROKEN), ("tests/util.test.js", "")]);
    let before = project.commit_count().expect("count");
    let generator = ScriptedGenerator::replying(&[format!("```javascript\n{FIXED}```").as_str()]);
    let cfg = config(Some(TEST_COMMAND));

    let report = run(&project, &cfg, &generator);

    assert_eq!(report.exit_code(), exit_codes::OK, "{:?}", report.result);
    assert_eq!(
        report.result.as_ref().ok(),
        Some(&PipelineOutcome::Fixed {
            source_file: "src/util.js".into(),
            commit: CommitOutcome::success(),
        })
    );
    assert_eq!(project.read("src/util.js").expect("read"), FIXED);
    assert_eq!(project.commit_count().expect("count"), before + 1);
    assert_eq!(project.head_subject().expect("head"), cfg.publish.message);
    assert_eq!(
        project.remote_head_subject().expect("remote"),
        cfg.publish.message
    );

    let requests = generator.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].file_path, std::path::PathBuf::from("src/util.js"));
    assert_eq!(requests[0].current_content, BROKEN);
    // stderr from the suite is part of the error context.
    assert!(requests[0].error_context.contains("at run (/src/util.js:10:4)"));
}

#[test]
fn unverified_fix_is_rolled_back_and_not_committed() {
    let project = project(&[("src/util.js", BROKEN), ("tests/util.test.js", "")]);
    let before = project.commit_count().expect("count");
    let generator = ScriptedGenerator::replying(&["export const add = () => 0;"]);

    let report = run(&project, &config(Some(TEST_COMMAND)), &generator);

    assert_eq!(report.exit_code(), exit_codes::VERIFICATION);
    assert!(matches!(report.result, Err(FixError::Verification { .. })));
    assert_eq!(project.read("src/util.js").expect("read"), BROKEN);
    assert_eq!(project.commit_count().expect("count"), before);
    assert!(Git::new(project.root()).pending_paths().expect("status").is_empty());
}

#[test]
fn test_only_frames_are_a_parse_failure() {
    let command = r#"echo "    at Object.<anonymous> (src/util.test.js:3:1)"; exit 1"#;
    let project = project(&[("src/util.js", BROKEN), ("src/util.test.js", "")]);
    let generator = ScriptedGenerator::new(Vec::new());

    let report = run(&project, &config(Some(command)), &generator);

    assert_eq!(report.exit_code(), exit_codes::PARSE);
    match &report.result {
        Err(FixError::Parse { excerpt }) => assert!(excerpt.contains("src/util.test.js")),
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(report.visited(PipelineState::NoTarget));
    assert!(generator.requests().is_empty());
    assert_eq!(project.read("src/util.js").expect("read"), BROKEN);
}

#[test]
fn missing_test_binary_is_infrastructure() {
    let project = project(&[("src/util.js", BROKEN), ("tests/util.test.js", "")]);
    let generator = ScriptedGenerator::new(Vec::new());

    let report = run(
        &project,
        &config(Some("definitely-not-a-test-runner-xyz")),
        &generator,
    );

    assert_eq!(report.exit_code(), exit_codes::INFRASTRUCTURE);
    assert!(!report.visited(PipelineState::Parsing));
}

#[test]
fn manifest_declared_suite_is_probed() {
    let project = project(&[
        ("package.json", r#"{"scripts":{"test":"mocha"}}"#),
        ("src/util.test.js", ""),
    ]);
    let cfg = AutofixConfig {
        tests: TestsConfig {
            manifest_command: "echo ok".to_string(),
            ..TestsConfig::default()
        },
        ..AutofixConfig::default()
    };
    let generator = ScriptedGenerator::new(Vec::new());

    let report = run(&project, &cfg, &generator);

    assert_eq!(report.result.as_ref().ok(), Some(&PipelineOutcome::Passed));
}
