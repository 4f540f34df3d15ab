//! Test-only doubles for pipeline capabilities and a scratch git project.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, anyhow};
use tempfile::TempDir;

use crate::core::types::{CommitOutcome, TestRunResult};
use crate::io::probe::TestProbe;
use crate::io::test_runner::TestRunner;
use crate::patch::{PatchGenerator, PatchRequest};
use crate::publish::Publisher;

/// One scripted response of [`ScriptedTestRunner`].
#[derive(Debug, Clone)]
pub enum ScriptedRun {
    Pass(String),
    Fail(String),
    /// Returned as an `Err`, like a spawn failure or timeout.
    Infra(String),
}

/// Test runner that replays a fixed sequence of results.
pub struct ScriptedTestRunner {
    runs: RefCell<VecDeque<ScriptedRun>>,
    calls: Cell<usize>,
}

impl ScriptedTestRunner {
    pub fn new(runs: Vec<ScriptedRun>) -> Self {
        Self {
            runs: RefCell::new(runs.into()),
            calls: Cell::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }

    pub fn assert_drained(&self) -> Result<()> {
        let left = self.runs.borrow().len();
        if left > 0 {
            return Err(anyhow!("{left} scripted test run(s) were never consumed"));
        }
        Ok(())
    }
}

impl TestRunner for ScriptedTestRunner {
    fn run(&self) -> Result<TestRunResult> {
        self.calls.set(self.calls.get() + 1);
        let next = self
            .runs
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("unexpected test run #{}", self.calls.get()))?;
        match next {
            ScriptedRun::Pass(output) => Ok(TestRunResult::passed(output)),
            ScriptedRun::Fail(output) => Ok(TestRunResult::failed(output)),
            ScriptedRun::Infra(message) => Err(anyhow!(message)),
        }
    }
}

/// Patch generator that replays fixed replies and records every request.
pub struct ScriptedGenerator {
    replies: RefCell<VecDeque<Result<String, String>>>,
    requests: RefCell<Vec<PatchRequest>>,
}

impl ScriptedGenerator {
    pub fn new(replies: Vec<Result<String, String>>) -> Self {
        Self {
            replies: RefCell::new(replies.into()),
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn replying(replies: &[&str]) -> Self {
        Self::new(replies.iter().map(|r| Ok((*r).to_string())).collect())
    }

    pub fn requests(&self) -> Vec<PatchRequest> {
        self.requests.borrow().clone()
    }
}

impl PatchGenerator for ScriptedGenerator {
    fn generate(&self, request: &PatchRequest) -> Result<String> {
        self.requests.borrow_mut().push(request.clone());
        match self.replies.borrow_mut().pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("unexpected patch request")),
        }
    }
}

/// Publisher that records calls instead of touching git.
pub struct RecordingPublisher {
    outcome: Result<CommitOutcome, String>,
    calls: Cell<usize>,
}

impl RecordingPublisher {
    pub fn committing() -> Self {
        Self {
            outcome: Ok(CommitOutcome::success()),
            calls: Cell::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            outcome: Err(message.to_string()),
            calls: Cell::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl Publisher for RecordingPublisher {
    fn publish(&self) -> Result<CommitOutcome> {
        self.calls.set(self.calls.get() + 1);
        self.outcome.clone().map_err(|message| anyhow!(message))
    }
}

/// Probe with a fixed answer.
pub struct StaticProbe(pub bool);

impl TestProbe for StaticProbe {
    fn has_tests(&self) -> bool {
        self.0
    }
}

/// Scratch project: a git work tree with a bare `origin` it has pushed to.
pub struct TestProject {
    _temp: TempDir,
    root: PathBuf,
    remote: PathBuf,
}

impl TestProject {
    pub fn new() -> Result<Self> {
        let temp = tempfile::tempdir().context("create tempdir")?;
        let root = temp.path().join("work");
        let remote = temp.path().join("origin.git");
        fs::create_dir_all(&root).context("create work dir")?;

        git(temp.path(), &["init", "--bare", "-q", &path_str(&remote)?])?;
        git(&root, &["init", "-q", "-b", "main"])?;
        git(&root, &["config", "user.email", "autofix@example.com"])?;
        git(&root, &["config", "user.name", "autofix"])?;
        git(&root, &["config", "commit.gpgsign", "false"])?;
        git(&root, &["remote", "add", "origin", &path_str(&remote)?])?;

        let project = Self {
            _temp: temp,
            root,
            remote,
        };
        project.write("README.md", "# scratch\n")?;
        project.commit_all("initial")?;
        git(&project.root, &["push", "-q", "-u", "origin", "main"])?;
        Ok(project)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn write(&self, relative: &str, contents: &str) -> Result<PathBuf> {
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
        Ok(path)
    }

    pub fn read(&self, relative: &str) -> Result<String> {
        let path = self.root.join(relative);
        fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))
    }

    pub fn commit_all(&self, message: &str) -> Result<()> {
        git(&self.root, &["add", "-A"])?;
        git(&self.root, &["commit", "-q", "-m", message])?;
        Ok(())
    }

    /// Subject line of the work tree's HEAD commit.
    pub fn head_subject(&self) -> Result<String> {
        git(&self.root, &["log", "-1", "--format=%s"]).map(|s| s.trim().to_string())
    }

    /// Subject line of `main` as seen by the bare remote.
    pub fn remote_head_subject(&self) -> Result<String> {
        git(&self.remote, &["log", "-1", "--format=%s", "main"]).map(|s| s.trim().to_string())
    }

    pub fn commit_count(&self) -> Result<usize> {
        let out = git(&self.root, &["rev-list", "--count", "HEAD"])?;
        out.trim()
            .parse()
            .with_context(|| format!("parse commit count '{}'", out.trim()))
    }
}

fn path_str(path: &Path) -> Result<String> {
    path.to_str()
        .map(str::to_string)
        .ok_or_else(|| anyhow!("non-utf8 path {}", path.display()))
}

fn git(dir: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .with_context(|| format!("spawn git {}", args.join(" ")))?;
    if !output.status.success() {
        return Err(anyhow!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}
