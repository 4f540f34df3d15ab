//! Minimal `git` subprocess adapter used to publish verified fixes.
//!
//! Publishing is the only stage that touches version control.

use std::path::PathBuf;
use std::process::{Command, Output};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument};

#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    /// Paths with staged, unstaged or untracked changes (ignored files excluded).
    pub fn pending_paths(&self) -> Result<Vec<String>> {
        let out = self.stdout(&["status", "--porcelain=v1", "-uall"])?;
        Ok(out.lines().filter_map(porcelain_path).collect())
    }

    pub fn stage_all(&self) -> Result<()> {
        self.checked(&["add", "-A"])?;
        Ok(())
    }

    /// Commit whatever is staged. Returns `false` without committing when the
    /// index matches HEAD.
    #[instrument(skip_all)]
    pub fn commit_staged(&self, message: &str) -> Result<bool> {
        // `diff --quiet` exits 1 when there are differences.
        let diff = self.output(&["diff", "--cached", "--quiet"])?;
        match diff.status.code() {
            Some(0) => {
                debug!("index matches HEAD, nothing to commit");
                Ok(false)
            }
            Some(1) => {
                self.checked(&["commit", "--quiet", "-m", message])?;
                debug!("committed staged changes");
                Ok(true)
            }
            _ => Err(failure(&["diff", "--cached", "--quiet"], &diff)),
        }
    }

    /// Name of the checked-out branch. Detached HEAD is an error.
    pub fn current_branch(&self) -> Result<String> {
        let out = self.output(&["symbolic-ref", "--short", "-q", "HEAD"])?;
        if !out.status.success() {
            return Err(anyhow!("HEAD is detached; no branch to push"));
        }
        Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
    }

    #[instrument(skip_all, fields(remote, branch))]
    pub fn push(&self, remote: &str, branch: &str) -> Result<()> {
        self.checked(&["push", "--quiet", remote, branch])?;
        debug!("pushed");
        Ok(())
    }

    fn stdout(&self, args: &[&str]) -> Result<String> {
        let out = self.checked(args)?;
        Ok(String::from_utf8_lossy(&out.stdout).into_owned())
    }

    fn checked(&self, args: &[&str]) -> Result<Output> {
        let out = self.output(args)?;
        if out.status.success() {
            Ok(out)
        } else {
            Err(failure(args, &out))
        }
    }

    fn output(&self, args: &[&str]) -> Result<Output> {
        Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))
    }
}

fn failure(args: &[&str], out: &Output) -> anyhow::Error {
    anyhow!(
        "git {} exited with {}: {}",
        args.join(" "),
        out.status,
        String::from_utf8_lossy(&out.stderr).trim()
    )
}

/// Path part of a `status --porcelain=v1` line; the new name for renames.
fn porcelain_path(line: &str) -> Option<String> {
    let path = line.get(3..)?.trim();
    let path = path.rsplit_once(" -> ").map_or(path, |(_, new)| new);
    (!path.is_empty()).then(|| path.to_string())
}
