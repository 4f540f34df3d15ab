//! Publishing verified fixes to version control.

use anyhow::{Context, Result};
use tracing::{info, instrument};

use crate::core::types::CommitOutcome;
use crate::io::config::PublishConfig;
use crate::io::git::Git;

/// Records a verified fix in version control.
pub trait Publisher {
    /// Stage, commit and push pending changes; no-op when nothing changed.
    fn publish(&self) -> Result<CommitOutcome>;
}

/// Stage-all, commit with a fixed message, push the current branch.
pub struct GitPublisher {
    git: Git,
    message: String,
    remote: String,
}

impl GitPublisher {
    pub fn new(git: Git, cfg: &PublishConfig) -> Self {
        Self {
            git,
            message: cfg.message.clone(),
            remote: cfg.remote.clone(),
        }
    }
}

impl Publisher for GitPublisher {
    #[instrument(skip_all, fields(remote = %self.remote))]
    fn publish(&self) -> Result<CommitOutcome> {
        let pending = self.git.pending_paths().context("check for pending changes")?;
        if pending.is_empty() {
            info!("no changes to publish");
            return Ok(CommitOutcome::no_changes());
        }
        info!(files = ?pending, "publishing changes");
        self.git.stage_all().context("stage changes")?;
        if !self.git.commit_staged(&self.message).context("commit fix")? {
            info!("nothing staged after add, skipping commit");
            return Ok(CommitOutcome::no_changes());
        }
        let branch = self.git.current_branch().context("resolve current branch")?;
        self.git
            .push(&self.remote, &branch)
            .with_context(|| format!("push {branch} to {}", self.remote))?;
        info!(branch = %branch, "fix committed and pushed");
        Ok(CommitOutcome::success())
    }
}
