//! The tick driver.
//!
//! A tick walks every configured repository in order, brings its mirror up to
//! date, and turns commits that arrived with the fetch into [`Operation`]s.
//! Once every repository has been diffed the operations run one at a time.
//! Any mirror failure or check-tool failure ends the tick; the caller retries
//! on its next interval.

mod operation;

pub use operation::Operation;

use tracing::{debug, info};

use crate::check::CheckRunner;
use crate::config::{Configuration, identifier};
use crate::errors::{ConfigError, TickError};
use crate::mirror::{CommitSet, Mirror};
use crate::source::StatusReporter;

/// Commits in `after` that were not in `before`, in hash order.
pub fn new_commits(before: &CommitSet, after: &CommitSet) -> Vec<String> {
    after.difference(before).cloned().collect()
}

pub struct Poller<'a, C> {
    config: &'a Configuration,
    reporter: StatusReporter,
    checks: C,
    /// Status context label, resolved once from the configuration
    name: String,
}

impl<'a, C: CheckRunner> Poller<'a, C> {
    pub fn new(config: &'a Configuration, reporter: StatusReporter, checks: C) -> Self {
        Self {
            name: config.resolved_name(),
            config,
            reporter,
            checks,
        }
    }

    /// One full poll-and-process cycle.
    pub async fn tick(&self) -> Result<(), TickError> {
        self.config.validate()?;

        let ops = self.gather_new_commits().await?;
        info!(operations = ops.len(), "gathered new commits");

        self.run_operations(&ops).await
    }

    /// Sync every mirror and collect an operation per newly fetched commit.
    ///
    /// A freshly cloned mirror is the baseline: its commits are never reported.
    pub async fn gather_new_commits(&self) -> Result<Vec<Operation<'a>>, TickError> {
        let config: &'a Configuration = self.config;
        let mut ops = Vec::new();
        let root = config.mirror_root();

        for (index, repo) in config.repositories.iter().enumerate() {
            let source = repo.source().ok_or_else(|| ConfigError::NoValidSource {
                index,
                branch: repo.branch.clone(),
            })?;
            let remote = source.git_url();
            let mirror = Mirror::new(root.join(identifier(&remote, &repo.branch)));
            debug!(%remote, branch = %repo.branch, path = %mirror.path().display(), "repository");

            if !mirror.exists() {
                info!(%remote, branch = %repo.branch, "cloning");
                mirror.clone_remote(&remote, &repo.branch).await?;
            }

            let before = mirror.list_commits(&repo.branch).await?;
            debug!(commits = before.len(), "before fetch");
            mirror.fetch(&repo.branch).await?;
            let after = mirror.list_commits(&repo.branch).await?;
            debug!(commits = after.len(), "after fetch");

            for hash in new_commits(&before, &after) {
                info!(%remote, %hash, "new commit");
                ops.push(Operation {
                    mirror: mirror.clone(),
                    hash,
                    source,
                });
            }
        }

        Ok(ops)
    }

    /// Execute operations in order, stopping at the first check-tool failure.
    pub async fn run_operations(&self, ops: &[Operation<'_>]) -> Result<(), TickError> {
        for op in ops {
            self.execute(op).await?;
        }
        Ok(())
    }
}
