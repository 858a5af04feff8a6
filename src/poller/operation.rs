use std::fmt;

use tracing::{info, warn};

use super::Poller;
use crate::check::{CheckRequest, CheckRunner};
use crate::errors::TickError;
use crate::mirror::Mirror;
use crate::source::{CiStatus, RepoSource};

/// One new commit to check and report on.
pub struct Operation<'a> {
    pub mirror: Mirror,
    pub hash: String,
    /// Where statuses for this commit go
    pub source: &'a dyn RepoSource,
}

impl fmt::Debug for Operation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("mirror", &self.mirror)
            .field("hash", &self.hash)
            .field("source", &self.source.git_url())
            .finish()
    }
}

impl<C: CheckRunner> Poller<'_, C> {
    /// Drive one operation from pending to a terminal status.
    ///
    /// Only a check that could not run is an error; a failing check is
    /// reported as `Failed` and returned as such.
    pub async fn execute(&self, op: &Operation<'_>) -> Result<CiStatus, TickError> {
        self.notify(op, CiStatus::InProgress, "").await;

        let description = format!("nix flake check {}", op.source.nix_url(&op.hash));
        let request = CheckRequest {
            repo_path: op.mirror.path(),
            hash: &op.hash,
            timeout: self.config.resolved_timeout(),
            tool: self.config.resolved_nix_path(),
        };

        let status = match self.checks.run_checks(&request).await {
            Ok(true) => CiStatus::Succeeded,
            Ok(false) => CiStatus::Failed,
            Err(source) => {
                self.notify(op, CiStatus::Error, &description).await;
                return Err(TickError::Check {
                    hash: op.hash.clone(),
                    source,
                });
            }
        };

        self.notify(op, status, &description).await;
        info!(hash = %op.hash, %status, "check finished");
        Ok(status)
    }

    async fn notify(&self, op: &Operation<'_>, status: CiStatus, description: &str) {
        if let Err(e) = op
            .source
            .set_status(&self.reporter, status, &self.name, description, &op.hash)
            .await
        {
            warn!(hash = %op.hash, %status, error = %e, "failed to report status");
        }
    }
}
