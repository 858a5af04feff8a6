use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{CiStatus, RepoSource, StatusReporter};
use crate::errors::ReportError;

/// A plain git remote with no status API.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SshConfiguration {
    /// The git repository URL
    #[serde(default, alias = "remote")]
    pub remote: String,
}

#[async_trait]
impl RepoSource for SshConfiguration {
    fn is_valid(&self) -> bool {
        !self.remote.is_empty()
    }

    fn git_url(&self) -> String {
        self.remote.clone()
    }

    fn nix_url(&self, revision: &str) -> String {
        format!("git+ssh://{}?rev={}", self.remote, revision)
    }

    async fn set_status(
        &self,
        _reporter: &StatusReporter,
        _status: CiStatus,
        _context: &str,
        _description: &str,
        _hash: &str,
    ) -> Result<(), ReportError> {
        // nowhere to report to
        Ok(())
    }
}
