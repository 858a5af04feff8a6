use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};

use super::{CiStatus, RepoSource, StatusReporter, StatusRequest, truncate_description};
use crate::errors::ReportError;

const DESCRIPTION_LIMIT: usize = 255;
const DESCRIPTION_KEEP: usize = 253;

/// A repository on a Forgejo or Gitea instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ForgejoConfiguration {
    /// Host name of the instance, e.g. `codeberg.org`
    #[serde(default, alias = "domain")]
    pub domain: String,
    #[serde(default, alias = "user")]
    pub user: String,
    #[serde(default, alias = "repository")]
    pub repository: String,
    #[serde(default, alias = "token")]
    pub token: String,
    /// Clone over SSH instead of HTTPS
    #[serde(default, alias = "ssh", alias = "SSH")]
    pub ssh: bool,
}

impl ForgejoConfiguration {
    pub fn status_request(
        &self,
        status: CiStatus,
        context: &str,
        description: &str,
        hash: &str,
    ) -> Option<StatusRequest> {
        if self.token.is_empty() {
            return None;
        }

        let state = match status {
            CiStatus::InProgress => "pending",
            CiStatus::Failed => "failure",
            CiStatus::Error => "error",
            CiStatus::Succeeded => "success",
        };

        Some(StatusRequest {
            method: Method::POST,
            url: format!(
                "https://{}/api/v1/repos/{}/{}/statuses/{}",
                self.domain, self.user, self.repository, hash
            ),
            headers: vec![("Authorization", format!("token {}", self.token))],
            body: serde_json::json!({
                "state": state,
                "context": context,
                "description": truncate_description(description, DESCRIPTION_LIMIT, DESCRIPTION_KEEP),
            }),
        })
    }
}

#[async_trait]
impl RepoSource for ForgejoConfiguration {
    fn is_valid(&self) -> bool {
        !self.domain.is_empty() && !self.user.is_empty() && !self.repository.is_empty()
    }

    fn git_url(&self) -> String {
        if self.ssh {
            format!("git@{}:{}/{}.git", self.domain, self.user, self.repository)
        } else {
            format!("https://{}/{}/{}.git", self.domain, self.user, self.repository)
        }
    }

    fn nix_url(&self, revision: &str) -> String {
        let scheme = if self.ssh { "git+ssh://git@" } else { "git+https://" };
        format!(
            "{}{}/{}/{}?rev={}",
            scheme, self.domain, self.user, self.repository, revision
        )
    }

    async fn set_status(
        &self,
        reporter: &StatusReporter,
        status: CiStatus,
        context: &str,
        description: &str,
        hash: &str,
    ) -> Result<(), ReportError> {
        reporter
            .send_opt(self.status_request(status, context, description, hash))
            .await
    }
}
