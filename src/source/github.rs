use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};

use super::{CiStatus, RepoSource, StatusReporter, StatusRequest, truncate_description};
use crate::errors::ReportError;

const GITHUB_API_BASE: &str = "https://api.github.com/repos";
const GITHUB_API_VERSION: &str = "2022-11-28";
const DESCRIPTION_LIMIT: usize = 140;
const DESCRIPTION_KEEP: usize = 136;

/// A repository on github.com.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GithubConfiguration {
    #[serde(default, alias = "user")]
    pub user: String,
    #[serde(default, alias = "repository")]
    pub repository: String,
    /// Personal access token allowed to write commit statuses
    #[serde(default, alias = "statusPat", alias = "statuspat", alias = "StatusPAT")]
    pub status_pat: String,
}

impl GithubConfiguration {
    pub fn status_request(
        &self,
        status: CiStatus,
        context: &str,
        description: &str,
        hash: &str,
    ) -> Option<StatusRequest> {
        if self.status_pat.is_empty() {
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
                "{}/{}/{}/statuses/{}",
                GITHUB_API_BASE, self.user, self.repository, hash
            ),
            headers: vec![
                ("Accept", "application/vnd.github+json".to_string()),
                ("X-GitHub-Api-Version", GITHUB_API_VERSION.to_string()),
                ("Authorization", format!("Bearer {}", self.status_pat)),
            ],
            body: serde_json::json!({
                "state": state,
                "context": context,
                "description": truncate_description(description, DESCRIPTION_LIMIT, DESCRIPTION_KEEP),
            }),
        })
    }
}

#[async_trait]
impl RepoSource for GithubConfiguration {
    fn is_valid(&self) -> bool {
        !self.user.is_empty() && !self.repository.is_empty()
    }

    fn git_url(&self) -> String {
        format!("git@github.com:{}/{}", self.user, self.repository)
    }

    fn nix_url(&self, revision: &str) -> String {
        format!("github:{}/{}?rev={}", self.user, self.repository, revision)
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
