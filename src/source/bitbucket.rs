use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};

use super::{CiStatus, RepoSource, StatusReporter, StatusRequest};
use crate::errors::ReportError;

const API_BASE: &str = "https://api.bitbucket.org/2.0/repositories";

/// A repository on bitbucket.org.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BitbucketConfiguration {
    #[serde(default, alias = "workspace")]
    pub workspace: String,
    #[serde(default, alias = "repository")]
    pub repository: String,
    /// Access token with `repository:write`; empty disables status reporting
    #[serde(default, alias = "token")]
    pub token: String,
}

impl BitbucketConfiguration {
    /// Build the status call, or `None` when there is no token.
    ///
    /// Bitbucket creates a build status with POST and updates it in place with
    /// PUT on `.../build/<key>`, so only the in-progress announcement is a POST.
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

        let base = format!(
            "{}/{}/{}/commit/{}/statuses/build",
            API_BASE, self.workspace, self.repository, hash
        );
        let (method, state, url) = match status {
            CiStatus::InProgress => (Method::POST, "INPROGRESS", base),
            CiStatus::Failed => (Method::PUT, "FAILED", format!("{}/{}", base, context)),
            CiStatus::Error => (Method::PUT, "STOPPED", format!("{}/{}", base, context)),
            CiStatus::Succeeded => (Method::PUT, "SUCCESSFUL", format!("{}/{}", base, context)),
        };

        let body = serde_json::json!({
            "key": context,
            "state": state,
            "description": description,
            "url": format!("https://bitbucket.org/{}/{}", self.workspace, self.repository),
        });

        Some(StatusRequest {
            method,
            url,
            headers: vec![
                ("Accept", "application/json".to_string()),
                ("Authorization", format!("Bearer {}", self.token)),
            ],
            body,
        })
    }
}

#[async_trait]
impl RepoSource for BitbucketConfiguration {
    fn is_valid(&self) -> bool {
        !self.workspace.is_empty() && !self.repository.is_empty()
    }

    fn git_url(&self) -> String {
        format!("git@bitbucket.org:{}/{}", self.workspace, self.repository)
    }

    fn nix_url(&self, revision: &str) -> String {
        format!(
            "git+ssh://git@bitbucket.org:{}/{}?rev={}",
            self.workspace, self.repository, revision
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

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> BitbucketConfiguration {
        BitbucketConfiguration {
            workspace: "acme".to_string(),
            repository: "widget".to_string(),
            token: "bbtoken".to_string(),
        }
    }

    #[test]
    fn test_valid_requires_workspace_and_repository() {
        assert!(configured().is_valid());
        assert!(!BitbucketConfiguration::default().is_valid());
        let no_repo = BitbucketConfiguration {
            repository: String::new(),
            ..configured()
        };
        assert!(!no_repo.is_valid());
    }

    #[test]
    fn test_urls() {
        let bb = configured();
        assert_eq!(bb.git_url(), "git@bitbucket.org:acme/widget");
        assert_eq!(
            bb.nix_url("abc123"),
            "git+ssh://git@bitbucket.org:acme/widget?rev=abc123"
        );
    }

    #[test]
    fn test_in_progress_is_post_without_key_segment() {
        let req = configured()
            .status_request(CiStatus::InProgress, "Cix", "", "deadbeef")
            .unwrap();
        assert_eq!(req.method, Method::POST);
        assert_eq!(
            req.url,
            "https://api.bitbucket.org/2.0/repositories/acme/widget/commit/deadbeef/statuses/build"
        );
        assert_eq!(req.body["state"], "INPROGRESS");
        assert_eq!(req.body["key"], "Cix");
        assert_eq!(req.body["url"], "https://bitbucket.org/acme/widget");
    }

    #[test]
    fn test_terminal_states_are_put_on_key() {
        let bb = configured();
        for (status, expected) in [
            (CiStatus::Failed, "FAILED"),
            (CiStatus::Error, "STOPPED"),
            (CiStatus::Succeeded, "SUCCESSFUL"),
        ] {
            let req = bb.status_request(status, "Cix", "done", "deadbeef").unwrap();
            assert_eq!(req.method, Method::PUT);
            assert!(req.url.ends_with("/statuses/build/Cix"));
            assert_eq!(req.body["state"], expected);
        }
    }

    #[test]
    fn test_description_is_not_truncated() {
        let long = "x".repeat(500);
        let req = configured()
            .status_request(CiStatus::Succeeded, "Cix", &long, "deadbeef")
            .unwrap();
        assert_eq!(req.body["description"].as_str().unwrap().len(), 500);
    }

    #[test]
    fn test_bearer_auth_header() {
        let req = configured()
            .status_request(CiStatus::Failed, "Cix", "", "deadbeef")
            .unwrap();
        assert!(
            req.headers
                .contains(&("Authorization", "Bearer bbtoken".to_string()))
        );
    }

    #[test]
    fn test_no_token_no_request() {
        let bb = BitbucketConfiguration {
            token: String::new(),
            ..configured()
        };
        assert!(bb.status_request(CiStatus::Succeeded, "Cix", "", "x").is_none());
    }

    #[tokio::test]
    async fn test_set_status_without_token_is_ok() {
        let bb = BitbucketConfiguration {
            token: String::new(),
            ..configured()
        };
        let reporter = StatusReporter::new().unwrap();
        assert!(
            bb.set_status(&reporter, CiStatus::Succeeded, "Cix", "", "deadbeef")
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_set_status_reaches_api() {
        let sink = crate::test_support::StatusSink::start().await;
        let reporter = StatusReporter::redirected(&sink.origin);
        let bb = configured();

        bb.set_status(&reporter, CiStatus::InProgress, "Cix", "", "deadbeef")
            .await
            .unwrap();
        bb.set_status(&reporter, CiStatus::Succeeded, "Cix", "all good", "deadbeef")
            .await
            .unwrap();

        let received = sink.received();
        assert_eq!(received.len(), 2);
        assert_eq!(received[0].method, Method::POST);
        assert_eq!(
            received[0].path,
            "/2.0/repositories/acme/widget/commit/deadbeef/statuses/build"
        );
        assert_eq!(received[0].header("authorization"), Some("Bearer bbtoken"));
        assert_eq!(received[0].body["state"], "INPROGRESS");

        assert_eq!(received[1].method, Method::PUT);
        assert_eq!(
            received[1].path,
            "/2.0/repositories/acme/widget/commit/deadbeef/statuses/build/Cix"
        );
        assert_eq!(received[1].body["state"], "SUCCESSFUL");
        assert_eq!(received[1].body["description"], "all good");
        assert_eq!(received[1].body["key"], "Cix");
    }
}
