//! Forge-specific repository sources and commit-status reporting.
//!
//! Every forge block in the configuration implements [`RepoSource`]. The engine
//! only ever talks to the trait; the per-forge modules translate a [`CiStatus`]
//! into that forge's wire format and hand the finished [`StatusRequest`] to the
//! shared [`StatusReporter`].

mod bitbucket;
mod forgejo;
mod github;
mod ssh;

pub use bitbucket::BitbucketConfiguration;
pub use forgejo::ForgejoConfiguration;
pub use github::GithubConfiguration;
pub use ssh::SshConfiguration;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use tracing::{debug, warn};

use crate::errors::ReportError;

const USER_AGENT: &str = concat!("cix/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Abstract state of a check run, as reported to a forge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CiStatus {
    InProgress,
    Failed,
    Error,
    Succeeded,
}

impl std::fmt::Display for CiStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CiStatus::InProgress => write!(f, "in-progress"),
            CiStatus::Failed => write!(f, "failed"),
            CiStatus::Error => write!(f, "error"),
            CiStatus::Succeeded => write!(f, "succeeded"),
        }
    }
}

/// A git repository hosted somewhere we can clone from and maybe report to.
#[async_trait]
pub trait RepoSource: Send + Sync {
    /// Whether enough of the block is filled in to use it.
    fn is_valid(&self) -> bool;

    /// Address used for `git clone` and `git fetch`.
    fn git_url(&self) -> String;

    /// Revision-pinned reference, only used in status descriptions.
    fn nix_url(&self, revision: &str) -> String;

    /// Report `status` for commit `hash`.
    ///
    /// Succeeds without doing anything when no credential is configured.
    /// Non-2xx answers are logged, not returned; only transport failures are errors.
    async fn set_status(
        &self,
        reporter: &StatusReporter,
        status: CiStatus,
        context: &str,
        description: &str,
        hash: &str,
    ) -> Result<(), ReportError>;
}

/// A fully-formed outbound status call.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
    pub body: serde_json::Value,
}

/// Owns the HTTP client shared by every forge.
#[derive(Debug, Clone)]
pub struct StatusReporter {
    client: reqwest::Client,
    /// Scheme and authority that replace the forge's in test builds
    #[cfg(test)]
    origin: Option<String>,
}

impl StatusReporter {
    pub fn new() -> Result<Self, ReportError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(ReportError::Client)?;
        Ok(Self {
            client,
            #[cfg(test)]
            origin: None,
        })
    }

    /// A reporter that sends every status to `origin` instead of the forge.
    #[cfg(test)]
    pub(crate) fn redirected(origin: &str) -> Self {
        let mut reporter = Self::new().unwrap();
        reporter.origin = Some(origin.trim_end_matches('/').to_string());
        reporter
    }

    #[cfg(not(test))]
    fn target(&self, url: String) -> String {
        url
    }

    #[cfg(test)]
    fn target(&self, url: String) -> String {
        let Some(origin) = &self.origin else {
            return url;
        };
        match reqwest::Url::parse(&url) {
            Ok(parsed) => match parsed.query() {
                Some(query) => format!("{}{}?{}", origin, parsed.path(), query),
                None => format!("{}{}", origin, parsed.path()),
            },
            Err(_) => url,
        }
    }

    /// Send one status call. Rejections by the forge are logged and swallowed.
    pub async fn send(&self, request: StatusRequest) -> Result<(), ReportError> {
        let StatusRequest {
            method,
            url,
            headers,
            body,
        } = request;
        let url = self.target(url);

        let mut builder = self.client.request(method.clone(), &url).json(&body);
        for (name, value) in headers {
            builder = builder.header(name, value);
        }

        let resp = builder
            .send()
            .await
            .map_err(|source| ReportError::Transport {
                url: url.clone(),
                source,
            })?;

        let status = resp.status();
        if status.is_success() {
            debug!(%method, %url, status = status.as_u16(), "status reported");
            return Ok(());
        }

        let text = resp.text().await.unwrap_or_default();
        warn!(
            %method,
            %url,
            status = status.as_u16(),
            body = %text,
            "forge rejected status update"
        );
        Ok(())
    }

    /// Send `request` if there is one; `None` means the source has nothing to report.
    pub(crate) async fn send_opt(&self, request: Option<StatusRequest>) -> Result<(), ReportError> {
        match request {
            Some(request) => self.send(request).await,
            None => Ok(()),
        }
    }
}

/// Cut `description` to `keep` characters plus an ellipsis when it exceeds `limit`.
pub(crate) fn truncate_description(description: &str, limit: usize, keep: usize) -> String {
    if description.chars().count() <= limit {
        return description.to_string();
    }
    let mut cut: String = description.chars().take(keep).collect();
    cut.push('…');
    cut
}
