//! Runtime configuration for cix.
//!
//! The configuration is a JSON file read once at startup:
//!
//! ```json
//! {
//!   "Var": "$HOME/.cache/cix",
//!   "Name": "builder-1",
//!   "Verbose": false,
//!   "Timeout": 900,
//!   "NixPath": "/run/current-system/sw/bin/nix",
//!   "Repositories": [
//!     { "Github": { "User": "octo", "Repository": "demo", "StatusPat": "ghp_..." }, "Branch": "main" },
//!     { "Ssh": { "Remote": "git@example.org:demo.git" }, "Branch": "trunk" }
//!   ]
//! }
//! ```
//!
//! Keys are PascalCase. Lowercase spellings and a few common alternates
//! (`GitHub`, `SSH`, `nixPath`) are accepted too.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::ConfigError;
use crate::source::{
    BitbucketConfiguration, ForgejoConfiguration, GithubConfiguration, RepoSource,
    SshConfiguration,
};

const DEFAULT_TIMEOUT_SECS: u64 = 15 * 60;
const DEFAULT_NIX_PATH: &str = "nix";
const PRODUCT_NAME: &str = "Cix";

/// One watched repository: where it lives and which branch to track.
///
/// At most one of the forge blocks is expected to be filled in. When more are,
/// the first valid one in the order Bitbucket, Forgejo, GitHub, Ssh wins.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RepositoryConfiguration {
    #[serde(default, alias = "bitbucket", alias = "BitBucket")]
    pub bitbucket: Option<BitbucketConfiguration>,
    #[serde(default, alias = "forgejo")]
    pub forgejo: Option<ForgejoConfiguration>,
    #[serde(default, alias = "github", alias = "GitHub")]
    pub github: Option<GithubConfiguration>,
    #[serde(default, alias = "ssh", alias = "SSH")]
    pub ssh: Option<SshConfiguration>,
    /// The branch to check
    #[serde(default, alias = "branch")]
    pub branch: String,
}

impl RepositoryConfiguration {
    /// The first configured source that validates, in priority order.
    pub fn source(&self) -> Option<&dyn RepoSource> {
        let candidates: [Option<&dyn RepoSource>; 4] = [
            self.bitbucket.as_ref().map(|s| s as &dyn RepoSource),
            self.forgejo.as_ref().map(|s| s as &dyn RepoSource),
            self.github.as_ref().map(|s| s as &dyn RepoSource),
            self.ssh.as_ref().map(|s| s as &dyn RepoSource),
        ];
        candidates.into_iter().flatten().find(|s| s.is_valid())
    }

    /// Stable on-disk name for this repository's mirror.
    pub fn identifier(&self) -> Option<String> {
        self.source()
            .map(|source| identifier(&source.git_url(), &self.branch))
    }
}

/// SHA-256 of the git URL and the branch, as lowercase hex.
///
/// The two are joined by a NUL byte, which git allows in neither a URL nor a
/// ref name, so distinct pairs never share a mirror.
pub fn identifier(git_url: &str, branch: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(git_url.as_bytes());
    hasher.update(b"\0");
    hasher.update(branch.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Top-level configuration, immutable once loaded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Configuration {
    /// Path to our data folder
    #[serde(default, alias = "var")]
    pub var: PathBuf,
    /// A name for this runner
    #[serde(default, alias = "name")]
    pub name: String,
    #[serde(default, alias = "verbose")]
    pub verbose: bool,
    /// Timeout in seconds for a single check run, 0 means the default
    #[serde(default, alias = "timeout")]
    pub timeout: u64,
    /// Path to the check tool, empty means `nix` from PATH
    #[serde(default, alias = "nixPath", alias = "nixpath")]
    pub nix_path: String,
    #[serde(default, alias = "repositories")]
    pub repositories: Vec<RepositoryConfiguration>,
}

impl Configuration {
    /// Read a JSON configuration file and expand environment references in `Var`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let blob = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&blob).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_json(blob: &str) -> Result<Self, serde_json::Error> {
        let mut config: Configuration = serde_json::from_str(blob)?;
        config.var = expand_path(&config.var);
        Ok(config)
    }

    /// Every repository must resolve to a source and name a branch.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (index, repo) in self.repositories.iter().enumerate() {
            if repo.source().is_none() {
                return Err(ConfigError::NoValidSource {
                    index,
                    branch: repo.branch.clone(),
                });
            }
            if repo.branch.is_empty() {
                return Err(ConfigError::EmptyBranch { index });
            }
        }
        Ok(())
    }

    pub fn resolved_timeout(&self) -> Duration {
        if self.timeout == 0 {
            Duration::from_secs(DEFAULT_TIMEOUT_SECS)
        } else {
            Duration::from_secs(self.timeout)
        }
    }

    pub fn resolved_nix_path(&self) -> &str {
        if self.nix_path.is_empty() {
            DEFAULT_NIX_PATH
        } else {
            &self.nix_path
        }
    }

    /// Context label attached to every status we report.
    pub fn resolved_name(&self) -> String {
        if self.name.is_empty() {
            PRODUCT_NAME.to_string()
        } else {
            format!("{} ({})", self.name, PRODUCT_NAME)
        }
    }

    /// Directory holding one bare mirror per repository identifier.
    pub fn mirror_root(&self) -> PathBuf {
        self.var.join("v1").join("repositories")
    }
}

/// Expand `~`, `$VAR` and `${VAR}`. Unset variables become empty.
fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    let expanded = shellexpand::full_with_context_no_errors(
        &*raw,
        || std::env::var("HOME").ok(),
        |name| Some(std::env::var(name).unwrap_or_default()),
    );
    PathBuf::from(expanded.as_ref())
}
