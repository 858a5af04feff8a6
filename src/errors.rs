//! Typed error hierarchy for cix.
//!
//! - `ConfigError` covers loading and validating the configuration file
//! - `MirrorError` covers git invocations against a local mirror
//! - `ReportError` covers outbound commit-status calls (logged, never fatal)
//! - `TickError` is what a tick surfaces to the process loop

use std::path::PathBuf;

use thiserror::Error;

/// Errors from loading or validating the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Bad json in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Repository #{index} (branch '{branch}') has no valid source configured")]
    NoValidSource { index: usize, branch: String },

    #[error("Repository #{index} has no branch configured")]
    EmptyBranch { index: usize },
}

/// Errors from git operations against a local mirror.
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("Failed to run git {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create mirror parent directory {path}: {source}")]
    CreateParent {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Mirror path {0} has no parent or file name")]
    InvalidPath(PathBuf),

    #[error("Clone failed for {remote} / {branch}: {stderr}")]
    CloneFailed {
        remote: String,
        branch: String,
        stderr: String,
    },

    #[error("Fetch failed for {path} / {branch}: {stderr}")]
    FetchFailed {
        path: PathBuf,
        branch: String,
        stderr: String,
    },

    #[error("Failed listing commits for {path} / {branch}: {stderr}")]
    ListFailed {
        path: PathBuf,
        branch: String,
        stderr: String,
    },

    #[error("Did not understand hash: '{0}'")]
    MalformedHash(String),
}

/// Errors from reporting a commit status to a forge.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Error posting status to {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Errors that abort a tick.
#[derive(Debug, Error)]
pub enum TickError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Mirror(#[from] MirrorError),

    #[error("Check failed to run for commit {hash}: {source:#}")]
    Check {
        hash: String,
        #[source]
        source: anyhow::Error,
    },
}
