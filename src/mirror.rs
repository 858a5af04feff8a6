//! Local bare mirrors of watched repositories.
//!
//! All git work goes through the `git` binary with the mirror (or its parent,
//! for the initial clone) as the working directory.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};

use tokio::process::Command;
use tracing::{debug, warn};

use crate::errors::MirrorError;

/// Hashes reachable from a branch tip. Ordered so diffs come out sorted.
pub type CommitSet = BTreeSet<String>;

/// Whether `line` is a full 40-character hex object name.
pub fn is_commit_hash(line: &str) -> bool {
    line.len() == 40 && line.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Parse `git rev-list` output, rejecting anything that is not a hash.
pub fn parse_commit_list(output: &str) -> Result<CommitSet, MirrorError> {
    let mut commits = CommitSet::new();
    for line in output.lines() {
        if line.is_empty() {
            continue;
        }
        if !is_commit_hash(line) {
            return Err(MirrorError::MalformedHash(line.to_string()));
        }
        commits.insert(line.to_string());
    }
    Ok(commits)
}

/// A bare, single-branch clone living under the data root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mirror {
    path: PathBuf,
}

impl Mirror {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A bare repository always has a `config` file at its root.
    pub fn exists(&self) -> bool {
        self.path.join("config").exists()
    }

    /// Clone `remote` at `branch` into this mirror's path.
    ///
    /// A failed clone leaves nothing behind, so the next tick starts clean.
    pub async fn clone_remote(&self, remote: &str, branch: &str) -> Result<(), MirrorError> {
        let (Some(parent), Some(name)) = (self.path.parent(), self.path.file_name()) else {
            return Err(MirrorError::InvalidPath(self.path.clone()));
        };

        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| MirrorError::CreateParent {
                path: parent.to_path_buf(),
                source,
            })?;

        let mut cmd = git(parent);
        cmd.args(["clone", "--bare", "--single-branch", "-b", branch, remote])
            .arg(name);

        let failure = match run(cmd, "clone").await {
            Ok(output) if output.status.success() => return Ok(()),
            Ok(output) => stderr_of(&output),
            Err(e) => e.to_string(),
        };

        self.remove_partial().await;
        Err(MirrorError::CloneFailed {
            remote: remote.to_string(),
            branch: branch.to_string(),
            stderr: failure,
        })
    }

    /// Fast-forward the local `branch` from `origin`.
    pub async fn fetch(&self, branch: &str) -> Result<(), MirrorError> {
        let refspec = format!("{}:{}", branch, branch);
        let mut cmd = git(&self.path);
        cmd.args(["fetch", "origin", &refspec]);

        let output = run(cmd, "fetch").await?;
        if !output.status.success() {
            return Err(MirrorError::FetchFailed {
                path: self.path.clone(),
                branch: branch.to_string(),
                stderr: stderr_of(&output),
            });
        }
        Ok(())
    }

    /// Every commit reachable from the tip of `branch`.
    pub async fn list_commits(&self, branch: &str) -> Result<CommitSet, MirrorError> {
        let mut cmd = git(&self.path);
        cmd.args(["rev-list", branch]);

        let output = run(cmd, "rev-list").await?;
        if !output.status.success() {
            return Err(MirrorError::ListFailed {
                path: self.path.clone(),
                branch: branch.to_string(),
                stderr: stderr_of(&output),
            });
        }
        parse_commit_list(&String::from_utf8_lossy(&output.stdout))
    }

    async fn remove_partial(&self) {
        match tokio::fs::remove_dir_all(&self.path).await {
            Ok(()) => debug!(path = %self.path.display(), "removed partial mirror"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                path = %self.path.display(),
                error = %e,
                "failed to remove partial mirror"
            ),
        }
    }
}

fn git(dir: &Path) -> Command {
    let mut cmd = Command::new("git");
    cmd.current_dir(dir)
        .env("GIT_TERMINAL_PROMPT", "0")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    cmd
}

async fn run(mut cmd: Command, command: &str) -> Result<Output, MirrorError> {
    cmd.output().await.map_err(|source| MirrorError::Spawn {
        command: command.to_string(),
        source,
    })
}

fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}
