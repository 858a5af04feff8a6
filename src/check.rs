//! The external check run against each new commit.
//!
//! The poller only sees [`CheckRunner`]; [`NixCheckRunner`] is the real
//! implementation and tests substitute their own.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Lines of stderr kept when a check fails.
const STDERR_TAIL_LINES: usize = 20;

/// Everything a check needs to know about one commit.
#[derive(Debug, Clone, Copy)]
pub struct CheckRequest<'a> {
    /// Path to the bare mirror holding the commit
    pub repo_path: &'a Path,
    pub hash: &'a str,
    pub timeout: Duration,
    /// Check tool to invoke
    pub tool: &'a str,
}

/// Runs checks on a commit.
///
/// `Ok(true)` passed, `Ok(false)` failed, `Err` means the tooling itself broke.
#[async_trait]
pub trait CheckRunner: Send + Sync {
    async fn run_checks(&self, request: &CheckRequest<'_>) -> Result<bool>;
}

/// Runs `nix flake check` on the commit straight out of the mirror.
#[derive(Debug, Clone, Copy, Default)]
pub struct NixCheckRunner;

impl NixCheckRunner {
    pub fn flake_ref(repo_path: &Path, hash: &str) -> String {
        format!("git+file://{}?rev={}", repo_path.display(), hash)
    }
}

#[async_trait]
impl CheckRunner for NixCheckRunner {
    async fn run_checks(&self, request: &CheckRequest<'_>) -> Result<bool> {
        let flake = Self::flake_ref(request.repo_path, request.hash);
        info!(tool = request.tool, %flake, "running checks");

        let child = Command::new(request.tool)
            .args(["flake", "check", "--no-write-lock-file", &flake])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn check tool: {}", request.tool))?;

        let output = match timeout(request.timeout, child.wait_with_output()).await {
            Ok(result) => result.context("Failed to wait for check tool")?,
            Err(_) => {
                // dropping the future kills the child
                warn!(
                    hash = request.hash,
                    timeout_secs = request.timeout.as_secs(),
                    "check timed out"
                );
                return Ok(false);
            }
        };

        if output.status.success() {
            debug!(hash = request.hash, "checks passed");
            return Ok(true);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let lines: Vec<&str> = stderr.lines().collect();
        let tail = lines[lines.len().saturating_sub(STDERR_TAIL_LINES)..].join("\n");
        warn!(
            hash = request.hash,
            exit_code = output.status.code().unwrap_or(-1),
            stderr = %tail,
            "checks failed"
        );
        Ok(false)
    }
}
