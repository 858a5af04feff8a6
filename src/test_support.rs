//! Test doubles shared by the unit tests.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use axum::Router;
use axum::body::Bytes;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use tempfile::TempDir;

use crate::check::{CheckRequest, CheckRunner};
use crate::errors::ReportError;
use crate::source::{CiStatus, RepoSource, StatusReporter};

/// A well-formed 40-character hash made of one repeated hex digit.
pub fn hash_of(c: char) -> String {
    c.to_string().repeat(40)
}

/// A non-bare upstream repository on disk that tests commit to.
pub struct Upstream {
    dir: TempDir,
    branch: String,
}

impl Upstream {
    pub fn new(branch: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let repo = git2::Repository::init(dir.path()).unwrap();
        repo.set_head(&format!("refs/heads/{}", branch)).unwrap();
        Self {
            dir,
            branch: branch.to_string(),
        }
    }

    pub fn url(&self) -> String {
        self.dir.path().to_string_lossy().to_string()
    }

    /// Commit an empty tree on top of the branch and return the new hash.
    pub fn commit(&self, message: &str) -> String {
        let repo = git2::Repository::open(self.dir.path()).unwrap();
        let tree_id = repo.index().unwrap().write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let sig = git2::Signature::now("test", "test@test.com").unwrap();
        let refname = format!("refs/heads/{}", self.branch);
        let parent = repo
            .find_reference(&refname)
            .ok()
            .and_then(|r| r.peel_to_commit().ok());
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
        repo.commit(Some(&refname), &sig, &sig, message, &tree, &parents)
            .unwrap()
            .to_string()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusCall {
    pub status: CiStatus,
    pub context: String,
    pub description: String,
    pub hash: String,
}

/// A source that records every status instead of sending it.
pub struct RecordingSource {
    calls: Mutex<Vec<StatusCall>>,
    fail: bool,
}

impl RecordingSource {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    /// Records calls but answers each with a transport error.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn calls(&self) -> Vec<StatusCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn statuses(&self) -> Vec<CiStatus> {
        self.calls().into_iter().map(|c| c.status).collect()
    }
}

#[async_trait]
impl RepoSource for RecordingSource {
    fn is_valid(&self) -> bool {
        true
    }

    fn git_url(&self) -> String {
        "recorded".to_string()
    }

    fn nix_url(&self, revision: &str) -> String {
        format!("recorded:{}", revision)
    }

    async fn set_status(
        &self,
        reporter: &StatusReporter,
        status: CiStatus,
        context: &str,
        description: &str,
        hash: &str,
    ) -> Result<(), ReportError> {
        self.calls.lock().unwrap().push(StatusCall {
            status,
            context: context.to_string(),
            description: description.to_string(),
            hash: hash.to_string(),
        });
        if self.fail {
            // Port 1 is reserved and refuses connections.
            return reporter
                .send(crate::source::StatusRequest {
                    method: reqwest::Method::POST,
                    url: "http://127.0.0.1:1/status".to_string(),
                    headers: Vec::new(),
                    body: serde_json::json!({}),
                })
                .await;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeenCheck {
    pub repo_path: PathBuf,
    pub hash: String,
    pub timeout_secs: u64,
    pub tool: String,
}

/// Check runner with per-hash canned outcomes; unknown hashes pass.
pub struct ScriptedChecks {
    outcomes: HashMap<String, Result<bool, String>>,
    seen: Mutex<Vec<SeenCheck>>,
}

impl ScriptedChecks {
    pub fn passing() -> Self {
        Self {
            outcomes: HashMap::new(),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn with(mut self, hash: String, outcome: Result<bool, String>) -> Self {
        self.outcomes.insert(hash, outcome);
        self
    }

    pub fn seen(&self) -> Vec<SeenCheck> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl CheckRunner for ScriptedChecks {
    async fn run_checks(&self, request: &CheckRequest<'_>) -> Result<bool> {
        self.seen.lock().unwrap().push(SeenCheck {
            repo_path: request.repo_path.to_path_buf(),
            hash: request.hash.to_string(),
            timeout_secs: request.timeout.as_secs(),
            tool: request.tool.to_string(),
        });
        match self.outcomes.get(request.hash) {
            Some(Ok(passed)) => Ok(*passed),
            Some(Err(message)) => Err(anyhow::anyhow!("{}", message)),
            None => Ok(true),
        }
    }
}

/// One status call as it arrived at [`StatusSink`].
#[derive(Debug, Clone)]
pub struct ReceivedStatus {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: serde_json::Value,
}

impl ReceivedStatus {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Local HTTP server standing in for a forge API. Answers everything with 201.
pub struct StatusSink {
    pub origin: String,
    received: Arc<Mutex<Vec<ReceivedStatus>>>,
}

impl StatusSink {
    pub async fn start() -> Self {
        let received = Arc::new(Mutex::new(Vec::new()));
        let log = received.clone();
        let router = Router::new().fallback(
            move |method: Method, uri: Uri, headers: HeaderMap, body: Bytes| {
                let log = log.clone();
                async move {
                    log.lock().unwrap().push(ReceivedStatus {
                        method,
                        path: uri.path().to_string(),
                        headers,
                        body: serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null),
                    });
                    StatusCode::CREATED
                }
            },
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        Self {
            origin: format!("http://{}", addr),
            received,
        }
    }

    pub fn received(&self) -> Vec<ReceivedStatus> {
        self.received.lock().unwrap().clone()
    }
}
