//! GitHub git-data API client used by the publisher.
//!
//! The publisher never writes files one by one. It works at the git object
//! level: read the branch head, layer new blobs onto the head's tree, create a
//! commit, then move the branch. Only the last call is visible to anyone
//! reading the branch.
//!
//! # Endpoints
//!
//! | Step | Request |
//! |------|---------|
//! | head | `GET /repos/{owner}/{repo}/git/ref/heads/{branch}` |
//! | tree | `GET /repos/{owner}/{repo}/git/trees/{sha}?recursive=1` |
//! | blob | `POST /repos/{owner}/{repo}/git/blobs` (non UTF-8 files only) |
//! | create tree | `POST /repos/{owner}/{repo}/git/trees` |
//! | commit | `POST /repos/{owner}/{repo}/git/commits` |
//! | move branch | `PATCH /repos/{owner}/{repo}/git/refs/heads/{branch}` with `force: false` |
//!
//! A `409` or `422` on the final `PATCH` means the branch is no longer at the
//! commit's parent; it is reported as [`RefUpdate::NotFastForward`].

use crate::config::GitHubTarget;
use crate::error::ServiceError;
use crate::models::{BLOB_MODE, CommitTreeEntry};
use crate::retry::RetryPolicy;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use url::Url;

const SERVICE: &str = "github";
const API_VERSION: &str = "2022-11-28";

/// One entry of a recursive tree listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TreeItem {
    pub path: String,
    pub mode: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub sha: Option<String>,
}

/// A tree as returned by a recursive listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Tree {
    pub sha: String,
    #[serde(rename = "tree", default)]
    pub items: Vec<TreeItem>,
    #[serde(default)]
    pub truncated: bool,
}

impl Tree {
    pub fn contains_path(&self, path: &str) -> bool {
        self.items.iter().any(|item| item.path == path)
    }
}

/// Result of a non-forced branch update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefUpdate {
    Updated,
    /// The branch no longer points at the new commit's parent.
    NotFastForward,
}

/// The five git-data operations the publish transaction is built from.
pub trait VersionControl {
    /// Name of the branch being published to.
    fn branch(&self) -> &str;

    /// SHA of the commit the branch currently points at.
    async fn head(&self) -> Result<String, ServiceError>;

    /// Recursive tree of `commit`.
    async fn tree(&self, commit: &str) -> Result<Tree, ServiceError>;

    /// Create a tree from `base_tree` plus `entries`; returns the new tree SHA.
    async fn create_tree(
        &self,
        base_tree: &str,
        entries: &[CommitTreeEntry],
    ) -> Result<String, ServiceError>;

    /// Create a commit object; returns its SHA. The branch is not touched.
    async fn create_commit(
        &self,
        message: &str,
        tree: &str,
        parent: &str,
    ) -> Result<String, ServiceError>;

    /// Move the branch to `commit` without forcing.
    async fn update_ref(&self, commit: &str) -> Result<RefUpdate, ServiceError>;
}

#[derive(Debug, Deserialize)]
struct GitObject {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct GitRef {
    object: GitObject,
}

#[derive(Debug, Serialize)]
struct NewBlob<'a> {
    content: &'a str,
    encoding: &'a str,
}

#[derive(Debug, Serialize)]
struct NewTreeEntry<'a> {
    path: &'a str,
    mode: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<String>,
}

#[derive(Debug, Serialize)]
struct NewTree<'a> {
    base_tree: &'a str,
    tree: Vec<NewTreeEntry<'a>>,
}

#[derive(Debug, Serialize)]
struct NewCommit<'a> {
    message: &'a str,
    tree: &'a str,
    parents: [&'a str; 1],
}

#[derive(Debug, Serialize)]
struct RefPatch<'a> {
    sha: &'a str,
    force: bool,
}

#[derive(Debug, Clone)]
pub struct GitHubClient {
    client: reqwest::Client,
    target: GitHubTarget,
    retry: RetryPolicy,
}

impl GitHubClient {
    pub fn new(client: reqwest::Client, target: GitHubTarget, retry: RetryPolicy) -> Self {
        Self {
            client,
            target,
            retry,
        }
    }

    fn repo_url(&self, rest: &str) -> Result<Url, ServiceError> {
        let base = self.target.api.url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!(
            "{base}/repos/{}/{}/{rest}",
            self.target.owner, self.target.repo
        ))?)
    }

    fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        let request = self
            .client
            .request(method, url)
            .timeout(self.target.api.timeout)
            .header(ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
            .header(USER_AGENT, concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")));
        match &self.target.token {
            Some(token) => request.header(AUTHORIZATION, format!("Bearer {token}")),
            None => request,
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, ServiceError> {
        let res = request
            .send()
            .await
            .map_err(|e| ServiceError::from_reqwest(SERVICE, e))?;
        if !res.status().is_success() {
            return Err(ServiceError::Status {
                service: SERVICE,
                status: res.status().as_u16(),
            });
        }
        Ok(res)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T, ServiceError> {
        self.send(self.request(Method::GET, url.clone()))
            .await?
            .json::<T>()
            .await
            .map_err(|e| ServiceError::from_reqwest(SERVICE, e))
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        url: &Url,
        body: &B,
    ) -> Result<T, ServiceError> {
        self.send(self.request(Method::POST, url.clone()).json(body))
            .await?
            .json::<T>()
            .await
            .map_err(|e| ServiceError::from_reqwest(SERVICE, e))
    }

    async fn create_blob(&self, bytes: &[u8]) -> Result<String, ServiceError> {
        let url = self.repo_url("git/blobs")?;
        let encoded = STANDARD.encode(bytes);
        let body = NewBlob {
            content: &encoded,
            encoding: "base64",
        };
        let blob: GitObject = self
            .retry
            .run("github.blob", || self.post_json(&url, &body))
            .await?;
        Ok(blob.sha)
    }

    async fn patch_ref(&self, url: &Url, commit: &str) -> Result<RefUpdate, ServiceError> {
        let body = RefPatch {
            sha: commit,
            force: false,
        };
        let res = self
            .request(Method::PATCH, url.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceError::from_reqwest(SERVICE, e))?;

        match res.status() {
            status if status.is_success() => Ok(RefUpdate::Updated),
            StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
                let detail = res.text().await.unwrap_or_default();
                warn!(reason = rejection_reason(&detail), %detail, "Branch update rejected");
                Ok(RefUpdate::NotFastForward)
            }
            status => Err(ServiceError::Status {
                service: SERVICE,
                status: status.as_u16(),
            }),
        }
    }
}

fn rejection_reason(detail: &str) -> &'static str {
    if detail.contains("fast forward") {
        "not_fast_forward"
    } else {
        "conflict"
    }
}

impl VersionControl for GitHubClient {
    fn branch(&self) -> &str {
        &self.target.branch
    }

    #[instrument(level = "debug", skip(self), fields(branch = %self.target.branch))]
    async fn head(&self) -> Result<String, ServiceError> {
        let url = self.repo_url(&format!("git/ref/heads/{}", self.target.branch))?;
        let git_ref: GitRef = self
            .retry
            .run("github.head", || self.get_json(&url))
            .await?;
        Ok(git_ref.object.sha)
    }

    #[instrument(level = "debug", skip(self))]
    async fn tree(&self, commit: &str) -> Result<Tree, ServiceError> {
        let mut url = self.repo_url(&format!("git/trees/{commit}"))?;
        url.query_pairs_mut().append_pair("recursive", "1");
        let tree: Tree = self
            .retry
            .run("github.tree", || self.get_json(&url))
            .await?;
        if tree.truncated {
            warn!(sha = %tree.sha, "Recursive tree listing was truncated");
        }
        Ok(tree)
    }

    #[instrument(level = "debug", skip(self, entries), fields(entries = entries.len()))]
    async fn create_tree(
        &self,
        base_tree: &str,
        entries: &[CommitTreeEntry],
    ) -> Result<String, ServiceError> {
        let mut tree = Vec::with_capacity(entries.len());
        for entry in entries {
            let payload = match std::str::from_utf8(&entry.content) {
                Ok(text) => NewTreeEntry {
                    path: &entry.path,
                    mode: BLOB_MODE,
                    kind: "blob",
                    content: Some(text),
                    sha: None,
                },
                Err(_) => {
                    debug!(path = %entry.path, "Uploading binary blob");
                    NewTreeEntry {
                        path: &entry.path,
                        mode: BLOB_MODE,
                        kind: "blob",
                        content: None,
                        sha: Some(self.create_blob(&entry.content).await?),
                    }
                }
            };
            tree.push(payload);
        }

        let url = self.repo_url("git/trees")?;
        let body = NewTree { base_tree, tree };
        let created: GitObject = self
            .retry
            .run("github.create_tree", || self.post_json(&url, &body))
            .await?;
        Ok(created.sha)
    }

    #[instrument(level = "debug", skip(self, message))]
    async fn create_commit(
        &self,
        message: &str,
        tree: &str,
        parent: &str,
    ) -> Result<String, ServiceError> {
        let url = self.repo_url("git/commits")?;
        let body = NewCommit {
            message,
            tree,
            parents: [parent],
        };
        let created: GitObject = self
            .retry
            .run("github.commit", || self.post_json(&url, &body))
            .await?;
        Ok(created.sha)
    }

    #[instrument(level = "debug", skip(self), fields(branch = %self.target.branch))]
    async fn update_ref(&self, commit: &str) -> Result<RefUpdate, ServiceError> {
        let url = self.repo_url(&format!("git/refs/heads/{}", self.target.branch))?;
        self.retry
            .run("github.update_ref", || self.patch_ref(&url, commit))
            .await
    }
}
