//! GitHub REST + GraphQL client for PR review delivery.
//!
//! Endpoints used:
//! - `GET  /repos/{repo}/pulls/{n}`                PR meta (head SHA, fork check)
//! - `GET  /repos/{repo}/pulls/{n}` (diff media)   raw unified diff
//! - `POST /repos/{repo}/pulls/{n}/reviews`        inline review batches
//! - `GET/POST/PATCH …/issues/{n}/comments`        summary upsert
//! - `POST /graphql`                               thread queries + resolution
//!
//! Thread resolution passes `$threadId` as a GraphQL **variable**; ids are
//! never interpolated into the query text.

use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use crate::errors::{Error, PrResult, ProviderError};

/// Media type for the raw unified diff.
const DIFF_MEDIA_TYPE: &str = "application/vnd.github.v3.diff";

const RESOLVE_THREAD_MUTATION: &str = "mutation ResolveThread($threadId: ID!) { \
     resolveReviewThread(input: {threadId: $threadId}) { \
     thread { id isResolved } } }";

const LIST_THREADS_QUERY: &str = "query ReviewThreads($owner: String!, $name: String!, $number: Int!) { \
     repository(owner: $owner, name: $name) { \
     pullRequest(number: $number) { \
     reviewThreads(first: 100) { nodes { id isResolved comments(first: 10) { nodes { body } } } } } } }";

/// One inline review comment, in the shape the REST API accepts.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReviewComment {
    pub path: String,
    pub body: String,
    pub line: u32,
    pub side: &'static str,
}

/// PR metadata the pipeline needs.
#[derive(Debug, Clone)]
pub struct PullMeta {
    pub title: String,
    pub head_ref: String,
    pub base_ref: String,
    pub head_sha: String,
    pub head_repo_full_name: Option<String>,
    pub base_repo_full_name: Option<String>,
}

impl PullMeta {
    /// Fork PRs carry a head repo different from the base repo; missing
    /// repo info counts as non-fork.
    pub fn is_fork(&self) -> bool {
        match (&self.head_repo_full_name, &self.base_repo_full_name) {
            (Some(head), Some(base)) => head != base,
            _ => false,
        }
    }
}

/// A review thread as returned by the GraphQL listing.
#[derive(Debug, Clone)]
pub struct ReviewThread {
    pub id: String,
    pub is_resolved: bool,
    pub comment_bodies: Vec<String>,
}

/// An existing issue comment (for the summary upsert).
#[derive(Debug, Clone, Deserialize)]
pub struct IssueComment {
    pub id: u64,
    pub body: String,
}

/// Thin authenticated client over the GitHub API.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    base_api: String,
    token: String,
}

impl GitHubClient {
    /// Builds the client. `base_api` is e.g. `https://api.github.com`.
    pub fn new(base_api: impl Into<String>, token: impl Into<String>) -> PrResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent("grippy/0.1")
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            base_api: base_api.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    fn headers(&self, accept: &str) -> PrResult<HeaderMap> {
        let mut h = HeaderMap::new();
        h.insert(USER_AGENT, HeaderValue::from_static("grippy/0.1"));
        h.insert(
            ACCEPT,
            HeaderValue::from_str(accept)
                .map_err(|e| Error::Validation(format!("bad accept header: {e}")))?,
        );
        h.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.token))
                .map_err(|e| Error::Validation(format!("bad token: {e}")))?,
        );
        Ok(h)
    }

    /// Fetch PR metadata.
    pub async fn get_pull_meta(&self, repo: &str, number: u64) -> PrResult<PullMeta> {
        let url = format!("{}/repos/{repo}/pulls/{number}", self.base_api);

        #[derive(Deserialize)]
        struct RepoRef {
            full_name: Option<String>,
        }
        #[derive(Deserialize)]
        struct GitRef {
            r#ref: String,
            sha: String,
            repo: Option<RepoRef>,
        }
        #[derive(Deserialize)]
        struct PullResp {
            title: String,
            head: GitRef,
            base: GitRef,
        }

        debug!(%url, "GET pull meta");
        let resp = self
            .http
            .get(&url)
            .headers(self.headers("application/vnd.github+json")?)
            .send()
            .await?;
        let resp = check_status(resp).await?;

        let pull: PullResp = resp.json().await.map_err(|e| {
            Error::Provider(ProviderError::InvalidResponse(format!("pull meta: {e}")))
        })?;

        Ok(PullMeta {
            title: pull.title,
            head_ref: pull.head.r#ref,
            base_ref: pull.base.r#ref,
            head_sha: pull.head.sha,
            head_repo_full_name: pull.head.repo.and_then(|r| r.full_name),
            base_repo_full_name: pull.base.repo.and_then(|r| r.full_name),
        })
    }

    /// Fetch the raw unified diff using the diff media type.
    pub async fn fetch_diff(&self, repo: &str, number: u64) -> PrResult<String> {
        let url = format!("{}/repos/{repo}/pulls/{number}", self.base_api);
        debug!(%url, "GET raw diff");

        let resp = self
            .http
            .get(&url)
            .headers(self.headers(DIFF_MEDIA_TYPE)?)
            .send()
            .await?;
        let resp = check_status(resp).await?;
        Ok(resp.text().await?)
    }

    /// Submit one batch of inline comments as a single COMMENT review.
    pub async fn create_review(
        &self,
        repo: &str,
        number: u64,
        comments: &[ReviewComment],
    ) -> PrResult<()> {
        let url = format!("{}/repos/{repo}/pulls/{number}/reviews", self.base_api);
        debug!(%url, comments = comments.len(), "POST review batch");

        let resp = self
            .http
            .post(&url)
            .headers(self.headers("application/vnd.github+json")?)
            .json(&json!({ "event": "COMMENT", "comments": comments }))
            .send()
            .await?;
        check_status(resp).await?;
        Ok(())
    }

    /// List issue comments (first 100 — one summary per round keeps this
    /// far below the page size).
    pub async fn list_issue_comments(&self, repo: &str, number: u64) -> PrResult<Vec<IssueComment>> {
        let url = format!(
            "{}/repos/{repo}/issues/{number}/comments?per_page=100",
            self.base_api
        );
        debug!(%url, "GET issue comments");

        let resp = self
            .http
            .get(&url)
            .headers(self.headers("application/vnd.github+json")?)
            .send()
            .await?;
        let resp = check_status(resp).await?;
        let comments: Vec<IssueComment> = resp.json().await.map_err(|e| {
            Error::Provider(ProviderError::InvalidResponse(format!("comments: {e}")))
        })?;
        Ok(comments)
    }

    /// Create a new issue comment.
    pub async fn create_issue_comment(&self, repo: &str, number: u64, body: &str) -> PrResult<()> {
        let url = format!("{}/repos/{repo}/issues/{number}/comments", self.base_api);
        debug!(%url, "POST issue comment");

        let resp = self
            .http
            .post(&url)
            .headers(self.headers("application/vnd.github+json")?)
            .json(&json!({ "body": body }))
            .send()
            .await?;
        check_status(resp).await?;
        Ok(())
    }

    /// Edit an existing issue comment in place.
    pub async fn edit_issue_comment(&self, repo: &str, comment_id: u64, body: &str) -> PrResult<()> {
        let url = format!("{}/repos/{repo}/issues/comments/{comment_id}", self.base_api);
        debug!(%url, "PATCH issue comment");

        let resp = self
            .http
            .patch(&url)
            .headers(self.headers("application/vnd.github+json")?)
            .json(&json!({ "body": body }))
            .send()
            .await?;
        check_status(resp).await?;
        Ok(())
    }

    /// List the PR's review threads with their comment bodies.
    pub async fn list_review_threads(
        &self,
        repo: &str,
        number: u64,
    ) -> PrResult<Vec<ReviewThread>> {
        let (owner, name) = repo
            .split_once('/')
            .ok_or_else(|| Error::Validation(format!("repo not owner/name: {repo}")))?;

        let data = self
            .graphql(json!({
                "query": LIST_THREADS_QUERY,
                "variables": { "owner": owner, "name": name, "number": number }
            }))
            .await?;

        let nodes = data
            .pointer("/data/repository/pullRequest/reviewThreads/nodes")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();

        let threads = nodes
            .iter()
            .filter_map(|node| {
                let id = node.get("id")?.as_str()?.to_string();
                let is_resolved = node.get("isResolved").and_then(|v| v.as_bool()).unwrap_or(false);
                let comment_bodies = node
                    .pointer("/comments/nodes")
                    .and_then(|v| v.as_array())
                    .map(|arr| {
                        arr.iter()
                            .filter_map(|c| c.get("body").and_then(|b| b.as_str()))
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default();
                Some(ReviewThread {
                    id,
                    is_resolved,
                    comment_bodies,
                })
            })
            .collect();
        Ok(threads)
    }

    /// Resolve one review thread. The id travels as the `$threadId`
    /// variable, never spliced into the mutation text.
    pub async fn resolve_review_thread(&self, thread_id: &str) -> PrResult<bool> {
        let data = self
            .graphql(json!({
                "query": RESOLVE_THREAD_MUTATION,
                "variables": { "threadId": thread_id }
            }))
            .await?;

        if let Some(errors) = data.get("errors").and_then(|e| e.as_array()) {
            if !errors.is_empty() {
                warn!(thread_id, ?errors, "resolveReviewThread returned errors");
                return Ok(false);
            }
        }
        let resolved = data
            .pointer("/data/resolveReviewThread/thread/isResolved")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        Ok(resolved)
    }

    async fn graphql(&self, payload: serde_json::Value) -> PrResult<serde_json::Value> {
        let url = format!("{}/graphql", self.base_api);
        debug!(%url, "POST graphql");

        let resp = self
            .http
            .post(&url)
            .headers(self.headers("application/vnd.github+json")?)
            .json(&payload)
            .send()
            .await?;
        let resp = check_status(resp).await?;
        Ok(resp.json().await.map_err(|e| {
            Error::Provider(ProviderError::InvalidResponse(format!("graphql: {e}")))
        })?)
    }
}

/// Map non-2xx responses onto the provider taxonomy, logging a body
/// snippet at debug level.
async fn check_status(resp: reqwest::Response) -> PrResult<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let url = resp.url().to_string();
    let body = resp.text().await.unwrap_or_default();
    let snippet: String = body.chars().take(240).collect();
    debug!(%status, %url, %snippet, "non-success response");
    Err(ProviderError::from_status(status.as_u16()).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fork_detection_compares_repo_full_names() {
        let mut meta = PullMeta {
            title: "t".into(),
            head_ref: "feature".into(),
            base_ref: "main".into(),
            head_sha: "abc".into(),
            head_repo_full_name: Some("fork/repo".into()),
            base_repo_full_name: Some("owner/repo".into()),
        };
        assert!(meta.is_fork());

        meta.head_repo_full_name = Some("owner/repo".into());
        assert!(!meta.is_fork());

        meta.head_repo_full_name = None;
        assert!(!meta.is_fork());
    }

    #[test]
    fn mutation_uses_a_named_variable() {
        assert!(RESOLVE_THREAD_MUTATION.contains("$threadId: ID!"));
        assert!(RESOLVE_THREAD_MUTATION.contains("input: {threadId: $threadId}"));
    }

    #[test]
    fn review_comment_serializes_in_api_shape() {
        let c = ReviewComment {
            path: "a.py".into(),
            body: "b".into(),
            line: 7,
            side: "RIGHT",
        };
        let v = serde_json::to_value(&c).unwrap();
        assert_eq!(v, serde_json::json!({ "path": "a.py", "body": "b", "line": 7, "side": "RIGHT" }));
    }
}
