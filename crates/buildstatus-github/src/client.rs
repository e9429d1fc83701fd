//! GitHub REST v3 client.

use std::fmt;

use async_trait::async_trait;
use buildstatus_core::{ApiError, ChangeState, StatusApi};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{check_status, status_error, transport};
use crate::factory::GitHubClientConfig;
use crate::refs::pull_request_number;

const GITHUB_MEDIA_TYPE: &str = "application/vnd.github+json";

/// How requests authenticate.
#[derive(Clone)]
pub enum Credentials {
    /// HTTP basic auth.
    Basic { username: String, password: String },
    /// Personal access or OAuth token, sent as `Authorization: token <t>`.
    Token(String),
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Credentials::Token(_) => f.debug_tuple("Token").field(&"<redacted>").finish(),
        }
    }
}

#[derive(Serialize)]
struct StatusBody<'a> {
    state: &'a str,
    target_url: &'a str,
    description: &'a str,
    context: &'a str,
}

#[derive(Serialize)]
struct CommentBody<'a> {
    body: &'a str,
}

#[derive(Deserialize)]
struct PullRequest {
    head: PullRequestHead,
}

#[derive(Deserialize)]
struct PullRequestHead {
    sha: String,
}

/// Authenticated client for one GitHub API base URL.
pub struct GitHubClient {
    http: reqwest::Client,
    api_base: String,
    credentials: Credentials,
}

impl fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHubClient")
            .field("api_base", &self.api_base)
            .field("credentials", &self.credentials)
            .finish()
    }
}

impl GitHubClient {
    /// Build a client for `api_base`, e.g. `https://api.github.com` or
    /// `https://ghe.example.com/api/v3`.
    pub fn new(
        api_base: &str,
        credentials: Credentials,
        config: &GitHubClientConfig,
    ) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .map_err(|e| ApiError::Setup(format!("invalid user agent: {e}")))?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static(GITHUB_MEDIA_TYPE));
        if let Credentials::Token(token) = &credentials {
            let mut value = HeaderValue::from_str(&format!("token {}", token.trim()))
                .map_err(|e| ApiError::Setup(format!("invalid access token: {e}")))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| ApiError::Setup(e.to_string()))?;

        Ok(Self {
            http,
            api_base: api_base.trim().trim_end_matches('/').to_string(),
            credentials,
        })
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn repo_url(&self, owner: &str, repo: &str, tail: &str) -> String {
        format!("{}/repos/{}/{}/{}", self.api_base, owner, repo, tail)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Credentials::Basic { username, password } => {
                request.basic_auth(username, Some(password))
            }
            Credentials::Token(_) => request,
        }
    }
}

#[async_trait]
impl StatusApi for GitHubClient {
    async fn set_change_status(
        &self,
        owner: &str,
        repo: &str,
        commit_hash: &str,
        state: ChangeState,
        target_url: &str,
        description: &str,
        context: &str,
    ) -> Result<(), ApiError> {
        let url = self.repo_url(owner, repo, &format!("statuses/{commit_hash}"));
        debug!(%url, state = state.as_str(), "Posting commit status");

        let body = StatusBody {
            state: state.as_str(),
            target_url,
            description,
            context,
        };
        let response = self
            .authorize(self.http.post(&url).json(&body))
            .send()
            .await
            .map_err(transport)?;
        check_status(response).await?;
        Ok(())
    }

    async fn post_comment(
        &self,
        owner: &str,
        repo: &str,
        commit_hash: &str,
        body: &str,
    ) -> Result<(), ApiError> {
        let url = self.repo_url(owner, repo, &format!("commits/{commit_hash}/comments"));
        debug!(%url, "Posting commit comment");

        let response = self
            .authorize(self.http.post(&url).json(&CommentBody { body }))
            .send()
            .await
            .map_err(transport)?;
        check_status(response).await?;
        Ok(())
    }

    fn is_pull_request_merge_ref(&self, branch_ref: &str) -> bool {
        pull_request_number(branch_ref).is_some()
    }

    async fn find_pull_request_head_commit(
        &self,
        owner: &str,
        repo: &str,
        branch_ref: &str,
    ) -> Result<Option<String>, ApiError> {
        let Some(number) = pull_request_number(branch_ref) else {
            return Ok(None);
        };
        let url = self.repo_url(owner, repo, &format!("pulls/{number}"));
        debug!(%url, "Looking up pull request head");

        let response = self
            .authorize(self.http.get(&url))
            .send()
            .await
            .map_err(transport)?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let pr: PullRequest = response.json().await.map_err(transport)?;
                let sha = pr.head.sha.trim();
                if sha.is_empty() {
                    Err(ApiError::Decode(format!(
                        "pull request {number} has an empty head sha"
                    )))
                } else {
                    Ok(Some(sha.to_string()))
                }
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(status_error(status, &body))
            }
        }
    }
}
