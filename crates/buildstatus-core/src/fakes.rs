//! In-memory fakes for the remote API traits (testing only)
//!
//! `MemoryStatusApi` records every call and can be told to fail or stall;
//! `MemoryApiFactory` hands out one shared `MemoryStatusApi` so a test can
//! inspect what a dispatch engine sent.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::api::{ApiFactory, AuthenticatedClient, StatusApi};
use crate::error::ApiError;
use crate::state::ChangeState;

/// A call observed by [`MemoryStatusApi`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCall {
    Status {
        owner: String,
        repo: String,
        commit_hash: String,
        state: ChangeState,
        target_url: String,
        description: String,
        context: String,
    },
    Comment {
        owner: String,
        repo: String,
        commit_hash: String,
        body: String,
    },
    PullRequestLookup {
        owner: String,
        repo: String,
        branch_ref: String,
    },
}

impl RecordedCall {
    pub fn commit_hash(&self) -> Option<&str> {
        match self {
            RecordedCall::Status { commit_hash, .. } | RecordedCall::Comment { commit_hash, .. } => {
                Some(commit_hash)
            }
            RecordedCall::PullRequestLookup { .. } => None,
        }
    }
}

#[derive(Debug, Default)]
struct Behaviour {
    status_error: Option<ApiError>,
    comment_error: Option<ApiError>,
    /// `None` answers lookups with "no such pull request".
    pull_request_head: Option<Result<String, ApiError>>,
    delay: Option<Duration>,
}

// ---------------------------------------------------------------------------
// MemoryStatusApi
// ---------------------------------------------------------------------------

/// Recording [`StatusApi`] with injectable failures.
///
/// Merge refs are recognised as `refs/pull/<n>/merge`.
#[derive(Debug, Default)]
pub struct MemoryStatusApi {
    calls: Mutex<Vec<RecordedCall>>,
    behaviour: Mutex<Behaviour>,
}

impl MemoryStatusApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_status(self, error: ApiError) -> Self {
        self.behaviour.lock().unwrap().status_error = Some(error);
        self
    }

    pub fn fail_comment(self, error: ApiError) -> Self {
        self.behaviour.lock().unwrap().comment_error = Some(error);
        self
    }

    pub fn with_pull_request_head(self, head: Result<String, ApiError>) -> Self {
        self.behaviour.lock().unwrap().pull_request_head = Some(head);
        self
    }

    /// Stall every status and comment call by `delay`.
    pub fn with_delay(self, delay: Duration) -> Self {
        self.behaviour.lock().unwrap().delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn status_calls(&self) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, RecordedCall::Status { .. }))
            .collect()
    }

    pub fn comment_calls(&self) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, RecordedCall::Comment { .. }))
            .collect()
    }

    /// Poll until at least `count` status/comment calls were recorded or
    /// `timeout` elapses, then return everything recorded so far.
    pub async fn wait_for_calls(&self, count: usize, timeout: Duration) -> Vec<RecordedCall> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let calls = self.calls();
            let writes = calls.iter().filter(|c| c.commit_hash().is_some()).count();
            if writes >= count || tokio::time::Instant::now() >= deadline {
                return calls;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    fn record(&self, call: RecordedCall) {
        self.calls.lock().unwrap().push(call);
    }

    async fn stall(&self) {
        let delay = self.behaviour.lock().unwrap().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl StatusApi for MemoryStatusApi {
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
        self.stall().await;
        self.record(RecordedCall::Status {
            owner: owner.to_string(),
            repo: repo.to_string(),
            commit_hash: commit_hash.to_string(),
            state,
            target_url: target_url.to_string(),
            description: description.to_string(),
            context: context.to_string(),
        });
        match self.behaviour.lock().unwrap().status_error.clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn post_comment(
        &self,
        owner: &str,
        repo: &str,
        commit_hash: &str,
        body: &str,
    ) -> Result<(), ApiError> {
        self.stall().await;
        self.record(RecordedCall::Comment {
            owner: owner.to_string(),
            repo: repo.to_string(),
            commit_hash: commit_hash.to_string(),
            body: body.to_string(),
        });
        match self.behaviour.lock().unwrap().comment_error.clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn is_pull_request_merge_ref(&self, branch_ref: &str) -> bool {
        branch_ref
            .strip_prefix("refs/pull/")
            .and_then(|rest| rest.strip_suffix("/merge"))
            .map(|number| !number.is_empty() && number.chars().all(|c| c.is_ascii_digit()))
            .unwrap_or(false)
    }

    async fn find_pull_request_head_commit(
        &self,
        owner: &str,
        repo: &str,
        branch_ref: &str,
    ) -> Result<Option<String>, ApiError> {
        self.record(RecordedCall::PullRequestLookup {
            owner: owner.to_string(),
            repo: repo.to_string(),
            branch_ref: branch_ref.to_string(),
        });
        match self.behaviour.lock().unwrap().pull_request_head.clone() {
            Some(Ok(hash)) => Ok(Some(hash)),
            Some(Err(err)) => Err(err),
            None => Ok(None),
        }
    }
}

// ---------------------------------------------------------------------------
// MemoryApiFactory
// ---------------------------------------------------------------------------

/// How a client was opened by [`MemoryApiFactory`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenedWith {
    User {
        server_url: String,
        username: String,
        password: String,
    },
    Token {
        server_url: String,
        token: String,
    },
}

/// Factory handing out one shared [`MemoryStatusApi`].
#[derive(Debug)]
pub struct MemoryApiFactory {
    api: Arc<MemoryStatusApi>,
    opened: Mutex<Vec<OpenedWith>>,
    error: Option<ApiError>,
}

impl MemoryApiFactory {
    pub fn new() -> Self {
        Self::with_api(Arc::new(MemoryStatusApi::new()))
    }

    pub fn with_api(api: Arc<MemoryStatusApi>) -> Self {
        Self {
            api,
            opened: Mutex::new(Vec::new()),
            error: None,
        }
    }

    /// Factory whose every open attempt fails with `error`.
    pub fn failing(error: ApiError) -> Self {
        Self {
            error: Some(error),
            ..Self::new()
        }
    }

    pub fn api(&self) -> Arc<MemoryStatusApi> {
        Arc::clone(&self.api)
    }

    pub fn opened(&self) -> Vec<OpenedWith> {
        self.opened.lock().unwrap().clone()
    }

    fn open(&self, how: OpenedWith) -> Result<AuthenticatedClient, ApiError> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        self.opened.lock().unwrap().push(how);
        let client: AuthenticatedClient = self.api.clone();
        Ok(client)
    }
}

impl Default for MemoryApiFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ApiFactory for MemoryApiFactory {
    fn open_for_user(
        &self,
        server_url: &str,
        username: &str,
        password: &str,
    ) -> Result<AuthenticatedClient, ApiError> {
        self.open(OpenedWith::User {
            server_url: server_url.to_string(),
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    fn open_for_token(
        &self,
        server_url: &str,
        token: &str,
    ) -> Result<AuthenticatedClient, ApiError> {
        self.open(OpenedWith::Token {
            server_url: server_url.to_string(),
            token: token.to_string(),
        })
    }
}
