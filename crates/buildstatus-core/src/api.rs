//! Remote API seam.
//!
//! The dispatch engine talks to the source-hosting service only through
//! [`StatusApi`]; concrete transports live in their own crates.

use crate::error::ApiError;
use crate::state::ChangeState;
use async_trait::async_trait;
use std::sync::Arc;

/// Operations the publisher needs from the remote service.
#[async_trait]
pub trait StatusApi: Send + Sync {
    /// Attach a status marker to a commit.
    #[allow(clippy::too_many_arguments)]
    async fn set_change_status(
        &self,
        owner: &str,
        repo: &str,
        commit_hash: &str,
        state: ChangeState,
        target_url: &str,
        description: &str,
        context: &str,
    ) -> Result<(), ApiError>;

    /// Post a comment on a commit.
    async fn post_comment(
        &self,
        owner: &str,
        repo: &str,
        commit_hash: &str,
        body: &str,
    ) -> Result<(), ApiError>;

    /// Whether `branch_ref` names a pull-request merge ref.
    fn is_pull_request_merge_ref(&self, branch_ref: &str) -> bool;

    /// Current head commit of the pull request behind a merge ref.
    ///
    /// `Ok(None)` means the service has no such pull request.
    async fn find_pull_request_head_commit(
        &self,
        owner: &str,
        repo: &str,
        branch_ref: &str,
    ) -> Result<Option<String>, ApiError>;
}

/// Authenticated handle shared by all tasks of one dispatch engine.
pub type AuthenticatedClient = Arc<dyn StatusApi>;

/// Opens authenticated clients for a server URL.
pub trait ApiFactory: Send + Sync {
    fn open_for_user(
        &self,
        server_url: &str,
        username: &str,
        password: &str,
    ) -> Result<AuthenticatedClient, ApiError>;

    fn open_for_token(&self, server_url: &str, token: &str)
        -> Result<AuthenticatedClient, ApiError>;
}
