//! Commit resolution: which commit a status update is attached to.
//!
//! Builds of a pull-request merge ref run on a synthetic merge commit that
//! nobody looks at. When the tracked branch is such a ref, the status goes
//! to the pull request's current head commit instead. Lookup failures fall
//! back to the tracked hash.

use crate::api::StatusApi;
use crate::error::ApiError;
use crate::identity::RepositoryIdentity;
use crate::model::TrackedRevision;
use crate::obs;

/// Outcome of resolving the commit to annotate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitResolution {
    /// The tracked hash is used as-is.
    Tracked(String),
    /// The branch is a merge ref and its pull request head was found.
    PullRequestHead(String),
    /// The merge ref lookup failed; the tracked hash is used instead.
    Fallback { hash: String, error: ApiError },
}

impl CommitResolution {
    pub fn hash(&self) -> &str {
        match self {
            CommitResolution::Tracked(hash)
            | CommitResolution::PullRequestHead(hash)
            | CommitResolution::Fallback { hash, .. } => hash,
        }
    }

    pub fn into_hash(self) -> String {
        match self {
            CommitResolution::Tracked(hash)
            | CommitResolution::PullRequestHead(hash)
            | CommitResolution::Fallback { hash, .. } => hash,
        }
    }
}

/// Decide which commit to annotate. Never fails.
pub async fn resolve_commit(
    revision: &TrackedRevision,
    identity: &RepositoryIdentity,
    client: &dyn StatusApi,
    build_id: u64,
) -> CommitResolution {
    let branch = match revision.branch_ref.as_deref() {
        Some(branch) if client.is_pull_request_merge_ref(branch) => branch,
        _ => return CommitResolution::Tracked(revision.version_hash.clone()),
    };

    let lookup = client
        .find_pull_request_head_commit(identity.owner(), identity.name(), branch)
        .await
        .and_then(|head| {
            head.ok_or_else(|| {
                ApiError::NotFound(format!("failed to find head hash for commit from {branch}"))
            })
        });

    match lookup {
        Ok(head) => {
            obs::emit_commit_resolved(branch, &revision.version_hash, &head, build_id);
            CommitResolution::PullRequestHead(head)
        }
        Err(error) => {
            obs::emit_commit_resolve_failed(branch, identity, build_id, &error);
            CommitResolution::Fallback {
                hash: revision.version_hash.clone(),
                error,
            }
        }
    }
}
