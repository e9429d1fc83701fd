//! Structured observability hooks for status-update lifecycle events.
//!
//! This module provides:
//! - An update-scoped tracing span for the background task
//! - Emission functions for scheduling, remote-call outcomes, commit
//!   resolution and skipped events
//!
//! Logs are the only place remote failures surface, so every record carries
//! the commit hash, build id and target state.

use crate::identity::RepositoryIdentity;
use crate::state::ChangeState;
use tracing::{info, warn, Span};

/// Span wrapping one background status update.
pub fn update_span(build_id: u64, identity: &RepositoryIdentity) -> Span {
    tracing::info_span!(
        "buildstatus.update",
        build_id = build_id,
        owner = %identity.owner(),
        repo = %identity.name(),
    )
}

/// Emit event: update handed to the scheduler.
pub fn emit_status_scheduled(hash: &str, branch: Option<&str>, build_id: u64, state: ChangeState) {
    info!(
        event = "status.scheduled",
        hash = %hash,
        branch = branch.unwrap_or("<none>"),
        build_id = build_id,
        state = %state,
    );
}

/// Emit event: status marker accepted by the remote service.
pub fn emit_status_updated(hash: &str, build_id: u64, state: ChangeState) {
    info!(event = "status.updated", hash = %hash, build_id = build_id, state = %state);
}

/// Emit event: status marker rejected or never delivered.
pub fn emit_status_update_failed(
    hash: &str,
    build_id: u64,
    state: ChangeState,
    error: &dyn std::fmt::Display,
) {
    warn!(
        event = "status.update_failed",
        hash = %hash,
        build_id = build_id,
        state = %state,
        error = %error,
    );
}

/// Emit event: comment posted on the commit.
pub fn emit_comment_posted(hash: &str, build_id: u64, state: ChangeState) {
    info!(event = "comment.posted", hash = %hash, build_id = build_id, state = %state);
}

/// Emit event: comment could not be posted.
pub fn emit_comment_failed(
    hash: &str,
    branch: Option<&str>,
    build_id: u64,
    state: ChangeState,
    error: &dyn std::fmt::Display,
) {
    warn!(
        event = "comment.failed",
        hash = %hash,
        branch = branch.unwrap_or("<none>"),
        build_id = build_id,
        state = %state,
        error = %error,
    );
}

/// Emit event: merge ref translated to the pull request head.
pub fn emit_commit_resolved(branch: &str, hash: &str, new_hash: &str, build_id: u64) {
    info!(
        event = "commit.resolved",
        branch = %branch,
        hash = %hash,
        new_hash = %new_hash,
        build_id = build_id,
    );
}

/// Emit event: pull request head lookup failed; tracked hash is used.
pub fn emit_commit_resolve_failed(
    branch: &str,
    identity: &RepositoryIdentity,
    build_id: u64,
    error: &dyn std::fmt::Display,
) {
    warn!(
        event = "commit.resolve_failed",
        branch = %branch,
        repository = %identity,
        build_id = build_id,
        error = %error,
    );
}

/// Emit event: lifecycle event not reported.
pub fn emit_event_skipped(build_id: u64, reason: &dyn std::fmt::Display) {
    info!(event = "event.skipped", build_id = build_id, reason = %reason);
}
