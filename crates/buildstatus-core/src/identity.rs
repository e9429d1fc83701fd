//! Repository identity: turning a VCS connection URI into `(owner, name)`.
//!
//! Two forms are accepted:
//! - scp-like shorthand `user@host:owner/repo[.git]`
//! - a regular URL whose path is `/owner/repo[.git]`

use crate::error::IdentityError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use url::Url;

const GIT_SUFFIX: &str = ".git";

/// Owner and repository name on the remote service.
///
/// Neither field is empty and `name` never ends in `.git`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositoryIdentity {
    owner: String,
    name: String,
}

impl RepositoryIdentity {
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for RepositoryIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

fn scp_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[^@/:]+@[^:/]+:([^/]+)/(.+)$").expect("scp pattern is a valid regex")
    })
}

/// scp-like syntax has no scheme and an `@` followed by `:` before the
/// first `/`.
fn is_scp_like(uri: &str) -> bool {
    if uri.contains("://") {
        return false;
    }
    let head = uri.split('/').next().unwrap_or(uri);
    match (head.find('@'), head.rfind(':')) {
        (Some(at), Some(colon)) => at < colon,
        _ => false,
    }
}

/// Parse a repository connection URI into its identity.
pub fn parse_repository_url(uri: &str) -> Result<RepositoryIdentity, IdentityError> {
    let uri = uri.trim();
    if is_scp_like(uri) {
        parse_scp(uri)
    } else {
        parse_url(uri)
    }
}

fn parse_scp(uri: &str) -> Result<RepositoryIdentity, IdentityError> {
    let captures = scp_pattern()
        .captures(uri)
        .ok_or_else(|| IdentityError::new(uri, "does not match user@host:owner/repo"))?;
    identity(uri, &captures[1], &captures[2])
}

fn parse_url(uri: &str) -> Result<RepositoryIdentity, IdentityError> {
    let url = Url::parse(uri).map_err(|e| IdentityError::new(uri, e.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(IdentityError::new(
            uri,
            "neither user@host:owner/repo nor scheme://host/owner/repo",
        ));
    }

    let path = url.path();
    let path = path.strip_prefix('/').unwrap_or(path);
    if path.is_empty() {
        return Err(IdentityError::new(uri, "path is empty"));
    }

    match path.find('/') {
        Some(idx) if idx > 0 => identity(uri, &path[..idx], &path[idx + 1..]),
        _ => Err(IdentityError::new(uri, "path has no owner/repository split")),
    }
}

fn identity(uri: &str, owner: &str, repo: &str) -> Result<RepositoryIdentity, IdentityError> {
    let repo = repo.trim_end_matches('/');
    let repo = repo.strip_suffix(GIT_SUFFIX).unwrap_or(repo);
    if owner.is_empty() {
        return Err(IdentityError::new(uri, "owner is empty"));
    }
    if repo.is_empty() {
        return Err(IdentityError::new(uri, "repository name is empty"));
    }
    Ok(RepositoryIdentity {
        owner: owner.to_string(),
        name: repo.to_string(),
    })
}
