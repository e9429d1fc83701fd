//! Read-only views of the build server's data: builds, revisions, VCS roots
//! and result links.
//!
//! These are snapshots taken when a lifecycle event fires. They are owned
//! values so a background task can carry them without borrowing from the
//! build server.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// VCS kind this publisher knows how to report for.
pub const GIT_VCS_NAME: &str = "git";

/// Property of a VCS root holding the repository connection URI.
pub const URL_PROPERTY: &str = "url";

/// Build outcome as classified by the build server.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    Unknown,
    Normal,
    Warning,
    Failure,
    Error,
}

impl BuildStatus {
    /// Severity rank; higher is worse.
    pub fn priority(&self) -> u8 {
        match self {
            BuildStatus::Unknown => 0,
            BuildStatus::Normal => 1,
            BuildStatus::Warning => 2,
            BuildStatus::Failure => 3,
            BuildStatus::Error => 4,
        }
    }

    /// Outcome label shown to humans.
    pub fn text(&self) -> &'static str {
        match self {
            BuildStatus::Unknown => "UNKNOWN",
            BuildStatus::Normal => "SUCCESS",
            BuildStatus::Warning => "WARNING",
            BuildStatus::Failure => "FAILURE",
            BuildStatus::Error => "ERROR",
        }
    }
}

/// A failed test with an optional short failure excerpt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FailedTest {
    pub name: String,
    #[serde(default)]
    pub short_stacktrace: Option<String>,
}

impl FailedTest {
    pub fn new(name: impl Into<String>, short_stacktrace: Option<String>) -> Self {
        Self {
            name: name.into(),
            short_stacktrace,
        }
    }
}

/// Snapshot of a build at the moment a lifecycle event fired.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BuildSnapshot {
    /// Server-wide build identifier.
    pub build_id: u64,

    /// Full name of the build (project and configuration).
    pub full_name: String,

    /// Full name of the build configuration, when it still exists.
    #[serde(default)]
    pub build_type_name: Option<String>,

    /// User-facing build number.
    pub build_number: String,

    pub status: BuildStatus,

    /// One-line summary of the result, if the server produced one.
    #[serde(default)]
    pub status_text: Option<String>,

    pub started_at: DateTime<Utc>,

    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,

    /// Failed tests as reported by the build statistics.
    #[serde(default)]
    pub failed_tests: Vec<FailedTest>,

    /// Total failed test count; may exceed `failed_tests.len()` when the
    /// server truncates the list.
    #[serde(default)]
    pub failed_test_count: usize,
}

impl BuildSnapshot {
    /// Build duration in whole seconds; zero while the build is running.
    pub fn duration_secs(&self) -> u64 {
        match self.finished_at {
            Some(finished) => (finished - self.started_at).num_seconds().max(0) as u64,
            None => 0,
        }
    }

    /// Total number of failed tests.
    pub fn total_failed(&self) -> usize {
        self.failed_test_count.max(self.failed_tests.len())
    }
}

/// The commit and branch a build was triggered from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrackedRevision {
    pub version_hash: String,
    #[serde(default)]
    pub branch_ref: Option<String>,
}

impl TrackedRevision {
    pub fn new(version_hash: impl Into<String>, branch_ref: Option<&str>) -> Self {
        Self {
            version_hash: version_hash.into(),
            branch_ref: branch_ref.map(str::to_string),
        }
    }
}

/// A VCS root as attached to a build configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VcsRootInstance {
    /// VCS kind, e.g. `git`.
    pub vcs_name: String,
    #[serde(default)]
    pub properties: HashMap<String, String>,
}

impl VcsRootInstance {
    /// Git root pointing at `url`.
    pub fn git(url: &str) -> Self {
        let mut properties = HashMap::new();
        properties.insert(URL_PROPERTY.to_string(), url.to_string());
        Self {
            vcs_name: GIT_VCS_NAME.to_string(),
            properties,
        }
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Repository connection URI.
    pub fn url(&self) -> Option<&str> {
        self.property(URL_PROPERTY)
    }

    pub fn is_git(&self) -> bool {
        self.vcs_name == GIT_VCS_NAME
    }
}

/// Produces externally reachable links to build results.
pub trait WebLinks: Send + Sync {
    fn view_results_url(&self, build: &BuildSnapshot) -> String;
}

/// Result links rooted at the build server's public URL.
#[derive(Debug, Clone)]
pub struct ServerWebLinks {
    root_url: String,
}

impl ServerWebLinks {
    pub fn new(root_url: &str) -> Self {
        Self {
            root_url: root_url.trim_end_matches('/').to_string(),
        }
    }
}

impl WebLinks for ServerWebLinks {
    fn view_results_url(&self, build: &BuildSnapshot) -> String {
        format!("{}/viewLog.html?buildId={}", self.root_url, build.build_id)
    }
}
