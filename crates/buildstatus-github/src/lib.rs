//! GitHub transport for the build status publisher.
//!
//! [`GitHubClient`] implements [`buildstatus_core::StatusApi`] against the
//! GitHub REST v3 API (github.com or an Enterprise `/api/v3` base), and
//! [`GitHubApiFactory`] opens it for password or token authentication.

pub mod client;
pub mod error;
pub mod factory;
pub mod refs;

pub use client::{Credentials, GitHubClient};
pub use factory::{GitHubApiFactory, GitHubClientConfig};
pub use refs::pull_request_number;
