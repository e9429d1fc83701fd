//! Build Status Publisher core
//!
//! Reports build lifecycle events to a source-hosting service:
//! - Parses the VCS root URL into a stable `(owner, repository)` identity
//! - Resolves which commit to annotate, following pull-request merge refs
//! - Maps build outcomes onto the remote status vocabulary
//! - Composes bounded-length comments for build events
//! - Submits each update as an isolated, fire-and-forget background task
//!
//! Nothing in this crate ever propagates a remote failure into the caller's
//! build lifecycle; failures end up in the logs and nowhere else.

pub mod api;
pub mod auth;
pub mod comment;
pub mod config;
pub mod engine;
pub mod error;
pub mod fakes;
pub mod identity;
pub mod model;
pub mod obs;
pub mod publisher;
pub mod resolver;
pub mod scheduler;
pub mod state;
pub mod telemetry;

pub use api::{ApiFactory, AuthenticatedClient, StatusApi};
pub use auth::resolve_client;
pub use comment::{CommentComposer, MAX_LISTED_FAILURES};
pub use config::{
    params_from_env, AuthConfig, AuthType, PublisherConfig, ReportOn, ReportingPolicy,
    DEFAULT_STATUS_CONTEXT,
};
pub use engine::{DispatchEngine, UpdateRequest, UpdateTask};
pub use error::{ApiError, ConfigError, IdentityError, PublisherError, Result};
pub use identity::{parse_repository_url, RepositoryIdentity};
pub use model::{
    BuildSnapshot, BuildStatus, FailedTest, ServerWebLinks, TrackedRevision, VcsRootInstance,
    WebLinks, GIT_VCS_NAME,
};
pub use publisher::{DispatchOutcome, LifecycleEvent, Publisher, SkipReason};
pub use resolver::{resolve_commit, CommitResolution};
pub use scheduler::{SchedulerConfig, UpdateScheduler};
pub use state::{map_status, ChangeState};
pub use telemetry::init_tracing;

/// Build status publisher version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
