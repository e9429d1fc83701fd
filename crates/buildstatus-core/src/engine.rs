//! Dispatch engine: one per (VCS root, configuration) pair.
//!
//! Construction resolves everything that can be resolved up front: the
//! repository identity, the authenticated client and the reporting policy.
//! Scheduling an update only builds an [`UpdateRequest`] and hands it to the
//! [`UpdateScheduler`]; the commit lookup and the remote calls happen in the
//! background task.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::Instrument;
use uuid::Uuid;

use crate::api::{ApiFactory, AuthenticatedClient, StatusApi};
use crate::auth::resolve_client;
use crate::comment::CommentComposer;
use crate::config::{PublisherConfig, ReportingPolicy};
use crate::error::{IdentityError, Result};
use crate::identity::{parse_repository_url, RepositoryIdentity};
use crate::model::{BuildSnapshot, TrackedRevision, VcsRootInstance, WebLinks};
use crate::obs;
use crate::resolver::resolve_commit;
use crate::scheduler::UpdateScheduler;
use crate::state::{map_status, ChangeState};

/// What a lifecycle callback hands to the scheduler.
///
/// The commit is still unresolved; that lookup may hit the network and so
/// belongs to the background task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRequest {
    pub task_id: Uuid,
    pub build: BuildSnapshot,
    pub revision: TrackedRevision,
    pub state: ChangeState,
    pub status_message: String,
}

/// A fully resolved update, ready to be sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateTask {
    pub task_id: Uuid,
    pub identity: RepositoryIdentity,
    pub commit_hash: String,
    pub state: ChangeState,
    pub status_message: String,
    pub target_url: String,
    pub context: String,
    pub comment_body: Option<String>,
    pub build_id: u64,
    pub branch_ref: Option<String>,
}

/// Read-only state shared by every task of one engine.
struct Shared {
    identity: RepositoryIdentity,
    client: AuthenticatedClient,
    policy: ReportingPolicy,
    composer: CommentComposer,
    status_context: String,
}

/// Per-root status dispatcher.
pub struct DispatchEngine {
    shared: Arc<Shared>,
    scheduler: UpdateScheduler,
}

impl DispatchEngine {
    /// Resolve identity and client for `root` under `config`.
    pub fn new(
        root: &VcsRootInstance,
        config: &PublisherConfig,
        factory: &dyn ApiFactory,
        links: Arc<dyn WebLinks>,
        scheduler: UpdateScheduler,
    ) -> Result<Self> {
        let uri = root
            .url()
            .ok_or_else(|| IdentityError::new("", "VCS root has no url property"))?;
        let identity = parse_repository_url(uri)?;
        let client = resolve_client(config, factory)?;
        let policy = config.policy();

        Ok(Self {
            shared: Arc::new(Shared {
                identity,
                client,
                policy,
                composer: CommentComposer::new(links, policy.use_guest_links),
                status_context: config.status_context.clone(),
            }),
            scheduler,
        })
    }

    pub fn identity(&self) -> &RepositoryIdentity {
        &self.shared.identity
    }

    pub fn policy(&self) -> ReportingPolicy {
        self.shared.policy
    }

    pub fn should_report_on_start(&self) -> bool {
        self.shared.policy.report_on_start
    }

    pub fn should_report_on_finish(&self) -> bool {
        self.shared.policy.report_on_finish
    }

    /// Queue a `pending` status for a build that just started.
    pub fn schedule_started(&self, revision: &TrackedRevision, build: &BuildSnapshot) {
        let message = format!("Started build {}", build.full_name);
        self.schedule(revision, build, message, ChangeState::Pending);
    }

    /// Queue the final status for a finished or interrupted build.
    pub fn schedule_completed(&self, revision: &TrackedRevision, build: &BuildSnapshot) {
        tracing::debug!(
            status = build.status.text(),
            priority = build.status.priority(),
            "Mapping build outcome"
        );
        let state = map_status(build.status);
        let message = match build.status_text.as_deref() {
            Some(text) => format!("Finished build {}: {text}", build.full_name),
            None => format!("Finished build {}", build.full_name),
        };
        self.schedule(revision, build, message, state);
    }

    fn schedule(
        &self,
        revision: &TrackedRevision,
        build: &BuildSnapshot,
        status_message: String,
        state: ChangeState,
    ) {
        obs::emit_status_scheduled(
            &revision.version_hash,
            revision.branch_ref.as_deref(),
            build.build_id,
            state,
        );

        let request = UpdateRequest {
            task_id: Uuid::new_v4(),
            build: build.clone(),
            revision: revision.clone(),
            state,
            status_message,
        };
        let span = obs::update_span(build.build_id, &self.shared.identity);
        let shared = Arc::clone(&self.shared);

        self.scheduler.submit(
            "set change status",
            async move { shared.run(request).await }.instrument(span),
        );
    }
}

impl Shared {
    async fn run(&self, request: UpdateRequest) {
        let resolution = resolve_commit(
            &request.revision,
            &self.identity,
            self.client.as_ref(),
            request.build.build_id,
        )
        .await;
        let task = self.build_task(request, resolution.into_hash());
        execute(self.client.as_ref(), &task).await;
    }

    fn build_task(&self, request: UpdateRequest, commit_hash: String) -> UpdateTask {
        let comment_body = self.policy.post_comments.then(|| {
            self.composer.compose(
                &request.build,
                &request.revision,
                !request.state.is_pending(),
                &commit_hash,
            )
        });

        UpdateTask {
            task_id: request.task_id,
            identity: self.identity.clone(),
            target_url: self.composer.results_url(&request.build),
            commit_hash,
            state: request.state,
            status_message: request.status_message,
            context: self.status_context.clone(),
            comment_body,
            build_id: request.build.build_id,
            branch_ref: request.revision.branch_ref,
        }
    }
}

/// Send one resolved update.
///
/// The status call and the comment call are separate failure domains: the
/// comment is attempted whatever happened to the status. Failures are
/// logged and swallowed.
pub async fn execute(client: &dyn StatusApi, task: &UpdateTask) {
    let owner = task.identity.owner();
    let repo = task.identity.name();

    match client
        .set_change_status(
            owner,
            repo,
            &task.commit_hash,
            task.state,
            &task.target_url,
            &task.status_message,
            &task.context,
        )
        .await
    {
        Ok(()) => obs::emit_status_updated(&task.commit_hash, task.build_id, task.state),
        Err(e) => obs::emit_status_update_failed(&task.commit_hash, task.build_id, task.state, &e),
    }

    if let Some(body) = &task.comment_body {
        match client.post_comment(owner, repo, &task.commit_hash, body).await {
            Ok(()) => obs::emit_comment_posted(&task.commit_hash, task.build_id, task.state),
            Err(e) => obs::emit_comment_failed(
                &task.commit_hash,
                task.branch_ref.as_deref(),
                task.build_id,
                task.state,
                &e,
            ),
        }
    }
}
