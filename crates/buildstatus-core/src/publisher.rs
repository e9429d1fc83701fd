//! Lifecycle facade wired into the build server's callbacks.
//!
//! A [`Publisher`] is created per configuration. Each callback runs the
//! gate → resolve → submit sequence and reports what happened as a
//! [`DispatchOutcome`]. Callbacks never fail and never wait for the network.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::warn;

use crate::api::ApiFactory;
use crate::config::PublisherConfig;
use crate::engine::DispatchEngine;
use crate::model::{BuildSnapshot, TrackedRevision, VcsRootInstance, WebLinks};
use crate::obs;
use crate::scheduler::UpdateScheduler;

/// Build lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Started,
    Finished,
    Interrupted,
}

impl LifecycleEvent {
    pub fn is_starting(&self) -> bool {
        matches!(self, LifecycleEvent::Started)
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LifecycleEvent::Started => "started",
            LifecycleEvent::Finished => "finished",
            LifecycleEvent::Interrupted => "interrupted",
        })
    }
}

/// Why an event produced no update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The configuration failed validation.
    NotConfigured,
    /// The VCS root is not a kind we can report for.
    UnsupportedVcs(String),
    /// The reporting policy excludes this event kind.
    NotReported(LifecycleEvent),
    /// Repository identity or client could not be resolved.
    Unresolvable(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotConfigured => write!(f, "publisher is not configured"),
            SkipReason::UnsupportedVcs(vcs) => write!(f, "unsupported VCS kind '{vcs}'"),
            SkipReason::NotReported(event) => write!(f, "'{event}' events are not reported"),
            SkipReason::Unresolvable(reason) => write!(f, "cannot resolve handler: {reason}"),
        }
    }
}

/// Result of one lifecycle callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Submitted,
    Skipped(SkipReason),
}

/// Per-configuration publisher.
///
/// Dispatch engines are built lazily per VCS root and reused for later
/// events on the same root. The cache holds one engine per distinct
/// `(vcs_name, url)` seen and is only shrunk through [`Publisher::forget_root`];
/// hosts that detach or edit roots should call it, or drop the publisher
/// when the configuration changes.
pub struct Publisher {
    config: Option<PublisherConfig>,
    factory: Arc<dyn ApiFactory>,
    links: Arc<dyn WebLinks>,
    scheduler: UpdateScheduler,
    engines: Mutex<HashMap<(String, String), Arc<DispatchEngine>>>,
}

impl Publisher {
    /// Validate `params` once; an invalid configuration is logged here and
    /// every later event is skipped.
    pub fn new(
        params: &HashMap<String, String>,
        factory: Arc<dyn ApiFactory>,
        links: Arc<dyn WebLinks>,
        scheduler: UpdateScheduler,
    ) -> Self {
        let config = match PublisherConfig::from_params(params) {
            Ok(config) => Some(config),
            Err(e) => {
                warn!(error = %e, "Invalid status publisher configuration; updates disabled");
                None
            }
        };
        Self::from_parts(config, factory, links, scheduler)
    }

    /// Publisher over an already validated configuration.
    pub fn with_config(
        config: PublisherConfig,
        factory: Arc<dyn ApiFactory>,
        links: Arc<dyn WebLinks>,
        scheduler: UpdateScheduler,
    ) -> Self {
        Self::from_parts(Some(config), factory, links, scheduler)
    }

    fn from_parts(
        config: Option<PublisherConfig>,
        factory: Arc<dyn ApiFactory>,
        links: Arc<dyn WebLinks>,
        scheduler: UpdateScheduler,
    ) -> Self {
        Self {
            config,
            factory,
            links,
            scheduler,
            engines: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> Option<&PublisherConfig> {
        self.config.as_ref()
    }

    /// Drop the cached engine for `root`. Returns whether one was cached.
    ///
    /// Updates already submitted keep their own handle on the engine state.
    pub fn forget_root(&self, root: &VcsRootInstance) -> bool {
        self.engines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&engine_key(root))
            .is_some()
    }

    /// Number of VCS roots with a cached engine.
    pub fn cached_roots(&self) -> usize {
        self.engines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn build_started(
        &self,
        root: &VcsRootInstance,
        build: &BuildSnapshot,
        revision: &TrackedRevision,
    ) -> DispatchOutcome {
        self.dispatch(LifecycleEvent::Started, root, build, revision)
    }

    pub fn build_finished(
        &self,
        root: &VcsRootInstance,
        build: &BuildSnapshot,
        revision: &TrackedRevision,
    ) -> DispatchOutcome {
        self.dispatch(LifecycleEvent::Finished, root, build, revision)
    }

    pub fn build_interrupted(
        &self,
        root: &VcsRootInstance,
        build: &BuildSnapshot,
        revision: &TrackedRevision,
    ) -> DispatchOutcome {
        self.dispatch(LifecycleEvent::Interrupted, root, build, revision)
    }

    /// Run one lifecycle event through the gate and, if it passes, submit
    /// the update.
    pub fn dispatch(
        &self,
        event: LifecycleEvent,
        root: &VcsRootInstance,
        build: &BuildSnapshot,
        revision: &TrackedRevision,
    ) -> DispatchOutcome {
        match self.try_dispatch(event, root, build, revision) {
            Ok(()) => DispatchOutcome::Submitted,
            Err(reason) => {
                obs::emit_event_skipped(build.build_id, &reason);
                DispatchOutcome::Skipped(reason)
            }
        }
    }

    fn try_dispatch(
        &self,
        event: LifecycleEvent,
        root: &VcsRootInstance,
        build: &BuildSnapshot,
        revision: &TrackedRevision,
    ) -> Result<(), SkipReason> {
        let config = self.config.as_ref().ok_or(SkipReason::NotConfigured)?;

        if !root.is_git() {
            warn!(
                vcs = %root.vcs_name,
                build_id = build.build_id,
                "No git revision to report status for; check the build's VCS roots"
            );
            return Err(SkipReason::UnsupportedVcs(root.vcs_name.clone()));
        }

        if !config.policy().allows(event.is_starting()) {
            return Err(SkipReason::NotReported(event));
        }

        let engine = self.engine_for(root, config)?;
        if event.is_starting() {
            engine.schedule_started(revision, build);
        } else {
            engine.schedule_completed(revision, build);
        }
        Ok(())
    }

    fn engine_for(
        &self,
        root: &VcsRootInstance,
        config: &PublisherConfig,
    ) -> Result<Arc<DispatchEngine>, SkipReason> {
        let key = engine_key(root);
        let mut engines = self.engines.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(engine) = engines.get(&key) {
            return Ok(Arc::clone(engine));
        }

        let engine = DispatchEngine::new(
            root,
            config,
            self.factory.as_ref(),
            Arc::clone(&self.links),
            self.scheduler.clone(),
        )
        .map(Arc::new)
        .map_err(|e| {
            warn!(error = %e, url = %key.1, "Cannot report build status for VCS root");
            SkipReason::Unresolvable(e.to_string())
        })?;

        engines.insert(key, Arc::clone(&engine));
        Ok(engine)
    }
}

fn engine_key(root: &VcsRootInstance) -> (String, String) {
    (root.vcs_name.clone(), root.url().unwrap_or_default().to_string())
}
