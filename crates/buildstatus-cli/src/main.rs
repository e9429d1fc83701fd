//! Build status publisher CLI
//!
//! The `buildstatus` command reports a build lifecycle event to GitHub from
//! outside the build server, or checks the inputs the publisher would use.
//!
//! ## Commands
//!
//! - `publish`: report a started/finished/interrupted build
//! - `parse-url`: show the repository identity behind a VCS root URL
//! - `check-config`: validate publisher parameters

use anyhow::{Context, Result};
use buildstatus_core::config::params_from_env;
use buildstatus_core::{
    parse_repository_url, ApiFactory, BuildSnapshot, DispatchOutcome, LifecycleEvent, Publisher,
    PublisherConfig, ReportingPolicy, SchedulerConfig, ServerWebLinks, TrackedRevision,
    UpdateScheduler, VcsRootInstance,
};
use buildstatus_github::{GitHubApiFactory, GitHubClientConfig};
use clap::{Parser, Subcommand, ValueEnum};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "buildstatus")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Report build status to GitHub commits", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report one build lifecycle event
    Publish {
        /// Publisher parameters (JSON object); BUILDSTATUS_* variables override it
        #[arg(short, long)]
        params: PathBuf,

        /// VCS root (JSON)
        #[arg(long)]
        root: PathBuf,

        /// Build snapshot (JSON)
        #[arg(short, long)]
        build: PathBuf,

        /// Tracked revision (JSON)
        #[arg(short, long)]
        revision: PathBuf,

        /// Lifecycle event to report
        #[arg(short, long, value_enum)]
        event: EventArg,

        /// Public root URL of the build server, used for result links
        #[arg(long, env = "BUILDSTATUS_WEB_ROOT", default_value = "http://localhost:8111")]
        web_root: String,

        /// Maximum concurrent remote updates
        #[arg(long, default_value = "4")]
        max_concurrency: usize,

        /// Per-request timeout in seconds
        #[arg(long, default_value = "30")]
        timeout_secs: u64,
    },

    /// Parse a VCS root URL into owner and repository
    ParseUrl {
        /// Repository URL (https, ssh or scp-like)
        uri: String,
    },

    /// Validate publisher parameters and show the derived reporting policy
    CheckConfig {
        /// Publisher parameters (JSON object); BUILDSTATUS_* variables override it
        #[arg(short, long)]
        params: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum EventArg {
    Started,
    Finished,
    Interrupted,
}

impl From<EventArg> for LifecycleEvent {
    fn from(arg: EventArg) -> Self {
        match arg {
            EventArg::Started => LifecycleEvent::Started,
            EventArg::Finished => LifecycleEvent::Finished,
            EventArg::Interrupted => LifecycleEvent::Interrupted,
        }
    }
}

/// Inputs for one `publish` run.
struct PublishRequest<'a> {
    params: &'a Path,
    root: &'a Path,
    build: &'a Path,
    revision: &'a Path,
    event: LifecycleEvent,
    web_root: &'a str,
    max_concurrency: usize,
}

#[derive(Debug, Serialize)]
struct ConfigSummary<'a> {
    server_url: &'a str,
    auth_type: buildstatus_core::AuthType,
    status_context: &'a str,
    policy: ReportingPolicy,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    buildstatus_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Publish {
            params,
            root,
            build,
            revision,
            event,
            web_root,
            max_concurrency,
            timeout_secs,
        } => {
            let factory = GitHubApiFactory::new(
                GitHubClientConfig::default().with_timeout(Duration::from_secs(timeout_secs.max(1))),
            );
            let request = PublishRequest {
                params: &params,
                root: &root,
                build: &build,
                revision: &revision,
                event: event.into(),
                web_root: &web_root,
                max_concurrency,
            };
            let outcome = cmd_publish(&request, Arc::new(factory)).await?;
            println!("{}", render_outcome(&outcome));
            Ok(())
        }
        Commands::ParseUrl { uri } => cmd_parse_url(&uri),
        Commands::CheckConfig { params } => cmd_check_config(&params),
    }
}

/// Run one lifecycle event through the publisher and wait for the
/// resulting updates to finish.
async fn cmd_publish(
    request: &PublishRequest<'_>,
    factory: Arc<dyn ApiFactory>,
) -> Result<DispatchOutcome> {
    let params = load_params(request.params)?;
    let config = PublisherConfig::from_params(&params).context("Invalid publisher parameters")?;
    let root: VcsRootInstance = read_json_file(request.root)?;
    let build: BuildSnapshot = read_json_file(request.build)?;
    let revision: TrackedRevision = read_json_file(request.revision)?;

    let scheduler = UpdateScheduler::on_current_runtime(SchedulerConfig {
        max_concurrent: request.max_concurrency,
    })
    .context("No tokio runtime available")?;
    let publisher = Publisher::with_config(
        config,
        factory,
        Arc::new(ServerWebLinks::new(request.web_root)),
        scheduler.clone(),
    );

    info!(
        event = %request.event,
        build_id = build.build_id,
        hash = %revision.version_hash,
        "Publishing build event"
    );
    let outcome = publisher.dispatch(request.event, &root, &build, &revision);
    scheduler.wait_idle().await;
    Ok(outcome)
}

fn cmd_parse_url(uri: &str) -> Result<()> {
    let identity = parse_repository_url(uri)?;
    println!("{}", serde_json::to_string_pretty(&identity)?);
    Ok(())
}

fn cmd_check_config(params_path: &Path) -> Result<()> {
    let params = load_params(params_path)?;
    let config = PublisherConfig::from_params(&params).context("Invalid publisher parameters")?;
    println!("{}", serde_json::to_string_pretty(&summarize(&config))?);
    Ok(())
}

fn summarize(config: &PublisherConfig) -> ConfigSummary<'_> {
    ConfigSummary {
        server_url: &config.server_url,
        auth_type: config.auth.auth_type(),
        status_context: &config.status_context,
        policy: config.policy(),
    }
}

fn render_outcome(outcome: &DispatchOutcome) -> String {
    match outcome {
        DispatchOutcome::Submitted => "submitted".to_string(),
        DispatchOutcome::Skipped(reason) => format!("skipped: {reason}"),
    }
}

/// Read a parameter file and apply `BUILDSTATUS_*` environment overrides.
fn load_params(path: &Path) -> Result<HashMap<String, String>> {
    let mut params = read_params_file(path)?;
    params.extend(params_from_env());
    Ok(params)
}

/// Parameter files are flat JSON objects; scalar values are taken as text.
fn read_params_file(path: &Path) -> Result<HashMap<String, String>> {
    let raw: HashMap<String, Value> = read_json_file(path)?;
    raw.into_iter()
        .filter_map(|(key, value)| {
            let text = match value {
                Value::Null => return None,
                Value::String(s) => Ok(s),
                Value::Bool(b) => Ok(b.to_string()),
                Value::Number(n) => Ok(n.to_string()),
                Value::Array(_) | Value::Object(_) => Err(anyhow::anyhow!(
                    "Parameter '{}' in {:?} must be a string, number or boolean",
                    key,
                    path
                )),
            };
            Some(text.map(|t| (key, t)))
        })
        .collect()
}

fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse JSON in {:?}", path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use buildstatus_core::fakes::{MemoryApiFactory, RecordedCall};
    use buildstatus_core::{AuthType, ChangeState, SkipReason};
    use serde_json::json;

    fn write_json(dir: &Path, name: &str, value: Value) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, serde_json::to_vec_pretty(&value).unwrap()).unwrap();
        path
    }

    fn build_json() -> Value {
        json!({
            "build_id": 314,
            "full_name": "Widgets :: CI",
            "build_number": "27",
            "status": "failure",
            "status_text": "Tests failed: 2",
            "started_at": "2026-03-01T10:00:00Z",
            "finished_at": "2026-03-01T10:02:05Z",
            "failed_tests": [
                {"name": "widgets::parses", "short_stacktrace": "assertion failed"},
                {"name": "widgets::renders", "short_stacktrace": null}
            ],
            "failed_test_count": 2
        })
    }

    struct Inputs {
        _dir: tempfile::TempDir,
        params: PathBuf,
        root: PathBuf,
        build: PathBuf,
        revision: PathBuf,
    }

    fn inputs(params: Value) -> Inputs {
        let dir = tempfile::tempdir().unwrap();
        let params = write_json(dir.path(), "params.json", params);
        let root = write_json(
            dir.path(),
            "root.json",
            json!({"vcs_name": "git", "properties": {"url": "git@github.com:acme/widgets.git"}}),
        );
        let build = write_json(dir.path(), "build.json", build_json());
        let revision = write_json(
            dir.path(),
            "revision.json",
            json!({"version_hash": "c0ffee", "branch_ref": "refs/heads/main"}),
        );
        Inputs {
            _dir: dir,
            params,
            root,
            build,
            revision,
        }
    }

    fn request<'a>(inputs: &'a Inputs, event: LifecycleEvent) -> PublishRequest<'a> {
        PublishRequest {
            params: &inputs.params,
            root: &inputs.root,
            build: &inputs.build,
            revision: &inputs.revision,
            event,
            web_root: "https://ci.example.com/",
            max_concurrency: 2,
        }
    }

    #[test]
    fn test_params_file_accepts_scalars() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_json(
            dir.path(),
            "params.json",
            json!({
                "server_url": "https://api.github.com",
                "use_comments": true,
                "report_on": null
            }),
        );
        let params = read_params_file(&path).unwrap();
        assert_eq!(params.get("use_comments").map(String::as_str), Some("true"));
        assert!(!params.contains_key("report_on"));
    }

    #[test]
    fn test_params_file_rejects_nested_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_json(dir.path(), "params.json", json!({"server_url": ["a"]}));
        let err = read_params_file(&path).unwrap_err();
        assert!(err.to_string().contains("server_url"));
    }

    #[test]
    fn test_missing_file_has_context() {
        let err = read_json_file::<Value>(Path::new("/nonexistent/params.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read file"));
    }

    #[test]
    fn test_summary_hides_credentials() {
        let params: HashMap<String, String> = [
            ("server_url", "https://api.github.com"),
            ("auth_type", "token"),
            ("access_token", "ghp_secret"),
            ("report_on", "finish"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let config = PublisherConfig::from_params(&params).unwrap();
        let summary = summarize(&config);
        assert_eq!(summary.auth_type, AuthType::Token);
        assert!(!summary.policy.report_on_start);
        assert!(summary.policy.report_on_finish);

        let rendered = serde_json::to_string(&summary).unwrap();
        assert!(!rendered.contains("ghp_secret"));
    }

    #[test]
    fn test_parse_url_rejects_garbage() {
        assert!(cmd_parse_url("git@github.com:acme/widgets.git").is_ok());
        assert!(cmd_parse_url("not a url").is_err());
    }

    #[test]
    fn test_render_outcome() {
        assert_eq!(render_outcome(&DispatchOutcome::Submitted), "submitted");
        assert_eq!(
            render_outcome(&DispatchOutcome::Skipped(SkipReason::NotReported(
                LifecycleEvent::Started
            ))),
            "skipped: 'started' events are not reported"
        );
    }

    #[tokio::test]
    async fn test_publish_finished_posts_status_and_comment() {
        let inputs = inputs(json!({
            "server_url": "https://api.github.com",
            "auth_type": "password",
            "username": "ci-bot",
            "password": "pw",
            "use_comments": "true"
        }));
        let factory = Arc::new(MemoryApiFactory::new());

        let outcome = cmd_publish(&request(&inputs, LifecycleEvent::Finished), factory.clone())
            .await
            .unwrap();
        assert_eq!(outcome, DispatchOutcome::Submitted);

        // The command waits for the scheduler, so calls are already recorded.
        let calls = factory.api().calls();
        assert_eq!(calls.len(), 2);
        let RecordedCall::Status {
            owner,
            repo,
            state,
            target_url,
            ..
        } = &calls[0]
        else {
            panic!("expected a status first");
        };
        assert_eq!((owner.as_str(), repo.as_str()), ("acme", "widgets"));
        assert_eq!(*state, ChangeState::Failure);
        assert_eq!(target_url, "https://ci.example.com/viewLog.html?buildId=314");

        let RecordedCall::Comment { body, .. } = &calls[1] else {
            panic!("expected a comment second");
        };
        assert!(body.contains("widgets::parses: assertion failed"));
        assert!(body.contains("Build time: 00:02:05"));
    }

    #[tokio::test]
    async fn test_publish_rejects_invalid_params() {
        let inputs = inputs(json!({"auth_type": "token", "access_token": "t"}));
        let factory = Arc::new(MemoryApiFactory::new());

        let err = cmd_publish(&request(&inputs, LifecycleEvent::Started), factory.clone())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Invalid publisher parameters"));
        assert!(factory.opened().is_empty());
    }
}
