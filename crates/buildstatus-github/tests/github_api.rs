//! GitHub client behaviour against a mock REST server.

use std::collections::HashMap;
use std::sync::Arc;

use buildstatus_core::config::keys;
use buildstatus_core::{
    ApiError, ApiFactory, BuildSnapshot, BuildStatus, ChangeState, DispatchOutcome, FailedTest,
    Publisher, SchedulerConfig, ServerWebLinks, StatusApi, TrackedRevision, UpdateScheduler,
    VcsRootInstance,
};
use buildstatus_github::{GitHubApiFactory, GitHubClientConfig};
use chrono::Utc;
use httpmock::prelude::*;
use serde_json::json;

fn factory() -> GitHubApiFactory {
    GitHubApiFactory::new(GitHubClientConfig::default().with_user_agent("buildstatus-test"))
}

#[tokio::test]
async fn status_is_posted_with_token_auth() {
    let server = MockServer::start();
    let status = server.mock(|when, then| {
        when.method(POST)
            .path("/repos/acme/widgets/statuses/c0ffee")
            .header("authorization", "token t0k")
            .header("accept", "application/vnd.github+json")
            .header("user-agent", "buildstatus-test")
            .json_body(json!({
                "state": "pending",
                "target_url": "https://ci.example.com/viewLog.html?buildId=7",
                "description": "Started build Widgets :: CI",
                "context": "continuous-integration/buildstatus"
            }));
        then.status(201).json_body(json!({"id": 1, "state": "pending"}));
    });

    let client = factory().open_for_token(&server.base_url(), "t0k").unwrap();
    client
        .set_change_status(
            "acme",
            "widgets",
            "c0ffee",
            ChangeState::Pending,
            "https://ci.example.com/viewLog.html?buildId=7",
            "Started build Widgets :: CI",
            "continuous-integration/buildstatus",
        )
        .await
        .expect("status post");
    status.assert();
}

#[tokio::test]
async fn comment_is_posted_with_basic_auth() {
    let server = MockServer::start();
    let comment = server.mock(|when, then| {
        when.method(POST)
            .path("/repos/acme/widgets/commits/c0ffee/comments")
            .header("authorization", "Basic Ym90OnB3")
            .body_includes("outcome was **FAILURE**");
        then.status(201).json_body(json!({"id": 99}));
    });

    let client = factory()
        .open_for_user(&format!("{}/", server.base_url()), "bot", "pw")
        .unwrap();
    client
        .post_comment("acme", "widgets", "c0ffee", "Widgets outcome was **FAILURE**\n")
        .await
        .expect("comment post");
    assert_eq!(comment.calls(), 1);
}

#[tokio::test]
async fn rejected_status_maps_to_status_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/repos/acme/widgets/statuses/c0ffee");
        then.status(422).body("{\"message\":\"No commit found for SHA: c0ffee\"}");
    });

    let client = factory().open_for_token(&server.base_url(), "t0k").unwrap();
    let err = client
        .set_change_status("acme", "widgets", "c0ffee", ChangeState::Success, "u", "d", "c")
        .await
        .unwrap_err();
    let ApiError::Status { status, body } = &err else {
        panic!("expected a status error, got {err:?}");
    };
    assert_eq!(*status, 422);
    assert!(body.contains("No commit found"));
}

#[tokio::test]
async fn unreachable_server_maps_to_transport_error() {
    let client = factory()
        .open_for_token("http://127.0.0.1:1", "t0k")
        .unwrap();
    let err = client
        .post_comment("acme", "widgets", "c0ffee", "body")
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Transport(_)), "{err:?}");
}

#[tokio::test]
async fn pull_request_head_is_read_from_pulls_endpoint() {
    let server = MockServer::start();
    let pull = server.mock(|when, then| {
        when.method(GET).path("/repos/acme/widgets/pulls/42");
        then.status(200).json_body(json!({
            "number": 42,
            "head": {"ref": "feature", "sha": "abc123"},
            "base": {"ref": "main", "sha": "000111"}
        }));
    });

    let client = factory().open_for_token(&server.base_url(), "t0k").unwrap();
    let head = client
        .find_pull_request_head_commit("acme", "widgets", "refs/pull/42/merge")
        .await
        .unwrap();
    assert_eq!(head.as_deref(), Some("abc123"));
    pull.assert();
}

#[tokio::test]
async fn missing_pull_request_is_none() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/repos/acme/widgets/pulls/9");
        then.status(404).json_body(json!({"message": "Not Found"}));
    });

    let client = factory().open_for_token(&server.base_url(), "t0k").unwrap();
    let head = client
        .find_pull_request_head_commit("acme", "widgets", "pull/9/merge")
        .await
        .unwrap();
    assert_eq!(head, None);
}

#[tokio::test]
async fn non_merge_ref_skips_lookup() {
    // Any request to this address would fail with a transport error.
    let client = factory()
        .open_for_token("http://127.0.0.1:1", "t0k")
        .unwrap();
    let head = client
        .find_pull_request_head_commit("acme", "widgets", "refs/heads/main")
        .await
        .unwrap();
    assert_eq!(head, None);
}

#[tokio::test]
async fn finished_merge_build_reports_to_pull_request_head() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/repos/acme/widgets/pulls/5");
        then.status(200).json_body(json!({"head": {"sha": "headsha"}}));
    });
    let status = server.mock(|when, then| {
        when.method(POST)
            .path("/repos/acme/widgets/statuses/headsha")
            .body_includes("\"state\":\"failure\"")
            .body_includes("Finished build Widgets :: CI: Tests failed: 1");
        then.status(201);
    });
    let comment = server.mock(|when, then| {
        when.method(POST)
            .path("/repos/acme/widgets/commits/headsha/comments")
            .body_includes("### Failed tests");
        then.status(201);
    });

    let params: HashMap<String, String> = [
        (keys::SERVER_URL, server.base_url()),
        (keys::AUTH_TYPE, "token".to_string()),
        (keys::ACCESS_TOKEN, "t0k".to_string()),
        (keys::USE_COMMENTS, "true".to_string()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();

    let scheduler = UpdateScheduler::on_current_runtime(SchedulerConfig::default()).unwrap();
    let publisher = Publisher::new(
        &params,
        Arc::new(factory()),
        Arc::new(ServerWebLinks::new("https://ci.example.com")),
        scheduler.clone(),
    );

    let now = Utc::now();
    let build = BuildSnapshot {
        build_id: 7,
        full_name: "Widgets :: CI".to_string(),
        build_type_name: None,
        build_number: "12".to_string(),
        status: BuildStatus::Failure,
        status_text: Some("Tests failed: 1".to_string()),
        started_at: now,
        finished_at: Some(now),
        failed_tests: vec![FailedTest::new("widgets::flaky", None)],
        failed_test_count: 1,
    };
    let outcome = publisher.build_finished(
        &VcsRootInstance::git("https://github.com/acme/widgets.git"),
        &build,
        &TrackedRevision::new("mergesha", Some("refs/pull/5/merge")),
    );
    assert_eq!(outcome, DispatchOutcome::Submitted);

    scheduler.wait_idle().await;
    status.assert();
    comment.assert();
}
