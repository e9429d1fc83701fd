//! Human-readable commit comments for build events.
//!
//! Comments are Markdown. The failed-test section is capped at
//! [`MAX_LISTED_FAILURES`] entries so the payload stays within the remote
//! API's size limits no matter how many tests failed.

use crate::model::{BuildSnapshot, BuildStatus, TrackedRevision, WebLinks};
use std::fmt::Write;
use std::sync::Arc;

/// Failed tests rendered individually before the rest is summarized.
pub const MAX_LISTED_FAILURES: usize = 10;

const NO_DETAILS: &str = "<no details available>";

/// Composes comment bodies and result links for one configuration.
#[derive(Clone)]
pub struct CommentComposer {
    links: Arc<dyn WebLinks>,
    use_guest_links: bool,
}

impl CommentComposer {
    pub fn new(links: Arc<dyn WebLinks>, use_guest_links: bool) -> Self {
        Self {
            links,
            use_guest_links,
        }
    }

    /// Link to the build's result page, with the guest marker when enabled.
    pub fn results_url(&self, build: &BuildSnapshot) -> String {
        let url = self.links.view_results_url(build);
        if self.use_guest_links {
            let sep = if url.contains('?') { '&' } else { '?' };
            format!("{url}{sep}guest=1")
        } else {
            url
        }
    }

    /// Render the comment for a started (`completed == false`) or finished
    /// build.
    pub fn compose(
        &self,
        build: &BuildSnapshot,
        revision: &TrackedRevision,
        completed: bool,
        resolved_hash: &str,
    ) -> String {
        let mut comment = String::new();
        let label = build.build_type_name.as_deref().unwrap_or(&build.full_name);
        let _ = write!(
            comment,
            "{label} [Build {}]({}) ",
            build.build_number,
            self.results_url(build)
        );

        if completed {
            let _ = write!(comment, "outcome was **{}**", build.status.text());
        } else {
            comment.push_str("is now running");
        }
        comment.push('\n');

        if resolved_hash != revision.version_hash {
            let _ = writeln!(
                comment,
                "Reported on pull request head `{resolved_hash}` (built from `{}`)",
                revision.version_hash
            );
        }

        if completed {
            if let Some(summary) = build.status_text.as_deref() {
                let _ = write!(
                    comment,
                    "Summary: {summary} Build time: {}",
                    friendly_duration(build.duration_secs())
                );
                if build.status != BuildStatus::Normal {
                    append_failed_tests(&mut comment, build);
                }
            }
        }

        comment
    }
}

fn append_failed_tests(comment: &mut String, build: &BuildSnapshot) {
    if build.failed_tests.is_empty() {
        return;
    }

    comment.push_str("\n### Failed tests\n```\n");
    for test in build.failed_tests.iter().take(MAX_LISTED_FAILURES) {
        let _ = write!(
            comment,
            "{}: {}\n\n",
            test.name,
            failure_text(test.short_stacktrace.as_deref())
        );
    }

    let total = build.total_failed();
    if total > MAX_LISTED_FAILURES {
        let _ = writeln!(
            comment,
            "##### there are {} more failed tests, see build details",
            total - MAX_LISTED_FAILURES
        );
    }
    comment.push_str("```\n");
}

fn failure_text(stacktrace: Option<&str>) -> &str {
    match stacktrace {
        Some(trace) if !trace.trim().is_empty() => trace,
        _ => NO_DETAILS,
    }
}

/// `HH:MM:SS`; hours are not wrapped at 24.
fn friendly_duration(seconds: u64) -> String {
    let second = seconds % 60;
    let minute = (seconds / 60) % 60;
    let hour = seconds / 3600;
    format!("{hour:02}:{minute:02}:{second:02}")
}
