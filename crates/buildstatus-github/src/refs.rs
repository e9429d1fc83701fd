//! Pull request merge ref classification.

use regex::Regex;
use std::sync::OnceLock;

fn merge_ref_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?:refs/)?pull/(\d+)/merge$").expect("merge ref pattern is a valid regex")
    })
}

/// Pull request number behind a merge ref such as `refs/pull/42/merge`.
///
/// Returns `None` for anything else, including `refs/pull/42/head`.
pub fn pull_request_number(branch_ref: &str) -> Option<u64> {
    merge_ref_pattern()
        .captures(branch_ref.trim())
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}
