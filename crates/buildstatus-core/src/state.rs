//! External status vocabulary and the mapping from build outcomes onto it.

use crate::model::BuildStatus;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status states understood by the remote service.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ChangeState {
    Pending,
    Success,
    Failure,
    Error,
}

impl ChangeState {
    /// Wire name used by the remote API.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeState::Pending => "pending",
            ChangeState::Success => "success",
            ChangeState::Failure => "failure",
            ChangeState::Error => "error",
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, ChangeState::Pending)
    }
}

impl fmt::Display for ChangeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map the outcome of a finished or interrupted build.
///
/// Started builds are always `Pending` and never go through here.
pub fn map_status(status: BuildStatus) -> ChangeState {
    if status.priority() == BuildStatus::Normal.priority() {
        ChangeState::Success
    } else if status.priority() == BuildStatus::Failure.priority() {
        ChangeState::Failure
    } else {
        ChangeState::Error
    }
}
