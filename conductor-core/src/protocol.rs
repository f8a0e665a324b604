//! Status vocabulary shared with the orchestration layer
//!
//! Agents report progress in a `CONDUCTOR_STATUS` block. The invocation layer
//! never interprets agent output, but it does synthesize one block itself: the
//! blocked status returned when an invocation runs past its deadline.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// The key that begins a status block
pub const STATUS_BLOCK_KEY: &str = "CONDUCTOR_STATUS";

/// Sentinel used for `phase_completed` when no phase applies
pub const NULL_PHASE: &str = "null";

/// Status reported in a status block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Continue,
    Done,
    Blocked,
    ReviewPass,
    ReviewFail,
}

impl Status {
    /// Get all status values
    pub fn all() -> &'static [Status] {
        &[
            Status::Continue,
            Status::Done,
            Status::Blocked,
            Status::ReviewPass,
            Status::ReviewFail,
        ]
    }

    /// Wire representation of this status
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Continue => "CONTINUE",
            Status::Done => "DONE",
            Status::Blocked => "BLOCKED",
            Status::ReviewPass => "REVIEW_PASS",
            Status::ReviewFail => "REVIEW_FAIL",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Status::all()
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| Error::Other(format!("unknown status: {:?}", s)))
    }
}

/// Status block returned in place of agent output when an invocation times out
pub fn timeout_blocked_status() -> String {
    format!(
        "{key}:\n  phase_completed: {phase}\n  status: {status}\n  files_changed: []\n  summary: \"Timeout\"\n  error: \"Executor invocation timed out\"",
        key = STATUS_BLOCK_KEY,
        phase = NULL_PHASE,
        status = Status::Blocked,
    )
}
