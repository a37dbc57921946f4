use std::fmt;

use serde::{Deserialize, Serialize};

/// Local view of the remote job, rebuilt from each status poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    #[default]
    Idle,
    Queued,
    Running,
    Success,
    Failed,
}

impl RunState {
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "Ready",
            Self::Queued => "Queued",
            Self::Running => "Running",
            Self::Success => "Success",
            Self::Failed => "Failed",
        }
    }

    pub fn is_active(self) -> bool {
        matches!(self, Self::Queued | Self::Running)
    }

    /// No further polling happens once a terminal state is reached.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Maps the backend's `status`/`conclusion` pair onto a `RunState`.
///
/// Anything unrecognised maps to `Idle`, meaning "no data".
pub fn map_status(status: &str, conclusion: Option<&str>) -> RunState {
    match (status, conclusion) {
        ("queued", _) => RunState::Queued,
        ("running" | "in_progress", _) => RunState::Running,
        ("success", _) | ("completed", Some("success")) => RunState::Success,
        ("failed", _) | ("completed", Some("failure" | "cancelled" | "timed_out")) => {
            RunState::Failed
        }
        _ => RunState::Idle,
    }
}
