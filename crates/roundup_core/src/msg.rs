use crate::{RateLimitCheck, RunError, RunState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// Operator edited the keyword input.
    KeywordsChanged(String),
    /// Operator asked for a run; carries the rate limiter's verdict taken just before.
    RunRequested { gate: RateLimitCheck },
    /// Backend accepted the trigger (`queued` or `already_running`).
    TriggerAccepted,
    /// Trigger request failed or was rejected.
    TriggerFailed { error: RunError },
    /// Poller observed a non-terminal state.
    RunProgressed(RunState),
    /// Poller observed the run finish successfully.
    RunSucceeded,
    /// Poller observed the run fail.
    RunFailed { message: String },
    /// Operator returned to the idle screen.
    ResetClicked,
    /// A 401 tore the session down.
    SessionExpired,
    /// A new login succeeded.
    SessionRestored,
    /// Fallback for placeholder wiring.
    NoOp,
}
