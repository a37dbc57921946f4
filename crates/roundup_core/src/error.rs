use chrono::{DateTime, Utc};
use thiserror::Error;

/// Failures surfaced to whoever asked for a run. `Display` is the
/// user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunError {
    /// Keyword count outside `0` or `5..=25`; detected before any I/O.
    #[error("{0}")]
    Validation(String),
    /// Cooldown active or a run already in progress.
    #[error("{reason}")]
    RateLimited {
        reason: String,
        next_available: Option<DateTime<Utc>>,
    },
    /// Backend declined to start a run, or the trigger request failed.
    #[error("{0}")]
    TriggerRejected(String),
    /// The backend answered 401; the session has already been torn down.
    #[error("Session expired. Please log in again.")]
    Unauthorized,
    /// The polled job ended in failure, cancellation or timeout.
    #[error("{0}")]
    RemoteRunFailure(String),
}
