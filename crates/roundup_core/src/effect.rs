use crate::{KeywordSet, RunError};

/// Side effects requested by `update`, executed in order by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Send the authenticated trigger request.
    TriggerPipeline { keywords: KeywordSet },
    RecordRunStart,
    StartPolling,
    /// Cancel the poll loop. Always ordered before any effect that could start a new one.
    StopPolling,
    RecordRunComplete,
    ClearRunning,
    /// Fetch the latest artifact and surface the finished run.
    LoadResults,
    /// Report a failure back to whoever asked for the run.
    ReportFailure(RunError),
}
