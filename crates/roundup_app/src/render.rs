//! Plain-text rendering of run state for the terminal.

use chrono::{DateTime, Local, Utc};
use roundup_core::{KeywordAdvice, RateLimitCheck, RunState, RunViewModel};
use roundup_engine::{ArtifactInfo, StatusReport};

pub(crate) fn gate(check: &RateLimitCheck, remaining: &str) -> String {
    if check.can_run {
        return "Ready to run.".to_string();
    }
    let reason = check.reason.as_deref().unwrap_or("Pipeline cannot run right now.");
    match check.next_available_time {
        Some(next) => format!("{reason}\nNext run at {} ({remaining}).", local_time(next)),
        None => reason.to_string(),
    }
}

pub(crate) fn keyword_advice(view: &RunViewModel) -> Option<String> {
    match view.advice {
        KeywordAdvice::Good => None,
        KeywordAdvice::Defaults => Some("No keywords given; using the backend defaults.".to_string()),
        advice => Some(format!("{} keyword(s): {}", view.keyword_count, advice.message())),
    }
}

pub(crate) fn remote_status(report: &StatusReport) -> String {
    let mut line = format!("Remote status: {}", report.run_state());
    if let Some(run_id) = report.run_id {
        line.push_str(&format!(" (run {run_id})"));
    }
    if let Some(queued) = report.queued_requests.filter(|n| *n > 0) {
        line.push_str(&format!(", {queued} queued request(s)"));
    }
    if let Some(error) = report.last_error.as_deref().filter(|e| !e.is_empty()) {
        line.push_str(&format!("\nLast error: {error}"));
    }
    line
}

pub(crate) fn artifact(artifact: Option<&ArtifactInfo>) -> String {
    let Some(artifact) = artifact else {
        return "No artifact available yet.".to_string();
    };
    let mut text = match (&artifact.name, artifact.run_number) {
        (Some(name), Some(run)) => format!("Artifact {name} (run #{run})"),
        (Some(name), None) => format!("Artifact {name}"),
        (None, Some(run)) => format!("Artifact from run #{run}"),
        (None, None) => "Artifact".to_string(),
    };
    text.push_str(&format!("\n  {}", artifact.download_url));
    if let Some(created) = &artifact.created_at {
        text.push_str(&format!("\n  created {created}"));
    }
    text
}

pub(crate) fn progress(state: RunState) -> String {
    match state {
        RunState::Queued => "Queued: waiting for a runner...".to_string(),
        RunState::Running => "Running: collecting and summarising articles...".to_string(),
        RunState::Success => "Run finished.".to_string(),
        other => other.to_string(),
    }
}

/// Hint for a local "running" flag the backend no longer backs up, e.g.
/// after an interrupted `run`.
pub(crate) fn stale_run_hint(locally_running: bool, remote_active: bool) -> Option<&'static str> {
    (locally_running && !remote_active).then_some(
        "The backend reports no active run. Run `roundup clear` to unlock the next run.",
    )
}

fn local_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%H:%M:%S").to_string()
}
