use std::sync::Once;

use pretty_assertions::assert_eq;
use roundup_core::{
    update, Effect, KeywordAdvice, KeywordSet, Msg, RateLimitCheck, RunError, RunState,
    RunnerState, RUN_FAILED_MESSAGE,
};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(roundup_logging::initialize_for_tests);
}

fn request_run(state: RunnerState, input: &str) -> (RunnerState, Vec<Effect>) {
    let (state, _) = update(state, Msg::KeywordsChanged(input.to_string()));
    update(
        state,
        Msg::RunRequested {
            gate: RateLimitCheck::allowed(),
        },
    )
}

fn polling_state() -> RunnerState {
    let (state, _) = request_run(RunnerState::new(), "");
    let (state, effects) = update(state, Msg::TriggerAccepted);
    assert_eq!(effects, vec![Effect::RecordRunStart, Effect::StartPolling]);
    state
}

#[test]
fn blank_keywords_trigger_with_defaults() {
    init_logging();
    let (state, effects) = request_run(RunnerState::new(), "");

    assert_eq!(
        effects,
        vec![Effect::TriggerPipeline {
            keywords: KeywordSet::default()
        }]
    );
    assert_eq!(state.run_state(), RunState::Idle);
    assert_eq!(state.error_message(), None);
}

#[test]
fn too_few_keywords_fail_before_any_io() {
    init_logging();
    let (state, effects) = request_run(RunnerState::new(), "a,b,c");

    assert_eq!(effects.len(), 1);
    match &effects[0] {
        Effect::ReportFailure(RunError::Validation(message)) => {
            assert!(message.contains("at least 5"));
        }
        other => panic!("unexpected effect {other:?}"),
    }
    assert!(state.error_message().unwrap().contains("at least 5"));
    assert!(!state.is_polling());
}

#[test]
fn rate_limit_is_checked_before_validation() {
    init_logging();
    let (state, _) = update(RunnerState::new(), Msg::KeywordsChanged("a,b".to_string()));
    let gate = RateLimitCheck {
        can_run: false,
        reason: Some("Pipeline is already running.".to_string()),
        next_available_time: None,
    };
    let (state, effects) = update(state, Msg::RunRequested { gate });

    assert_eq!(
        effects,
        vec![Effect::ReportFailure(RunError::RateLimited {
            reason: "Pipeline is already running.".to_string(),
            next_available: None,
        })]
    );
    assert_eq!(state.error_message(), Some("Pipeline is already running."));
}

#[test]
fn valid_keywords_are_forwarded_in_order() {
    init_logging();
    let (_state, effects) = request_run(RunnerState::new(), "e, d, c, b, a");
    assert_eq!(
        effects,
        vec![Effect::TriggerPipeline {
            keywords: KeywordSet::parse("e,d,c,b,a")
        }]
    );
}

#[test]
fn trigger_failure_returns_to_idle_without_touching_limiter() {
    init_logging();
    let (state, _) = request_run(RunnerState::new(), "");
    let error = RunError::TriggerRejected("Cooldown active. Try again in 30 seconds.".to_string());
    let (state, effects) = update(
        state,
        Msg::TriggerFailed {
            error: error.clone(),
        },
    );

    assert_eq!(effects, vec![Effect::ReportFailure(error)]);
    assert_eq!(state.run_state(), RunState::Idle);
    assert!(!state.is_polling());
}

#[test]
fn accepted_trigger_queues_and_starts_polling() {
    init_logging();
    let state = polling_state();
    assert_eq!(state.run_state(), RunState::Queued);
    assert!(state.is_polling());
}

#[test]
fn success_stops_polling_before_recording_completion() {
    init_logging();
    let state = polling_state();
    let (state, _) = update(state, Msg::RunProgressed(RunState::Running));
    assert_eq!(state.run_state(), RunState::Running);

    let (state, effects) = update(state, Msg::RunSucceeded);
    assert_eq!(
        effects,
        vec![
            Effect::StopPolling,
            Effect::RecordRunComplete,
            Effect::LoadResults
        ]
    );
    assert_eq!(state.run_state(), RunState::Success);
    assert!(!state.is_polling());

    // A duplicate terminal report is ignored.
    let (_state, effects) = update(state, Msg::RunSucceeded);
    assert!(effects.is_empty());
}

#[test]
fn failure_clears_running_without_cooldown() {
    init_logging();
    let state = polling_state();
    let (state, effects) = update(
        state,
        Msg::RunFailed {
            message: RUN_FAILED_MESSAGE.to_string(),
        },
    );

    assert_eq!(
        effects,
        vec![
            Effect::StopPolling,
            Effect::ClearRunning,
            Effect::ReportFailure(RunError::RemoteRunFailure(RUN_FAILED_MESSAGE.to_string())),
        ]
    );
    assert_eq!(state.run_state(), RunState::Failed);
    assert_eq!(state.error_message(), Some(RUN_FAILED_MESSAGE));
}

#[test]
fn progress_is_ignored_when_not_polling() {
    init_logging();
    let (mut state, _) = update(RunnerState::new(), Msg::RunProgressed(RunState::Running));
    assert_eq!(state.run_state(), RunState::Idle);
    assert!(!state.consume_dirty());
}

#[test]
fn reset_stops_polling_and_returns_to_idle() {
    init_logging();
    let state = polling_state();
    let (state, effects) = update(state, Msg::ResetClicked);
    assert_eq!(effects, vec![Effect::StopPolling]);
    assert_eq!(state.run_state(), RunState::Idle);

    let (_state, effects) = update(state, Msg::RunSucceeded);
    assert!(effects.is_empty());
}

#[test]
fn session_expiry_is_reflected_in_view() {
    init_logging();
    let (mut state, effects) = update(RunnerState::new(), Msg::SessionExpired);
    assert!(effects.is_empty());
    assert!(state.view().session_expired);
    assert!(state.consume_dirty());

    let (state, _) = update(state, Msg::SessionRestored);
    assert!(!state.is_session_expired());
}

#[test]
fn view_reports_keyword_advice() {
    init_logging();
    let (state, _) = update(
        RunnerState::new(),
        Msg::KeywordsChanged("a, b, c, , d".to_string()),
    );
    let view = state.view();
    assert_eq!(view.keyword_count, 4);
    assert_eq!(view.advice, KeywordAdvice::TooFew);
    assert_eq!(view.status_label, "Ready");
    assert!(view.dirty);
}
