use crate::{Effect, KeywordSet, Msg, RunError, RunState, RunnerState};

/// Fixed message shown when the remote run ends in failure.
pub const RUN_FAILED_MESSAGE: &str = "Pipeline failed. Check logs and try again.";

const GATE_FALLBACK_REASON: &str = "Pipeline cannot run right now.";

/// Pure update function: applies a message to state and returns any effects.
///
/// Effects are ordered; callers must execute them in sequence.
pub fn update(mut state: RunnerState, msg: Msg) -> (RunnerState, Vec<Effect>) {
    let effects = match msg {
        Msg::KeywordsChanged(input) => {
            state.set_keywords_input(input);
            Vec::new()
        }
        Msg::RunRequested { gate } => {
            // Rate limit first, then validation; neither touches the network.
            if !gate.can_run {
                let reason = gate
                    .reason
                    .unwrap_or_else(|| GATE_FALLBACK_REASON.to_string());
                state.set_error(reason.clone());
                return (
                    state,
                    vec![Effect::ReportFailure(RunError::RateLimited {
                        reason,
                        next_available: gate.next_available_time,
                    })],
                );
            }

            let keywords = KeywordSet::parse(state.keywords_input());
            if let Err(err) = keywords.validate() {
                state.set_error(err.to_string());
                return (state, vec![Effect::ReportFailure(err)]);
            }

            state.clear_error();
            vec![Effect::TriggerPipeline { keywords }]
        }
        Msg::TriggerAccepted => {
            state.set_run_state(RunState::Queued);
            state.set_polling(true);
            vec![Effect::RecordRunStart, Effect::StartPolling]
        }
        Msg::TriggerFailed { error } => {
            state.set_run_state(RunState::Idle);
            state.set_error(error.to_string());
            vec![Effect::ReportFailure(error)]
        }
        Msg::RunProgressed(run_state) => {
            if state.is_polling() && !run_state.is_terminal() {
                state.set_run_state(run_state);
            }
            Vec::new()
        }
        Msg::RunSucceeded => {
            // A stale outcome after reset or a previous terminal must not re-arm the cooldown.
            if !state.is_polling() {
                return (state, Vec::new());
            }
            state.set_polling(false);
            state.set_run_state(RunState::Success);
            vec![
                Effect::StopPolling,
                Effect::RecordRunComplete,
                Effect::LoadResults,
            ]
        }
        Msg::RunFailed { message } => {
            if !state.is_polling() {
                return (state, Vec::new());
            }
            state.set_polling(false);
            state.set_run_state(RunState::Failed);
            state.set_error(message.clone());
            vec![
                Effect::StopPolling,
                Effect::ClearRunning,
                Effect::ReportFailure(RunError::RemoteRunFailure(message)),
            ]
        }
        Msg::ResetClicked => {
            let was_polling = state.is_polling();
            state.set_polling(false);
            state.set_run_state(RunState::Idle);
            state.clear_error();
            if was_polling {
                vec![Effect::StopPolling]
            } else {
                Vec::new()
            }
        }
        Msg::SessionExpired => {
            state.set_session_expired(true);
            Vec::new()
        }
        Msg::SessionRestored => {
            state.set_session_expired(false);
            Vec::new()
        }
        Msg::NoOp => Vec::new(),
    };

    (state, effects)
}
