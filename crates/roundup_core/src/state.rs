use crate::view_model::RunViewModel;
use crate::{KeywordAdvice, KeywordSet, RunState};

/// In-memory run lifecycle. Rebuilt fresh for every client session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunnerState {
    run_state: RunState,
    error_message: Option<String>,
    keywords_input: String,
    polling: bool,
    session_expired: bool,
    dirty: bool,
}

impl RunnerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> RunViewModel {
        let keyword_count = KeywordSet::parse(&self.keywords_input).len();
        RunViewModel {
            run_state: self.run_state,
            status_label: self.run_state.label(),
            error_message: self.error_message.clone(),
            keywords_input: self.keywords_input.clone(),
            keyword_count,
            advice: KeywordAdvice::for_count(keyword_count),
            polling: self.polling,
            session_expired: self.session_expired,
            dirty: self.dirty,
        }
    }

    pub fn run_state(&self) -> RunState {
        self.run_state
    }

    pub fn keywords_input(&self) -> &str {
        &self.keywords_input
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// True between an accepted trigger and a terminal poll outcome or reset.
    pub fn is_polling(&self) -> bool {
        self.polling
    }

    pub fn is_session_expired(&self) -> bool {
        self.session_expired
    }

    /// Returns whether anything changed since the last call, and clears the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn set_keywords_input(&mut self, input: String) {
        if self.keywords_input != input {
            self.keywords_input = input;
            self.dirty = true;
        }
    }

    pub(crate) fn set_run_state(&mut self, run_state: RunState) {
        if self.run_state != run_state {
            self.run_state = run_state;
            self.dirty = true;
        }
    }

    pub(crate) fn set_error(&mut self, message: impl Into<String>) {
        self.error_message = Some(message.into());
        self.dirty = true;
    }

    pub(crate) fn clear_error(&mut self) {
        if self.error_message.take().is_some() {
            self.dirty = true;
        }
    }

    pub(crate) fn set_polling(&mut self, polling: bool) {
        if self.polling != polling {
            self.polling = polling;
            self.dirty = true;
        }
    }

    pub(crate) fn set_session_expired(&mut self, expired: bool) {
        if self.session_expired != expired {
            self.session_expired = expired;
            self.dirty = true;
        }
    }
}
