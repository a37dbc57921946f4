use crate::{KeywordAdvice, RunState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunViewModel {
    pub run_state: RunState,
    pub status_label: &'static str,
    pub error_message: Option<String>,
    pub keywords_input: String,
    pub keyword_count: usize,
    pub advice: KeywordAdvice,
    pub polling: bool,
    pub session_expired: bool,
    pub dirty: bool,
}
