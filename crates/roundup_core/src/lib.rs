//! Roundup core: pure run-lifecycle state machine, keyword rules and the
//! local rate limiter.
mod effect;
mod error;
mod keywords;
mod msg;
mod rate_limit;
mod run_state;
mod state;
mod store;
mod update;
mod view_model;

pub use effect::Effect;
pub use error::RunError;
pub use keywords::{
    KeywordAdvice, KeywordSet, MAX_KEYWORDS, MIN_KEYWORDS, RECOMMENDED_KEYWORDS,
    TOO_FEW_KEYWORDS, TOO_MANY_KEYWORDS,
};
pub use msg::Msg;
pub use rate_limit::{
    system_clock, Clock, RateLimitCheck, RateLimitState, RateLimiter, ALREADY_RUNNING_REASON,
    COOLDOWN_MINUTES, RATE_LIMIT_KEY,
};
pub use run_state::{map_status, RunState};
pub use state::RunnerState;
pub use store::{KeyValueStore, MemoryStore, StoreError};
pub use update::{update, RUN_FAILED_MESSAGE};
pub use view_model::RunViewModel;
