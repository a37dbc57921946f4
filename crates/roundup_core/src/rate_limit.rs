//! Local cooldown and concurrency gate for pipeline runs.
//!
//! The gate is advisory: it lives in the client's durable store and is not a
//! server-enforced guarantee. The cooldown window is measured from the last
//! *completed* run; `last_started_at` is bookkeeping only.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{KeyValueStore, StoreError};

/// Minutes that must pass after a successful run before the next one.
pub const COOLDOWN_MINUTES: i64 = 20;

/// Durable-store key holding the serialized `RateLimitState`.
pub const RATE_LIMIT_KEY: &str = "pipeline_rate_limit";

pub const ALREADY_RUNNING_REASON: &str =
    "Pipeline is already running. Please wait for the current run to finish.";

/// Source of "now"; injected so tests can move time.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(Utc::now)
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitState {
    pub is_running: bool,
    pub last_started_at: Option<DateTime<Utc>>,
    pub last_completed_at: Option<DateTime<Utc>>,
}

/// Verdict of `RateLimiter::can_run_pipeline`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitCheck {
    pub can_run: bool,
    pub reason: Option<String>,
    pub next_available_time: Option<DateTime<Utc>>,
}

impl RateLimitCheck {
    pub fn allowed() -> Self {
        Self {
            can_run: true,
            reason: None,
            next_available_time: None,
        }
    }

    fn blocked(reason: String, next_available_time: Option<DateTime<Utc>>) -> Self {
        Self {
            can_run: false,
            reason: Some(reason),
            next_available_time,
        }
    }
}

pub struct RateLimiter {
    store: Arc<dyn KeyValueStore>,
    clock: Clock,
    cooldown: Duration,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_clock(store, system_clock())
    }

    pub fn with_clock(store: Arc<dyn KeyValueStore>, clock: Clock) -> Self {
        Self {
            store,
            clock,
            cooldown: Duration::minutes(COOLDOWN_MINUTES),
        }
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Reads the persisted record. A missing entry is the default state.
    pub fn load_state(&self) -> Result<RateLimitState, StoreError> {
        let Some(raw) = self.store.get(RATE_LIMIT_KEY)? else {
            return Ok(RateLimitState::default());
        };
        serde_json::from_str(&raw).map_err(|err| StoreError::Corrupt {
            key: RATE_LIMIT_KEY.to_string(),
            message: err.to_string(),
        })
    }

    /// Like `load_state`, but an unreadable record counts as "never ran".
    pub fn state(&self) -> RateLimitState {
        self.load_state().unwrap_or_default()
    }

    pub fn can_run_pipeline(&self) -> RateLimitCheck {
        let state = self.state();
        if state.is_running {
            return RateLimitCheck::blocked(ALREADY_RUNNING_REASON.to_string(), None);
        }

        let now = (self.clock)();
        match self.next_available(&state, now) {
            Some(next) => RateLimitCheck::blocked(
                format!(
                    "Please wait {} before running the pipeline again. Maximum one run every {} minutes.",
                    format_remaining(next - now),
                    self.cooldown.num_minutes()
                ),
                Some(next),
            ),
            None => RateLimitCheck::allowed(),
        }
    }

    /// Call only after the backend confirmed the trigger.
    pub fn record_pipeline_start(&self) -> Result<(), StoreError> {
        let mut state = self.state();
        state.is_running = true;
        state.last_started_at = Some((self.clock)());
        self.save(&state)
    }

    /// Ends the run and re-arms the cooldown clock.
    pub fn record_pipeline_complete(&self) -> Result<(), StoreError> {
        let mut state = self.state();
        state.is_running = false;
        state.last_completed_at = Some((self.clock)());
        self.save(&state)
    }

    /// Unlocks without touching the cooldown clock; used for failed runs.
    pub fn manual_clear_running(&self) -> Result<(), StoreError> {
        let mut state = self.state();
        state.is_running = false;
        self.save(&state)
    }

    /// Countdown to the end of the cooldown window, or `"now"`.
    pub fn format_remaining_time(&self) -> String {
        let now = (self.clock)();
        match self.next_available(&self.state(), now) {
            Some(next) => format_remaining(next - now),
            None => "now".to_string(),
        }
    }

    fn next_available(&self, state: &RateLimitState, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let next = state.last_completed_at? + self.cooldown;
        (next > now).then_some(next)
    }

    fn save(&self, state: &RateLimitState) -> Result<(), StoreError> {
        let raw = serde_json::to_string(state).map_err(|err| StoreError::Corrupt {
            key: RATE_LIMIT_KEY.to_string(),
            message: err.to_string(),
        })?;
        self.store.set(RATE_LIMIT_KEY, &raw)
    }
}

fn format_remaining(remaining: Duration) -> String {
    // Round partial seconds up so "0s" never shows while still blocked.
    let secs = (remaining.num_milliseconds().max(0) + 999) / 1000;
    if secs >= 60 {
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else {
        format!("{secs}s")
    }
}
