//! Cancellable status-poll loop tracking one remote run to a terminal state.
//!
//! At most one loop is live per poller. Every `start` bumps a generation
//! counter and cancels the previous loop's token; a loop only writes state or
//! fires callbacks while its generation is still current.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use roundup_core::{RunState, RUN_FAILED_MESSAGE};
use roundup_logging::{roundup_debug, roundup_info, roundup_warn};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::PipelineApi;

#[derive(Debug, Clone)]
pub struct PollSettings {
    pub interval: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
        }
    }
}

/// Receives the outcome of a poll cycle. Terminal callbacks fire after the
/// loop has been cancelled, so they may safely start a new cycle.
#[async_trait::async_trait]
pub trait RunListener: Send + Sync {
    async fn on_progress(&self, _state: RunState) {}

    async fn on_success(&self);

    async fn on_failure(&self, message: String);
}

#[derive(Default)]
struct PollerShared {
    state: RunState,
    error_message: Option<String>,
    generation: u64,
    /// Token of the live loop, if any.
    active: Option<CancellationToken>,
}

impl PollerShared {
    fn cancel_active(&mut self) -> bool {
        match self.active.take() {
            Some(cancel) => {
                cancel.cancel();
                true
            }
            None => false,
        }
    }
}

pub struct RunStatusPoller {
    api: Arc<dyn PipelineApi>,
    settings: PollSettings,
    shared: Arc<Mutex<PollerShared>>,
}

impl RunStatusPoller {
    pub fn new(api: Arc<dyn PipelineApi>, settings: PollSettings) -> Self {
        Self {
            api,
            settings,
            shared: Arc::new(Mutex::new(PollerShared::default())),
        }
    }

    /// Cancels any running loop, then polls every `interval` until a terminal
    /// state or `stop`. The first request goes out one interval after start.
    pub fn start(&self, listener: Arc<dyn RunListener>) {
        let cancel = CancellationToken::new();
        let generation = {
            let mut shared = lock(&self.shared);
            if shared.cancel_active() {
                roundup_debug!("Replacing running poll loop");
            }
            shared.generation += 1;
            shared.state = RunState::Queued;
            shared.error_message = None;
            shared.active = Some(cancel.clone());
            shared.generation
        };

        roundup_info!(
            "Polling run status every {}s (cycle {})",
            self.settings.interval.as_secs(),
            generation
        );
        tokio::spawn(poll_loop(
            self.api.clone(),
            self.shared.clone(),
            listener,
            PollCycle {
                generation,
                cancel,
                interval: self.settings.interval,
            },
        ));
    }

    /// Idempotent; fine on a poller that never started.
    pub fn stop(&self) {
        if lock(&self.shared).cancel_active() {
            roundup_debug!("Polling stopped");
        }
    }

    /// Stops polling and forgets the last observed state.
    pub fn reset(&self) {
        let mut shared = lock(&self.shared);
        shared.cancel_active();
        shared.state = RunState::Idle;
        shared.error_message = None;
    }

    pub fn state(&self) -> RunState {
        lock(&self.shared).state
    }

    pub fn error_message(&self) -> Option<String> {
        lock(&self.shared).error_message.clone()
    }

    pub fn is_polling(&self) -> bool {
        lock(&self.shared).active.is_some()
    }
}

impl Drop for RunStatusPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

struct PollCycle {
    generation: u64,
    cancel: CancellationToken,
    interval: Duration,
}

async fn poll_loop(
    api: Arc<dyn PipelineApi>,
    shared: Arc<Mutex<PollerShared>>,
    listener: Arc<dyn RunListener>,
    cycle: PollCycle,
) {
    let PollCycle {
        generation,
        cancel,
        interval,
    } = cycle;
    let mut ticker = interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let report = tokio::select! {
            _ = cancel.cancelled() => break,
            report = api.run_status() => report,
        };
        let report = match report {
            Ok(report) => report,
            Err(err) => {
                // Not a run failure; try again next tick.
                roundup_warn!("Status poll failed ({}): {}", err.kind, err);
                continue;
            }
        };

        let next = report.run_state();
        {
            let mut shared = lock(&shared);
            if shared.generation != generation || cancel.is_cancelled() {
                break;
            }
            shared.state = next;
            if next.is_terminal() {
                // Stop before any callback so a callback can start a new cycle.
                shared.cancel_active();
                if next == RunState::Failed {
                    shared.error_message = Some(RUN_FAILED_MESSAGE.to_string());
                }
            }
        }

        match next {
            RunState::Success => {
                roundup_info!("Run finished successfully");
                listener.on_success().await;
                break;
            }
            RunState::Failed => {
                roundup_warn!(
                    "Run finished with status {} ({:?})",
                    report.status,
                    report.conclusion
                );
                listener.on_failure(RUN_FAILED_MESSAGE.to_string()).await;
                break;
            }
            other => {
                roundup_debug!("Run status {} -> {}", report.status, other);
                listener.on_progress(other).await;
            }
        }
    }
}

fn lock(shared: &Mutex<PollerShared>) -> MutexGuard<'_, PollerShared> {
    // State stays consistent across a panicking listener; keep going.
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}
