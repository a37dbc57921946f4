//! Drives the pure run lifecycle in `roundup_core` against the real world.
//!
//! Every input becomes a `Msg`, `update` decides, and the effects it returns
//! are executed here in order. Asynchronous outcomes (poll results, session
//! expiry) are reported on the `RunEvent` channel handed out by `new`.

use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use roundup_core::{
    update, Effect, KeywordSet, Msg, RateLimiter, RunError, RunState, RunViewModel, RunnerState,
    StoreError,
};
use roundup_logging::{roundup_debug, roundup_error, roundup_info, roundup_warn};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::poller::{PollSettings, RunListener, RunStatusPoller};
use crate::session::{SessionEvent, SessionManager};
use crate::{ApiError, ArtifactInfo, PipelineApi};

const TRIGGER_FALLBACK_MESSAGE: &str = "Failed to trigger pipeline.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    StateChanged(RunState),
    /// The run succeeded; `artifact` is `None` if none could be found.
    Succeeded { artifact: Option<ArtifactInfo> },
    Failed { message: String },
    SessionExpired,
}

/// Returned when the backend accepted a trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerReceipt {
    /// The backend folded this request into a run that was already active.
    pub already_running: bool,
    pub message: Option<String>,
    pub keywords: KeywordSet,
}

pub struct Orchestrator {
    inner: Arc<OrchestratorInner>,
}

struct OrchestratorInner {
    api: Arc<dyn PipelineApi>,
    limiter: RateLimiter,
    poller: RunStatusPoller,
    state: Mutex<RunnerState>,
    events: mpsc::UnboundedSender<RunEvent>,
    shutdown: CancellationToken,
}

impl Orchestrator {
    pub fn new(
        api: Arc<dyn PipelineApi>,
        limiter: RateLimiter,
        poll_settings: PollSettings,
    ) -> (Self, mpsc::UnboundedReceiver<RunEvent>) {
        let (events, event_rx) = mpsc::unbounded_channel();
        let inner = OrchestratorInner {
            poller: RunStatusPoller::new(api.clone(), poll_settings),
            api,
            limiter,
            state: Mutex::new(RunnerState::new()),
            events,
            shutdown: CancellationToken::new(),
        };
        (
            Self {
                inner: Arc::new(inner),
            },
            event_rx,
        )
    }

    /// Gate, validate, trigger, then start polling.
    ///
    /// Rate-limit and keyword failures return before any network call. A
    /// rejected trigger leaves the rate limiter untouched.
    pub async fn trigger_run(&self, keywords_input: &str) -> Result<TriggerReceipt, RunError> {
        let inner = &self.inner;
        inner.dispatch(Msg::KeywordsChanged(keywords_input.to_string()));

        let gate = inner.limiter.can_run_pipeline();
        let effects = inner.dispatch(Msg::RunRequested { gate });
        let Some(keywords) = inner.execute(effects).await? else {
            return Err(RunError::TriggerRejected(
                TRIGGER_FALLBACK_MESSAGE.to_string(),
            ));
        };

        match inner.api.trigger(&keywords).await {
            Ok(response) => {
                roundup_info!(
                    "Pipeline trigger accepted ({} keyword(s), state {:?})",
                    keywords.len(),
                    response.state
                );
                let effects = inner.dispatch(Msg::TriggerAccepted);
                inner.execute(effects).await?;
                Ok(TriggerReceipt {
                    already_running: response.is_already_running(),
                    message: response.message,
                    keywords,
                })
            }
            Err(err) => {
                roundup_warn!("Pipeline trigger failed: {}", err);
                let error = trigger_error(err);
                let effects = inner.dispatch(Msg::TriggerFailed {
                    error: error.clone(),
                });
                inner.execute(effects).await?;
                Err(error)
            }
        }
    }

    /// Mirrors session expiry and re-login into the run state. The watcher
    /// ends when this orchestrator is dropped.
    pub fn watch_session(&self, session: &SessionManager) {
        let mut session_events = session.subscribe();
        let weak = Arc::downgrade(&self.inner);
        let shutdown = self.inner.shutdown.clone();

        tokio::spawn(async move {
            loop {
                let received = tokio::select! {
                    _ = shutdown.cancelled() => break,
                    received = session_events.recv() => received,
                };
                let Some(inner) = weak.upgrade() else { break };
                match received {
                    Ok(SessionEvent::Expired) => {
                        inner.dispatch(Msg::SessionExpired);
                        inner.emit(RunEvent::SessionExpired);
                    }
                    Ok(SessionEvent::LoggedIn) => {
                        inner.dispatch(Msg::SessionRestored);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        roundup_warn!("Missed {} session event(s)", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
    }

    /// Back to idle. Stops polling; the rate limiter is left as is.
    pub async fn reset(&self) {
        let effects = self.inner.dispatch(Msg::ResetClicked);
        if let Err(err) = self.inner.execute(effects).await {
            roundup_debug!("Reset reported {}", err);
        }
        self.inner.poller.reset();
    }

    pub fn set_keywords(&self, input: &str) {
        self.inner.dispatch(Msg::KeywordsChanged(input.to_string()));
    }

    pub fn view(&self) -> RunViewModel {
        self.inner.lock_state().view()
    }

    pub fn run_state(&self) -> RunState {
        self.inner.lock_state().run_state()
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.inner.limiter
    }

    pub fn is_polling(&self) -> bool {
        self.inner.poller.is_polling()
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.inner.poller.stop();
        self.inner.shutdown.cancel();
    }
}

impl OrchestratorInner {
    fn lock_state(&self) -> MutexGuard<'_, RunnerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn dispatch(&self, msg: Msg) -> Vec<Effect> {
        let (effects, changed) = {
            let mut state = self.lock_state();
            let before = state.run_state();
            let (next, effects) = update(mem::take(&mut *state), msg);
            *state = next;
            let after = state.run_state();
            (effects, (after != before).then_some(after))
        };
        if let Some(run_state) = changed {
            self.emit(RunEvent::StateChanged(run_state));
        }
        effects
    }

    fn emit(&self, event: RunEvent) {
        // Nobody listening is fine.
        let _ = self.events.send(event);
    }

    /// Runs effects in order. Returns the keywords of a requested trigger, or
    /// the error of a `ReportFailure`, which ends the batch.
    async fn execute(
        self: &Arc<Self>,
        effects: Vec<Effect>,
    ) -> Result<Option<KeywordSet>, RunError> {
        let mut trigger = None;
        for effect in effects {
            match effect {
                Effect::TriggerPipeline { keywords } => trigger = Some(keywords),
                Effect::RecordRunStart => {
                    log_store_error("record run start", self.limiter.record_pipeline_start())
                }
                Effect::StartPolling => {
                    let listener = Arc::new(OrchestratorListener {
                        inner: Arc::downgrade(self),
                    });
                    self.poller.start(listener);
                }
                Effect::StopPolling => self.poller.stop(),
                Effect::RecordRunComplete => log_store_error(
                    "record run completion",
                    self.limiter.record_pipeline_complete(),
                ),
                Effect::ClearRunning => {
                    log_store_error("clear running flag", self.limiter.manual_clear_running())
                }
                Effect::LoadResults => self.load_results().await,
                Effect::ReportFailure(error) => return Err(error),
            }
        }
        Ok(trigger)
    }

    async fn load_results(&self) {
        let artifact = match self.api.latest_artifact().await {
            Ok(artifact) => artifact,
            Err(err) => {
                roundup_warn!("Could not load latest artifact: {}", err);
                None
            }
        };
        self.emit(RunEvent::Succeeded { artifact });
    }
}

/// Poll callbacks routed back into the orchestrator. Holds a weak handle so a
/// live poll loop never keeps a dropped orchestrator alive.
struct OrchestratorListener {
    inner: Weak<OrchestratorInner>,
}

#[async_trait::async_trait]
impl RunListener for OrchestratorListener {
    async fn on_progress(&self, state: RunState) {
        if let Some(inner) = self.inner.upgrade() {
            inner.dispatch(Msg::RunProgressed(state));
        }
    }

    async fn on_success(&self) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };
        let effects = inner.dispatch(Msg::RunSucceeded);
        if let Err(err) = inner.execute(effects).await {
            roundup_error!("Unexpected failure after successful run: {}", err);
        }
    }

    async fn on_failure(&self, message: String) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };
        let effects = inner.dispatch(Msg::RunFailed { message });
        if let Err(err) = inner.execute(effects).await {
            inner.emit(RunEvent::Failed {
                message: err.to_string(),
            });
        }
    }
}

fn trigger_error(err: ApiError) -> RunError {
    if err.is_unauthorized() {
        return RunError::Unauthorized;
    }
    if err.message.trim().is_empty() {
        return RunError::TriggerRejected(TRIGGER_FALLBACK_MESSAGE.to_string());
    }
    RunError::TriggerRejected(err.message)
}

fn log_store_error(action: &str, result: Result<(), StoreError>) {
    if let Err(err) = result {
        roundup_error!("Could not {}: {}", action, err);
    }
}
