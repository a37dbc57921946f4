mod support;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use pretty_assertions::assert_eq;
use roundup_core::{RunState, RUN_FAILED_MESSAGE};
use roundup_engine::{PollSettings, RunListener, RunStatusPoller};
use support::{network_blip, status, ScriptedApi};
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Seen {
    Progress(RunState),
    Success,
    Failure(String),
}

struct RecordingListener {
    tx: mpsc::UnboundedSender<Seen>,
}

#[async_trait::async_trait]
impl RunListener for RecordingListener {
    async fn on_progress(&self, state: RunState) {
        let _ = self.tx.send(Seen::Progress(state));
    }

    async fn on_success(&self) {
        let _ = self.tx.send(Seen::Success);
    }

    async fn on_failure(&self, message: String) {
        let _ = self.tx.send(Seen::Failure(message));
    }
}

fn listener() -> (Arc<RecordingListener>, mpsc::UnboundedReceiver<Seen>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Arc::new(RecordingListener { tx }), rx)
}

fn poller(api: Arc<ScriptedApi>) -> RunStatusPoller {
    RunStatusPoller::new(api, PollSettings::default())
}

/// Collects callbacks until the first terminal one.
async fn until_terminal(rx: &mut mpsc::UnboundedReceiver<Seen>) -> Vec<Seen> {
    let mut seen = Vec::new();
    loop {
        let next = timeout(Duration::from_secs(600), rx.recv())
            .await
            .expect("terminal callback in time")
            .expect("listener alive");
        let terminal = !matches!(next, Seen::Progress(_));
        seen.push(next);
        if terminal {
            return seen;
        }
    }
}

#[tokio::test(start_paused = true)]
async fn tracks_run_through_to_success() {
    let api = Arc::new(ScriptedApi::new().with_statuses([
        status("queued", None),
        status("in_progress", None),
        status("completed", Some("success")),
    ]));
    let poller = poller(api.clone());
    let (listener, mut rx) = listener();

    poller.start(listener);
    assert!(poller.is_polling());
    assert_eq!(poller.state(), RunState::Queued);

    let seen = until_terminal(&mut rx).await;
    assert_eq!(
        seen,
        vec![
            Seen::Progress(RunState::Queued),
            Seen::Progress(RunState::Running),
            Seen::Success,
        ]
    );
    assert_eq!(api.status_calls(), 3);
    assert_eq!(poller.state(), RunState::Success);
    assert!(!poller.is_polling());

    // No further requests once terminal.
    sleep(Duration::from_secs(120)).await;
    assert_eq!(api.status_calls(), 3);
    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn first_request_waits_one_interval() {
    let api = Arc::new(ScriptedApi::new());
    let poller = poller(api.clone());
    let (listener, _rx) = listener();

    poller.start(listener);
    sleep(Duration::from_secs(9)).await;
    assert_eq!(api.status_calls(), 0);
    sleep(Duration::from_secs(2)).await;
    assert_eq!(api.status_calls(), 1);
    sleep(Duration::from_secs(10)).await;
    assert_eq!(api.status_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn transient_errors_do_not_change_state() {
    let api = Arc::new(ScriptedApi::new().with_statuses([
        network_blip(),
        network_blip(),
        status("completed", Some("success")),
    ]));
    let poller = poller(api.clone());
    let (listener, mut rx) = listener();

    poller.start(listener);
    sleep(Duration::from_secs(25)).await;
    assert_eq!(api.status_calls(), 2);
    assert_eq!(poller.state(), RunState::Queued);
    assert!(poller.is_polling());

    let seen = until_terminal(&mut rx).await;
    assert_eq!(seen, vec![Seen::Success]);
    assert_eq!(poller.state(), RunState::Success);
}

#[tokio::test(start_paused = true)]
async fn remote_failure_sets_fixed_message() {
    let api = Arc::new(ScriptedApi::new().with_statuses([
        status("in_progress", None),
        status("completed", Some("timed_out")),
    ]));
    let poller = poller(api.clone());
    let (listener, mut rx) = listener();

    poller.start(listener);
    let seen = until_terminal(&mut rx).await;

    assert_eq!(
        seen,
        vec![
            Seen::Progress(RunState::Running),
            Seen::Failure(RUN_FAILED_MESSAGE.to_string()),
        ]
    );
    assert_eq!(poller.state(), RunState::Failed);
    assert_eq!(poller.error_message().as_deref(), Some(RUN_FAILED_MESSAGE));
    assert!(!poller.is_polling());
}

#[tokio::test(start_paused = true)]
async fn restart_cancels_previous_loop() {
    let api = Arc::new(ScriptedApi::new().with_statuses([status("completed", Some("success"))]));
    let poller = poller(api.clone());
    let (first, mut first_rx) = listener();
    let (second, mut second_rx) = listener();

    poller.start(first);
    poller.start(second);

    assert_eq!(until_terminal(&mut second_rx).await, vec![Seen::Success]);
    sleep(Duration::from_secs(60)).await;
    assert_eq!(api.status_calls(), 1);
    assert!(first_rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn stop_is_idempotent_and_safe_before_start() {
    let api = Arc::new(ScriptedApi::new());
    let poller = poller(api.clone());

    poller.stop();
    poller.stop();
    assert!(!poller.is_polling());
    assert_eq!(poller.state(), RunState::Idle);

    let (listener, mut rx) = listener();
    poller.start(listener);
    assert_eq!(
        rx.recv().await,
        Some(Seen::Progress(RunState::Running))
    );
    poller.stop();
    poller.stop();

    sleep(Duration::from_secs(60)).await;
    assert_eq!(api.status_calls(), 1);
    assert!(!poller.is_polling());
}

#[tokio::test(start_paused = true)]
async fn reset_returns_to_idle() {
    let api = Arc::new(ScriptedApi::new().with_statuses([status("completed", Some("failure"))]));
    let poller = poller(api);
    let (listener, mut rx) = listener();

    poller.start(listener);
    until_terminal(&mut rx).await;
    assert_eq!(poller.state(), RunState::Failed);

    poller.reset();
    assert_eq!(poller.state(), RunState::Idle);
    assert_eq!(poller.error_message(), None);
}

/// Reports whether the poller still counted as active when the terminal
/// callback ran.
struct StopCheckListener {
    poller: Mutex<Option<Arc<RunStatusPoller>>>,
    tx: mpsc::UnboundedSender<bool>,
}

#[async_trait::async_trait]
impl RunListener for StopCheckListener {
    async fn on_success(&self) {
        let polling = self
            .poller
            .lock()
            .unwrap()
            .as_ref()
            .map(|poller| poller.is_polling())
            .unwrap_or(true);
        let _ = self.tx.send(polling);
    }

    async fn on_failure(&self, _message: String) {}
}

#[tokio::test(start_paused = true)]
async fn loop_is_stopped_before_terminal_callback() {
    let api = Arc::new(ScriptedApi::new().with_statuses([status("success", None)]));
    let poller = Arc::new(poller(api));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let listener = Arc::new(StopCheckListener {
        poller: Mutex::new(Some(poller.clone())),
        tx,
    });

    poller.start(listener.clone());
    let polling_during_callback = rx.recv().await.expect("callback fired");
    assert!(!polling_during_callback);

    listener.poller.lock().unwrap().take();
}

#[tokio::test(start_paused = true)]
async fn stop_after_restart_cancels_the_live_loop() {
    let api = Arc::new(ScriptedApi::new());
    let poller = poller(api.clone());
    let (first, _first_rx) = listener();
    let (second, _second_rx) = listener();

    poller.start(first);
    poller.start(second);
    assert!(poller.is_polling());
    poller.stop();
    assert!(!poller.is_polling());

    sleep(Duration::from_secs(60)).await;
    assert_eq!(api.status_calls(), 0);
}
