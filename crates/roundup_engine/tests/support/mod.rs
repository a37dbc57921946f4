#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use roundup_core::KeywordSet;
use roundup_engine::{
    ApiError, ArtifactInfo, FailureKind, PipelineApi, StatusReport, TriggerResponse,
};

/// In-process backend whose status answers are scripted per test. Once the
/// script runs out every poll reports `in_progress`.
pub struct ScriptedApi {
    statuses: Mutex<VecDeque<Result<StatusReport, ApiError>>>,
    trigger_result: Mutex<Result<TriggerResponse, ApiError>>,
    artifact: Option<ArtifactInfo>,
    status_calls: AtomicUsize,
    trigger_calls: AtomicUsize,
    triggered_with: Mutex<Vec<KeywordSet>>,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self {
            statuses: Mutex::new(VecDeque::new()),
            trigger_result: Mutex::new(Ok(TriggerResponse {
                ok: Some(true),
                state: Some("queued".to_string()),
                ..TriggerResponse::default()
            })),
            artifact: None,
            status_calls: AtomicUsize::new(0),
            trigger_calls: AtomicUsize::new(0),
            triggered_with: Mutex::new(Vec::new()),
        }
    }

    pub fn with_statuses(
        self,
        statuses: impl IntoIterator<Item = Result<StatusReport, ApiError>>,
    ) -> Self {
        self.statuses.lock().unwrap().extend(statuses);
        self
    }

    pub fn with_trigger_result(self, result: Result<TriggerResponse, ApiError>) -> Self {
        *self.trigger_result.lock().unwrap() = result;
        self
    }

    pub fn with_artifact(mut self, artifact: ArtifactInfo) -> Self {
        self.artifact = Some(artifact);
        self
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn trigger_calls(&self) -> usize {
        self.trigger_calls.load(Ordering::SeqCst)
    }

    pub fn triggered_with(&self) -> Vec<KeywordSet> {
        self.triggered_with.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl PipelineApi for ScriptedApi {
    async fn trigger(&self, keywords: &KeywordSet) -> Result<TriggerResponse, ApiError> {
        self.trigger_calls.fetch_add(1, Ordering::SeqCst);
        self.triggered_with.lock().unwrap().push(keywords.clone());
        self.trigger_result.lock().unwrap().clone()
    }

    async fn run_status(&self) -> Result<StatusReport, ApiError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        self.statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(StatusReport::new("in_progress", None)))
    }

    async fn latest_artifact(&self) -> Result<Option<ArtifactInfo>, ApiError> {
        Ok(self.artifact.clone())
    }
}

pub fn status(status: &str, conclusion: Option<&str>) -> Result<StatusReport, ApiError> {
    Ok(StatusReport::new(status, conclusion))
}

pub fn network_blip() -> Result<StatusReport, ApiError> {
    Err(api_error(FailureKind::Network, "connection reset"))
}

pub fn api_error(kind: FailureKind, message: &str) -> ApiError {
    ApiError {
        kind,
        message: message.to_string(),
    }
}

pub fn artifact(name: &str) -> ArtifactInfo {
    ArtifactInfo {
        download_url: format!("https://artifacts.example.com/{name}"),
        name: Some(name.to_string()),
        created_at: None,
        run_number: Some(7),
        run_url: None,
    }
}
