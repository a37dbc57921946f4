use std::fmt;

use roundup_core::{map_status, RunState};
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ApiError {
    pub kind: FailureKind,
    pub message: String,
}

impl ApiError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.kind == FailureKind::Unauthorized
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    Timeout,
    Network,
    Unauthorized,
    NotFound,
    HttpStatus(u16),
    Decode,
    Storage,
    TooLarge { max_bytes: u64, actual: Option<u64> },
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Network => write!(f, "network error"),
            FailureKind::Unauthorized => write!(f, "unauthorized"),
            FailureKind::NotFound => write!(f, "not found"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Decode => write!(f, "invalid response body"),
            FailureKind::Storage => write!(f, "storage error"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
        }
    }
}

/// Body of a successful `POST /pipeline/trigger`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TriggerResponse {
    pub ok: Option<bool>,
    /// `queued`, or `already_running` when the backend folded the request into an active run.
    pub state: Option<String>,
    pub message: Option<String>,
    pub queued_requests: Option<u32>,
    pub active_run_id: Option<u64>,
}

impl TriggerResponse {
    pub fn is_already_running(&self) -> bool {
        self.state.as_deref() == Some("already_running")
    }
}

/// Body of `GET /pipeline/status`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatusReport {
    pub status: String,
    pub conclusion: Option<String>,
    pub run_id: Option<u64>,
    pub queued_requests: Option<u32>,
    pub last_triggered_at: Option<i64>,
    pub last_updated_at: Option<i64>,
    pub last_error: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl StatusReport {
    pub fn new(status: impl Into<String>, conclusion: Option<&str>) -> Self {
        Self {
            status: status.into(),
            conclusion: conclusion.map(ToOwned::to_owned),
            ..Self::default()
        }
    }

    pub fn run_state(&self) -> RunState {
        map_status(&self.status, self.conclusion.as_deref())
    }

    /// Whether the backend reports a job that has not finished yet.
    pub fn is_run_active(&self) -> bool {
        matches!(self.status.as_str(), "queued" | "in_progress" | "running")
    }
}

/// Where the most recent successful run's output can be fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactInfo {
    pub download_url: String,
    pub name: Option<String>,
    pub created_at: Option<String>,
    pub run_number: Option<u64>,
    pub run_url: Option<String>,
}

/// Wire shape of the artifact description; `downloadURL` is `null` when
/// no successful run has produced one yet.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct RawArtifact {
    #[serde(rename = "downloadURL")]
    download_url: Option<String>,
    name: Option<String>,
    created_at: Option<String>,
    run_number: Option<u64>,
    run_url: Option<String>,
}

impl RawArtifact {
    pub(crate) fn into_artifact(self) -> Option<ArtifactInfo> {
        let download_url = self.download_url.filter(|url| !url.is_empty())?;
        Some(ArtifactInfo {
            download_url,
            name: self.name,
            created_at: self.created_at,
            run_number: self.run_number,
            run_url: self.run_url,
        })
    }
}

/// Body of `GET /pipeline/latest-result`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestResult {
    pub status: String,
    pub conclusion: Option<String>,
    pub run_id: Option<u64>,
    pub updated_at: Option<String>,
    pub artifact: Option<ArtifactInfo>,
}

impl LatestResult {
    pub fn run_state(&self) -> RunState {
        map_status(&self.status, self.conclusion.as_deref())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct RawLatestResult {
    pub(crate) status: Option<String>,
    pub(crate) conclusion: Option<String>,
    pub(crate) run_id: Option<u64>,
    pub(crate) updated_at: Option<String>,
    pub(crate) artifact: Option<RawArtifact>,
}

impl RawLatestResult {
    pub(crate) fn into_result(self) -> LatestResult {
        LatestResult {
            status: self.status.unwrap_or_default(),
            conclusion: self.conclusion,
            run_id: self.run_id,
            updated_at: self.updated_at,
            artifact: self.artifact.and_then(RawArtifact::into_artifact),
        }
    }
}

/// Binary artifact body plus the filename the server suggested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedArtifact {
    pub filename: String,
    pub bytes: Vec<u8>,
}
