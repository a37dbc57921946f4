use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::CONTENT_DISPOSITION;
use reqwest::{RequestBuilder, Response, StatusCode};
use roundup_core::KeywordSet;
use roundup_logging::{roundup_debug, roundup_info};
use serde_json::{json, Value};

use crate::session::SessionManager;
use crate::types::{RawArtifact, RawLatestResult};
use crate::{
    ApiError, ArtifactInfo, DownloadedArtifact, FailureKind, LatestResult, StatusReport,
    TriggerResponse,
};

/// Filename used when the download carries no usable `Content-Disposition`.
pub const DEFAULT_ARTIFACT_FILENAME: &str = "roundup.pdf";

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub base_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub max_artifact_bytes: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            max_artifact_bytes: 64 * 1024 * 1024,
        }
    }
}

impl ClientSettings {
    /// Joins `path` onto the base URL, validating the result.
    pub(crate) fn endpoint(&self, path: &str) -> Result<reqwest::Url, ApiError> {
        let raw = format!("{}{}", self.base_url.trim_end_matches('/'), path);
        reqwest::Url::parse(&raw).map_err(|err| ApiError::new(FailureKind::InvalidUrl, err.to_string()))
    }
}

pub(crate) fn build_http_client(settings: &ClientSettings) -> Result<reqwest::Client, ApiError> {
    reqwest::Client::builder()
        .connect_timeout(settings.connect_timeout)
        .timeout(settings.request_timeout)
        .build()
        .map_err(|err| ApiError::new(FailureKind::Network, err.to_string()))
}

/// Authenticated operations on the pipeline backend that the run
/// orchestration depends on.
#[async_trait::async_trait]
pub trait PipelineApi: Send + Sync {
    async fn trigger(&self, keywords: &KeywordSet) -> Result<TriggerResponse, ApiError>;

    async fn run_status(&self) -> Result<StatusReport, ApiError>;

    /// `Ok(None)` when no successful run has produced an artifact yet.
    async fn latest_artifact(&self) -> Result<Option<ArtifactInfo>, ApiError>;
}

/// reqwest-backed client. Every call carries the session's headers, and any
/// 401 tears the session down before the error is returned.
pub struct ReqwestPipelineClient {
    http: reqwest::Client,
    settings: ClientSettings,
    session: Arc<SessionManager>,
}

impl ReqwestPipelineClient {
    pub fn new(settings: ClientSettings, session: Arc<SessionManager>) -> Result<Self, ApiError> {
        settings.endpoint("/")?;
        let http = build_http_client(&settings)?;
        Ok(Self {
            http,
            settings,
            session,
        })
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    /// `GET /pipeline/status` reduced to "is a job still in flight".
    pub async fn is_run_active(&self) -> Result<bool, ApiError> {
        Ok(self.run_status().await?.is_run_active())
    }

    pub async fn latest_result(&self) -> Result<LatestResult, ApiError> {
        let url = self.settings.endpoint("/pipeline/latest-result")?;
        let response = self.send(self.http.get(url)).await?;
        let response = ensure_success(response).await?;
        let raw: RawLatestResult = decode_json(response).await?;
        Ok(raw.into_result())
    }

    /// Streams the latest artifact into memory, bounded by `max_artifact_bytes`.
    pub async fn download_latest_artifact(&self) -> Result<Option<DownloadedArtifact>, ApiError> {
        let url = self.settings.endpoint("/pipeline/download-latest-artifact")?;
        let response = self.send(self.http.get(url)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = ensure_success(response).await?;

        let max_bytes = self.settings.max_artifact_bytes;
        if let Some(content_len) = response.content_length() {
            if content_len > max_bytes {
                return Err(ApiError::new(
                    FailureKind::TooLarge {
                        max_bytes,
                        actual: Some(content_len),
                    },
                    "artifact too large",
                ));
            }
        }

        let filename = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .and_then(filename_from_disposition)
            .unwrap_or_else(|| DEFAULT_ARTIFACT_FILENAME.to_string());

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = bytes.len() as u64 + chunk.len() as u64;
            if next_len > max_bytes {
                return Err(ApiError::new(
                    FailureKind::TooLarge {
                        max_bytes,
                        actual: Some(next_len),
                    },
                    "artifact too large",
                ));
            }
            bytes.extend_from_slice(&chunk);
        }

        roundup_info!("Downloaded artifact {} ({} bytes)", filename, bytes.len());
        Ok(Some(DownloadedArtifact { filename, bytes }))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let response = request
            .headers(self.session.headers())
            .send()
            .await
            .map_err(map_reqwest_error)?;

        if response.status() == StatusCode::UNAUTHORIZED {
            let message = error_detail(response).await;
            self.session.handle_unauthorized();
            return Err(ApiError::new(FailureKind::Unauthorized, message));
        }
        Ok(response)
    }
}

#[async_trait::async_trait]
impl PipelineApi for ReqwestPipelineClient {
    async fn trigger(&self, keywords: &KeywordSet) -> Result<TriggerResponse, ApiError> {
        let url = self.settings.endpoint("/pipeline/trigger")?;
        roundup_debug!("Triggering pipeline with {} keyword(s)", keywords.len());
        let body = json!({ "keywords": keywords });
        let response = self.send(self.http.post(url).json(&body)).await?;
        let response = ensure_success(response).await?;
        decode_json(response).await
    }

    async fn run_status(&self) -> Result<StatusReport, ApiError> {
        let url = self.settings.endpoint("/pipeline/status")?;
        let response = self.send(self.http.get(url)).await?;
        let response = ensure_success(response).await?;
        decode_json(response).await
    }

    async fn latest_artifact(&self) -> Result<Option<ArtifactInfo>, ApiError> {
        let url = self.settings.endpoint("/pipeline/latest-artifact")?;
        let response = self.send(self.http.get(url)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = ensure_success(response).await?;
        let raw: RawArtifact = decode_json(response).await?;
        Ok(raw.into_artifact())
    }
}

pub(crate) async fn ensure_success(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let kind = match status {
        StatusCode::UNAUTHORIZED => FailureKind::Unauthorized,
        StatusCode::NOT_FOUND => FailureKind::NotFound,
        other => FailureKind::HttpStatus(other.as_u16()),
    };
    Err(ApiError::new(kind, error_detail(response).await))
}

pub(crate) async fn decode_json<T: serde::de::DeserializeOwned>(
    response: Response,
) -> Result<T, ApiError> {
    let bytes = response.bytes().await.map_err(map_reqwest_error)?;
    serde_json::from_slice(&bytes).map_err(|err| ApiError::new(FailureKind::Decode, err.to_string()))
}

/// Message for a non-2xx response: the body's `detail`, else `error`, else
/// `HTTP <status>`.
pub(crate) async fn error_detail(response: Response) -> String {
    let status = response.status();
    let body = response.bytes().await.unwrap_or_default();
    let value: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    detail_from_body(&value).unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
}

fn detail_from_body(value: &Value) -> Option<String> {
    ["detail", "error"].iter().find_map(|key| match value.get(key)? {
        Value::Null => None,
        Value::String(text) if text.is_empty() => None,
        Value::String(text) => Some(text.clone()),
        // FastAPI validation errors arrive as a list of objects.
        other => Some(other.to_string()),
    })
}

pub(crate) fn map_reqwest_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        return ApiError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_decode() {
        return ApiError::new(FailureKind::Decode, err.to_string());
    }
    ApiError::new(FailureKind::Network, err.to_string())
}

/// Extracts a safe bare filename from a `Content-Disposition` value.
fn filename_from_disposition(value: &str) -> Option<String> {
    let raw = value.split(';').map(str::trim).find_map(|part| {
        let (key, val) = part.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("filename")
            .then(|| val.trim().trim_matches('"'))
    })?;
    let name = raw.rsplit(['/', '\\']).next()?.trim();
    if name.is_empty() || name == "." || name == ".." {
        return None;
    }
    Some(name.to_string())
}
