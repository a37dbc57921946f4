//! Bearer-credential lifecycle.
//!
//! The token lives in an injected (normally volatile) key-value store. Any
//! authenticated call that comes back `401` calls `handle_unauthorized`,
//! which drops the token and broadcasts `SessionEvent::Expired` to every
//! subscriber.

use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use roundup_core::{KeyValueStore, StoreError};
use roundup_logging::{roundup_info, roundup_warn};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::broadcast;

use crate::client::{build_http_client, decode_json, ensure_success, map_reqwest_error};
use crate::{ApiError, ClientSettings, FailureKind};

/// Volatile-store key holding the bearer token.
pub const TOKEN_KEY: &str = "access_token";

const EVENT_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    LoggedIn,
    /// A 401 cleared the token; consumers should fall back to logged-out.
    Expired,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    access_token: String,
}

pub struct SessionManager {
    store: Arc<dyn KeyValueStore>,
    http: reqwest::Client,
    settings: ClientSettings,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionManager {
    pub fn new(settings: ClientSettings, store: Arc<dyn KeyValueStore>) -> Result<Self, ApiError> {
        settings.endpoint("/")?;
        let http = build_http_client(&settings)?;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            store,
            http,
            settings,
            events,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn get_token(&self) -> Option<String> {
        match self.store.get(TOKEN_KEY) {
            Ok(token) => token.filter(|token| !token.is_empty()),
            Err(err) => {
                roundup_warn!("Could not read session token: {}", err);
                None
            }
        }
    }

    pub fn set_token(&self, token: &str) -> Result<(), StoreError> {
        self.store.set(TOKEN_KEY, token)
    }

    pub fn clear_token(&self) -> Result<(), StoreError> {
        self.store.remove(TOKEN_KEY)
    }

    pub fn is_authenticated(&self) -> bool {
        self.get_token().is_some()
    }

    /// JSON headers, plus `Authorization: Bearer` only when a token is held.
    pub fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        if let Some(token) = self.get_token() {
            match HeaderValue::from_str(&format!("Bearer {token}")) {
                Ok(mut value) => {
                    value.set_sensitive(true);
                    headers.insert(AUTHORIZATION, value);
                }
                Err(_) => roundup_warn!("Stored session token is not a valid header value"),
            }
        }
        headers
    }

    /// Exchanges a password for a token and stores it.
    pub async fn login(&self, password: &str) -> Result<(), ApiError> {
        let url = self.settings.endpoint("/auth/login")?;
        let response = self
            .http
            .post(url)
            .json(&json!({ "password": password }))
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let response = ensure_success(response).await?;
        let body: LoginResponse = decode_json(response).await?;

        self.set_token(&body.access_token)
            .map_err(|err| ApiError::new(FailureKind::Storage, err.to_string()))?;
        roundup_info!("Login succeeded");
        let _ = self.events.send(SessionEvent::LoggedIn);
        Ok(())
    }

    /// Operator-initiated sign-out; does not broadcast expiry.
    pub fn logout(&self) {
        if let Err(err) = self.clear_token() {
            roundup_warn!("Could not clear session token: {}", err);
        }
    }

    /// Tears the session down after a 401. Safe to call repeatedly; each
    /// call broadcasts exactly one `Expired`.
    pub fn handle_unauthorized(&self) {
        roundup_warn!("Backend answered 401; clearing session");
        if let Err(err) = self.clear_token() {
            roundup_warn!("Could not clear session token: {}", err);
        }
        // No subscribers is fine.
        let _ = self.events.send(SessionEvent::Expired);
    }
}
