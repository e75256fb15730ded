// rewards-core/src/remote.rs
//! Client for the remote status, verification and phone webhooks.
//!
//! Every response crosses a parsing boundary that maps the payload onto a
//! tagged result. Shapes we do not understand become `Unrecognized`; they
//! are logged and never raised.

use async_trait::async_trait;
use common::config::RemoteConfig;
use common::messages::{PhoneAssociation, StatusFeedEntry, UserRequest, VerificationRequest};
use common::models::Platform;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::error::RemoteError;

/// Platforms the remote service reports as already verified
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusFeed {
    /// Raw action names; empty when the user has none
    Actions(Vec<String>),
    Unrecognized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationOutcome {
    Verified,
    NotVerified,
    Unrecognized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhoneLookup {
    Found,
    NotFound,
    Unrecognized,
}

/// Remote services the rewards flows depend on
#[async_trait]
pub trait RewardsApi: Send + Sync {
    async fn fetch_status(&self, user_id: u64) -> Result<StatusFeed, RemoteError>;

    async fn verify(
        &self,
        platform: Platform,
        user_id: u64,
        image_url: &str,
    ) -> Result<VerificationOutcome, RemoteError>;

    async fn lookup_phone(&self, user_id: u64) -> Result<PhoneLookup, RemoteError>;

    async fn associate_phone(&self, user_id: u64, phone: &str) -> Result<(), RemoteError>;
}

/// Webhooks frequently wrap a single object in an array
fn unwrap_single(body: &Value) -> &Value {
    match body {
        Value::Array(items) if items.len() == 1 => &items[0],
        other => other,
    }
}

pub fn parse_status_feed(body: &Value) -> StatusFeed {
    match body {
        Value::Array(entries) => StatusFeed::Actions(
            entries
                .iter()
                .filter_map(|entry| StatusFeedEntry::deserialize(entry).ok())
                .filter_map(|entry| match entry.action_type {
                    Some(Value::String(action)) => Some(action.trim().to_string()),
                    _ => None,
                })
                .filter(|action| !action.is_empty())
                .collect(),
        ),
        other => {
            tracing::warn!("Unrecognized status feed payload: {}", other);
            StatusFeed::Unrecognized
        }
    }
}

pub fn parse_verification(platform: Platform, body: &Value) -> VerificationOutcome {
    let key = format!("{}_page", platform);
    match unwrap_single(body).get(&key).and_then(Value::as_str) {
        Some("liked") | Some("followed") => VerificationOutcome::Verified,
        Some("not-followed") => VerificationOutcome::NotVerified,
        _ => {
            tracing::warn!("Unrecognized verification payload for {}: {}", platform, body);
            VerificationOutcome::Unrecognized
        }
    }
}

pub fn parse_phone_lookup(body: &Value) -> PhoneLookup {
    match unwrap_single(body).get("phone_number").and_then(Value::as_str) {
        Some("found") => PhoneLookup::Found,
        Some("not-found") => PhoneLookup::NotFound,
        _ => {
            tracing::warn!("Unrecognized phone lookup payload: {}", body);
            PhoneLookup::Unrecognized
        }
    }
}

/// `RewardsApi` over HTTP
pub struct HttpRewardsApi {
    http: reqwest::Client,
    config: RemoteConfig,
}

impl HttpRewardsApi {
    pub fn new(config: RemoteConfig) -> Result<Self, RemoteError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| RemoteError::Transport {
                operation: "client setup",
                detail: e.to_string(),
            })?;
        Ok(Self { http, config })
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        operation: &'static str,
        url: String,
        body: &B,
    ) -> Result<reqwest::Response, RemoteError> {
        let mut request = self.http.post(url).json(body);
        if let Some(auth) = &self.config.auth_header {
            request = request.header("Auth", auth);
        }

        let response = request.send().await.map_err(|e| RemoteError::Transport {
            operation,
            detail: e.to_string(),
        })?;

        if !response.status().is_success() {
            return Err(RemoteError::Status {
                operation,
                status: response.status().as_u16(),
            });
        }
        Ok(response)
    }

    async fn post_json<B: Serialize + ?Sized>(
        &self,
        operation: &'static str,
        url: String,
        body: &B,
    ) -> Result<Value, RemoteError> {
        self.post(operation, url, body)
            .await?
            .json::<Value>()
            .await
            .map_err(|e| RemoteError::Decode {
                operation,
                detail: e.to_string(),
            })
    }
}

#[async_trait]
impl RewardsApi for HttpRewardsApi {
    async fn fetch_status(&self, user_id: u64) -> Result<StatusFeed, RemoteError> {
        let url = self.endpoint(&self.config.status_path);
        match self.post_json("status feed", url, &UserRequest { user_id }).await {
            Ok(body) => Ok(parse_status_feed(&body)),
            // A body that is not JSON at all is garbled, not a transport failure
            Err(RemoteError::Decode { detail, .. }) => {
                tracing::warn!("Status feed body was not JSON: {}", detail);
                Ok(StatusFeed::Unrecognized)
            }
            Err(e) => Err(e),
        }
    }

    async fn verify(
        &self,
        platform: Platform,
        user_id: u64,
        image_url: &str,
    ) -> Result<VerificationOutcome, RemoteError> {
        let url = self.endpoint(platform.as_str());
        let request = VerificationRequest {
            user_id,
            image_url: image_url.to_string(),
        };
        match self.post_json("verification", url, &request).await {
            Ok(body) => Ok(parse_verification(platform, &body)),
            Err(RemoteError::Decode { .. }) => Ok(VerificationOutcome::Unrecognized),
            Err(e) => Err(e),
        }
    }

    async fn lookup_phone(&self, user_id: u64) -> Result<PhoneLookup, RemoteError> {
        let url = self.endpoint(&self.config.phone_lookup_path);
        match self.post_json("phone lookup", url, &UserRequest { user_id }).await {
            Ok(body) => Ok(parse_phone_lookup(&body)),
            Err(RemoteError::Decode { .. }) => Ok(PhoneLookup::Unrecognized),
            Err(e) => Err(e),
        }
    }

    async fn associate_phone(&self, user_id: u64, phone: &str) -> Result<(), RemoteError> {
        let url = self.endpoint(&self.config.phone_insert_path);
        let association = PhoneAssociation {
            user_id,
            phone: phone.to_string(),
        };
        self.post("phone association", url, &association).await?;
        Ok(())
    }
}
