// SPDX-License-Identifier: MIT

//! Provider adapters.
//!
//! One adapter per external provider; each knows its provider's OAuth and
//! resource endpoints and decodes provider JSON into the internal
//! `ProviderWorkout` shape at the boundary. Adapters are explicitly
//! constructed and injected through the registry so tests can substitute
//! fakes without network access.

pub mod strava;
pub mod whoop;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use hmac::{Hmac, Mac};
use serde::de::DeserializeOwned;
use sha2::Sha256;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::{Provider, ProviderWorkout, RecoveryMetrics, WebhookEvent};

pub use strava::StravaAdapter;
pub use whoop::WhoopAdapter;

/// Bound on every outbound provider call; a timeout is handled like any
/// other provider-request failure.
const PROVIDER_TIMEOUT_SECS: u64 = 10;

/// Token pair returned by an OAuth code exchange or refresh.
#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: String,
    /// Lifetime of the access token in seconds from now
    pub expires_in: i64,
}

/// Adapter surface implemented once per provider.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn provider(&self) -> Provider;

    /// Build the browser authorization URL carrying an opaque state value.
    fn authorization_url(&self, redirect_uri: &str, state: &str) -> String;

    /// Exchange an authorization code for a token pair.
    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<TokenGrant>;

    /// Exchange a refresh token for a fresh token pair.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant>;

    /// Best-effort remote revocation on disconnect.
    async fn revoke(&self, access_token: &str) -> Result<()>;

    /// Fetch the provider's identifier for the authorized user.
    async fn fetch_profile(&self, access_token: &str) -> Result<String>;

    /// Fetch workouts in [start, end]. A 404 from the provider means "no
    /// data for this window" and yields an empty list.
    async fn fetch_workouts(
        &self,
        access_token: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ProviderWorkout>>;

    /// Latest recovery metrics for a day, when the provider has any.
    async fn fetch_latest_recovery(
        &self,
        _access_token: &str,
        _day: NaiveDate,
    ) -> Result<Option<RecoveryMetrics>> {
        Ok(None)
    }

    /// Header the provider puts its webhook signature in.
    fn signature_header(&self) -> &'static str;

    /// Verify an HMAC-SHA256 webhook signature over the raw payload bytes.
    fn verify_webhook_signature(&self, raw_payload: &[u8], signature: &str, secret: &str)
        -> bool;

    /// Decode a raw webhook payload into a classified event.
    fn parse_webhook(&self, raw_payload: &[u8]) -> Result<WebhookEvent>;
}

/// Registry of constructed adapters, shared via `AppState`.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    adapters: HashMap<Provider, Arc<dyn ProviderAdapter>>,
}

impl ProviderRegistry {
    pub fn new(adapters: Vec<Arc<dyn ProviderAdapter>>) -> Self {
        Self {
            adapters: adapters.into_iter().map(|a| (a.provider(), a)).collect(),
        }
    }

    /// Build the production registry from configured OAuth credentials.
    pub fn from_config(config: &Config) -> Self {
        Self::new(vec![
            Arc::new(WhoopAdapter::new(
                config.whoop_client_id.clone(),
                config.whoop_client_secret.clone(),
            )),
            Arc::new(StravaAdapter::new(
                config.strava_client_id.clone(),
                config.strava_client_secret.clone(),
            )),
        ])
    }

    pub fn get(&self, provider: Provider) -> Result<Arc<dyn ProviderAdapter>> {
        self.adapters
            .get(&provider)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("No adapter for provider {}", provider)))
    }
}

// ─── Shared HTTP plumbing ────────────────────────────────────────

/// Build the reqwest client used by adapters (bounded timeout).
pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(PROVIDER_TIMEOUT_SECS))
        .build()
        .expect("failed to build HTTP client")
}

/// Map a transport-level error (connect failure, timeout) to a typed
/// provider-request failure with no status.
pub(crate) fn transport_err(provider: Provider, e: reqwest::Error) -> AppError {
    AppError::ProviderRequest {
        provider,
        status: None,
        message: e.to_string(),
    }
}

/// Check status and parse the JSON body, surfacing non-2xx as a typed error
/// carrying the HTTP status.
pub(crate) async fn check_response_json<T: DeserializeOwned>(
    provider: Provider,
    response: reqwest::Response,
) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AppError::ProviderRequest {
            provider,
            status: Some(status.as_u16()),
            message: format!("HTTP {}: {}", status, body),
        });
    }

    response.json().await.map_err(|e| AppError::ProviderRequest {
        provider,
        status: None,
        message: format!("JSON parse error: {}", e),
    })
}

// ─── Webhook signature helpers ───────────────────────────────────

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 over the raw payload bytes.
pub(crate) fn hmac_sha256(secret: &str, payload: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(payload);
    mac.finalize().into_bytes().to_vec()
}

/// Constant-time equality; never a short-circuiting comparison.
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    use subtle::ConstantTimeEq;
    a.ct_eq(b).into()
}
