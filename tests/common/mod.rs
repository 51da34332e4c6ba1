// SPDX-License-Identifier: MIT

//! Shared test fixtures: an in-memory app with a scriptable provider adapter.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};

use fitsync::config::Config;
use fitsync::db::{MemoryStore, SyncStore};
use fitsync::error::{AppError, Result};
use fitsync::middleware::auth::create_jwt;
use fitsync::models::{
    ActivityType, IntegrationRecord, Provider, ProviderWorkout, RecoveryMetrics, WebhookEvent,
    WebhookEventKind,
};
use fitsync::providers::{ProviderAdapter, ProviderRegistry, TokenGrant};
use fitsync::routes::create_router;
use fitsync::AppState;

/// How the fake adapter answers a refresh call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(dead_code)]
pub enum RefreshBehavior {
    Succeed,
    /// Provider rejects the grant (401)
    Reject,
    /// Provider is down (503)
    Unavailable,
}

/// Scriptable in-process provider adapter. Signature scheme matches the
/// Whoop adapter (base64 HMAC-SHA256) so gateway tests exercise real
/// verification.
pub struct FakeAdapter {
    provider: Provider,
    external_user_id: String,
    workouts: Mutex<Vec<ProviderWorkout>>,
    recovery: Mutex<Option<RecoveryMetrics>>,
    refresh_behavior: Mutex<RefreshBehavior>,
    pub refresh_calls: AtomicUsize,
    pub revoke_calls: AtomicUsize,
    /// Window of the most recent fetch_workouts call
    pub last_window: Mutex<Option<(DateTime<Utc>, DateTime<Utc>)>>,
}

#[allow(dead_code)]
impl FakeAdapter {
    pub fn new(provider: Provider, external_user_id: &str) -> Self {
        Self {
            provider,
            external_user_id: external_user_id.to_string(),
            workouts: Mutex::new(Vec::new()),
            recovery: Mutex::new(None),
            refresh_behavior: Mutex::new(RefreshBehavior::Succeed),
            refresh_calls: AtomicUsize::new(0),
            revoke_calls: AtomicUsize::new(0),
            last_window: Mutex::new(None),
        }
    }

    pub fn push_workout(&self, workout: ProviderWorkout) {
        self.workouts.lock().unwrap().push(workout);
    }

    pub fn set_recovery(&self, metrics: RecoveryMetrics) {
        *self.recovery.lock().unwrap() = Some(metrics);
    }

    pub fn set_refresh_behavior(&self, behavior: RefreshBehavior) {
        *self.refresh_behavior.lock().unwrap() = behavior;
    }
}

#[async_trait]
impl ProviderAdapter for FakeAdapter {
    fn provider(&self) -> Provider {
        self.provider
    }

    fn authorization_url(&self, redirect_uri: &str, state: &str) -> String {
        format!(
            "https://fake.example/auth?redirect_uri={}&state={}",
            urlencoding::encode(redirect_uri),
            urlencoding::encode(state)
        )
    }

    async fn exchange_code(&self, code: &str, _redirect_uri: &str) -> Result<TokenGrant> {
        Ok(TokenGrant {
            access_token: format!("fake_access_{}", code),
            refresh_token: "fake_refresh".to_string(),
            expires_in: 3600,
        })
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<TokenGrant> {
        let call = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
        match *self.refresh_behavior.lock().unwrap() {
            RefreshBehavior::Succeed => Ok(TokenGrant {
                access_token: format!("refreshed_access_{}", call),
                refresh_token: format!("refreshed_refresh_{}", call),
                expires_in: 3600,
            }),
            RefreshBehavior::Reject => Err(AppError::ProviderRequest {
                provider: self.provider,
                status: Some(401),
                message: "invalid_grant".to_string(),
            }),
            RefreshBehavior::Unavailable => Err(AppError::ProviderRequest {
                provider: self.provider,
                status: Some(503),
                message: "service unavailable".to_string(),
            }),
        }
    }

    async fn revoke(&self, _access_token: &str) -> Result<()> {
        self.revoke_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn fetch_profile(&self, _access_token: &str) -> Result<String> {
        Ok(self.external_user_id.clone())
    }

    async fn fetch_workouts(
        &self,
        _access_token: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ProviderWorkout>> {
        *self.last_window.lock().unwrap() = Some((start, end));
        Ok(self.workouts.lock().unwrap().clone())
    }

    async fn fetch_latest_recovery(
        &self,
        _access_token: &str,
        _day: NaiveDate,
    ) -> Result<Option<RecoveryMetrics>> {
        Ok(self.recovery.lock().unwrap().clone())
    }

    fn signature_header(&self) -> &'static str {
        "X-Test-Signature"
    }

    fn verify_webhook_signature(
        &self,
        raw_payload: &[u8],
        signature: &str,
        secret: &str,
    ) -> bool {
        signature == sign_payload(raw_payload, secret)
    }

    fn parse_webhook(&self, raw_payload: &[u8]) -> Result<WebhookEvent> {
        let payload: serde_json::Value = serde_json::from_slice(raw_payload)
            .map_err(|e| AppError::BadRequest(format!("Malformed webhook payload: {}", e)))?;
        let event_type = payload
            .get("type")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AppError::BadRequest("Webhook payload missing 'type'".to_string()))?;
        let user_id = payload
            .get("user_id")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| AppError::BadRequest("Webhook payload missing 'user_id'".to_string()))?;

        let kind = match event_type {
            "workout.created" => WebhookEventKind::WorkoutCreated,
            "workout.updated" => WebhookEventKind::WorkoutUpdated,
            "recovery.updated" => WebhookEventKind::RecoveryUpdated,
            other => WebhookEventKind::Unknown(other.to_string()),
        };

        Ok(WebhookEvent {
            kind,
            external_user_id: user_id.to_string(),
        })
    }
}

/// Sign a payload the way the fake adapter expects (base64 HMAC-SHA256).
#[allow(dead_code)]
pub fn sign_payload(payload: &[u8], secret: &str) -> String {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use hmac::{Hmac, Mac};
    let mut mac =
        Hmac::<sha2::Sha256>::new_from_slice(secret.as_bytes()).expect("any key length works");
    mac.update(payload);
    STANDARD.encode(mac.finalize().into_bytes())
}

/// Create a test app wired to a `MemoryStore` and the given adapters.
#[allow(dead_code)]
pub fn create_test_app(
    adapters: Vec<Arc<dyn ProviderAdapter>>,
) -> (axum::Router, Arc<AppState>, Arc<MemoryStore>) {
    create_test_app_with_config(Config::test_default(), adapters)
}

#[allow(dead_code)]
pub fn create_test_app_with_config(
    config: Config,
    adapters: Vec<Arc<dyn ProviderAdapter>>,
) -> (axum::Router, Arc<AppState>, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let state = Arc::new(AppState {
        config,
        store: store.clone(),
        providers: ProviderRegistry::new(adapters),
    });
    (create_router(state.clone()), state, store)
}

/// Bearer header value for a test user.
#[allow(dead_code)]
pub fn bearer(user_id: &str, config: &Config) -> String {
    let token = create_jwt(user_id, &config.jwt_signing_key).expect("JWT creation");
    format!("Bearer {}", token)
}

/// Seed a connected integration; expiry one hour out unless `expired`.
#[allow(dead_code)]
pub async fn seed_integration(
    store: &dyn SyncStore,
    user_id: &str,
    provider: Provider,
    external_user_id: &str,
    expired: bool,
) {
    let expires_at = if expired {
        Utc::now() - Duration::hours(1)
    } else {
        Utc::now() + Duration::hours(1)
    };
    store
        .upsert_integration(&IntegrationRecord {
            user_id: user_id.to_string(),
            provider,
            access_token: "seed_access".to_string(),
            refresh_token: "seed_refresh".to_string(),
            token_expires_at: Some(fitsync::time_utils::format_utc_rfc3339(expires_at)),
            external_user_id: external_user_id.to_string(),
            connected_at: "2026-01-01T00:00:00Z".to_string(),
            last_sync_at: None,
        })
        .await
        .expect("seed integration");
}

/// A provider workout fixture.
#[allow(dead_code)]
pub fn workout(provider: Provider, external_id: &str, start: DateTime<Utc>) -> ProviderWorkout {
    ProviderWorkout {
        external_id: external_id.to_string(),
        provider,
        activity_type: ActivityType::Running,
        start,
        end: start + Duration::minutes(45),
        calories_burned: Some(420.0),
        average_hr: Some(150.0),
        max_hr: Some(176.0),
        strain_score: Some(13.1),
    }
}
