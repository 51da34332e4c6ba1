// SPDX-License-Identifier: MIT

//! Webhook gateway.
//!
//! One endpoint per provider. Requests walk a fixed ladder: verify the
//! signature over the raw bytes, decode and classify the event, resolve the
//! external user, dispatch. Once a request is classified the response is 200
//! no matter what dispatch does; provider retry queues are for transport
//! failures, not for our bugs.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use chrono::{Duration, Utc};
use serde_json::json;
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::models::{Provider, WebhookEventKind};
use crate::services::SyncService;
use crate::AppState;

/// Bound on synchronous event dispatch before we acknowledge anyway.
const DISPATCH_TIMEOUT_SECS: u64 = 10;

/// How far back a workout webhook pulls; providers may deliver events for
/// workouts finalized a while after they ended.
const WEBHOOK_SYNC_HOURS: i64 = 24;

/// Webhook routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/webhook/{provider}", post(handle_event))
}

fn webhook_secret(state: &AppState, provider: Provider) -> Option<&str> {
    match provider {
        Provider::Whoop => state.config.whoop_webhook_secret.as_deref(),
        Provider::Strava => state.config.strava_webhook_secret.as_deref(),
    }
}

/// Handle an inbound provider event (POST).
async fn handle_event(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse> {
    let provider: Provider = provider
        .parse()
        .map_err(|_| AppError::NotFound(format!("Unknown provider: {}", provider)))?;
    let adapter = state.providers.get(provider)?;

    match webhook_secret(&state, provider) {
        Some(secret) => {
            let signature = headers
                .get(adapter.signature_header())
                .and_then(|h| h.to_str().ok())
                .ok_or(AppError::SignatureInvalid)?;
            if !adapter.verify_webhook_signature(&body, signature, secret) {
                tracing::warn!(provider = %provider, "Webhook signature mismatch");
                return Err(AppError::SignatureInvalid);
            }
        }
        None => {
            tracing::warn!(
                provider = %provider,
                "No webhook secret configured, accepting UNVERIFIED event"
            );
        }
    }

    // Structural errors (malformed body, missing type) are the sender's
    // problem and get a 400; everything after this point is acknowledged.
    let event = adapter.parse_webhook(&body)?;

    if let WebhookEventKind::Unknown(ref kind) = event.kind {
        tracing::info!(provider = %provider, kind = %kind, "Ignoring unhandled event type");
        return Ok(Json(json!({ "received": true })));
    }

    // The event is classified; from here on the response is 200 no matter
    // what the store or dispatch does.
    let record = match state
        .store
        .find_integration_by_external_user(provider, &event.external_user_id)
        .await
    {
        Ok(Some(record)) => record,
        Ok(None) => {
            tracing::warn!(
                provider = %provider,
                external_user_id = %event.external_user_id,
                "Webhook for unknown external user"
            );
            return Ok(Json(json!({ "received": true })));
        }
        Err(e) => {
            tracing::error!(
                provider = %provider,
                external_user_id = %event.external_user_id,
                error = %e,
                "Store lookup failed during webhook dispatch"
            );
            return Ok(Json(json!({ "received": true })));
        }
    };

    let service = SyncService::new(state.store.clone(), state.providers.clone());
    let user_id = record.user_id.clone();
    let dispatch = async {
        match event.kind {
            WebhookEventKind::WorkoutCreated | WebhookEventKind::WorkoutUpdated => {
                let end = Utc::now();
                let start = end - Duration::hours(WEBHOOK_SYNC_HOURS);
                service
                    .sync_range(&user_id, provider, start, end)
                    .await
                    .map(|_| ())
            }
            WebhookEventKind::RecoveryUpdated => service
                .apply_recovery_update(&user_id, provider)
                .await
                .map(|_| ()),
            WebhookEventKind::Unknown(_) => Ok(()),
        }
    };

    match tokio::time::timeout(
        std::time::Duration::from_secs(DISPATCH_TIMEOUT_SECS),
        dispatch,
    )
    .await
    {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            tracing::error!(
                provider = %provider,
                user_id = %record.user_id,
                error = %e,
                "Webhook dispatch failed"
            );
        }
        Err(_) => {
            tracing::error!(
                provider = %provider,
                user_id = %record.user_id,
                "Webhook dispatch timed out"
            );
        }
    }

    Ok(Json(json!({ "received": true })))
}
