// SPDX-License-Identifier: MIT

//! Authenticated integration management API.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Extension, Json, Router,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{IntegrationRecord, Provider};
use crate::routes::oauth::{redirect_uri, sign_state};
use crate::services::SyncService;
use crate::AppState;

/// Default pull-sync window when the client gives no range.
const DEFAULT_SYNC_DAYS: i64 = 7;

/// Integration routes (all require auth).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/integrations", get(list))
        .route("/api/integrations/{provider}/connect", get(connect))
        .route("/api/integrations/{provider}", delete(disconnect))
        .route("/api/integrations/{provider}/sync", post(sync))
}

/// Integration record as exposed to clients; tokens never leave the server.
#[derive(Serialize)]
struct IntegrationSummary {
    provider: Provider,
    external_user_id: String,
    connected_at: String,
    last_sync_at: Option<String>,
}

impl From<IntegrationRecord> for IntegrationSummary {
    fn from(record: IntegrationRecord) -> Self {
        Self {
            provider: record.provider,
            external_user_id: record.external_user_id,
            connected_at: record.connected_at,
            last_sync_at: record.last_sync_at,
        }
    }
}

/// List the user's connected providers.
async fn list(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<IntegrationSummary>>> {
    let records = state.store.list_integrations(&user.user_id).await?;
    Ok(Json(records.into_iter().map(Into::into).collect()))
}

#[derive(Serialize)]
struct ConnectResponse {
    url: String,
}

/// Build the provider authorization URL for this user.
async fn connect(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(provider): Path<String>,
) -> Result<Json<ConnectResponse>> {
    let provider: Provider = provider
        .parse()
        .map_err(|_| AppError::NotFound(format!("Unknown provider: {}", provider)))?;
    let adapter = state.providers.get(provider)?;

    let oauth_state = sign_state(&user.user_id, &state.config.oauth_state_key);
    let redirect = redirect_uri(&state.config.api_base_url, provider);

    Ok(Json(ConnectResponse {
        url: adapter.authorization_url(&redirect, &oauth_state),
    }))
}

/// Disconnect a provider: best-effort remote revocation, then delete the
/// stored record. Revocation failure never blocks the delete.
async fn disconnect(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(provider): Path<String>,
) -> Result<StatusCode> {
    let provider: Provider = provider
        .parse()
        .map_err(|_| AppError::NotFound(format!("Unknown provider: {}", provider)))?;

    let record = state
        .store
        .get_integration(&user.user_id, provider)
        .await?
        .ok_or(AppError::NotConnected(provider))?;

    if let Ok(adapter) = state.providers.get(provider) {
        if let Err(e) = adapter.revoke(&record.access_token).await {
            tracing::warn!(
                user_id = %user.user_id,
                provider = %provider,
                error = %e,
                "Remote token revocation failed, deleting record anyway"
            );
        }
    }

    state
        .store
        .delete_integration(&user.user_id, provider)
        .await?;

    tracing::info!(user_id = %user.user_id, provider = %provider, "Provider disconnected");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize, Default)]
struct SyncParams {
    /// Window start (RFC3339); defaults to `end` minus seven days
    start: Option<String>,
    /// Window end (RFC3339); defaults to now
    end: Option<String>,
}

/// Pull-sync a window of workouts from the provider.
async fn sync(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(provider): Path<String>,
    Query(params): Query<SyncParams>,
) -> Result<Json<crate::services::SyncSummary>> {
    let provider: Provider = provider
        .parse()
        .map_err(|_| AppError::NotFound(format!("Unknown provider: {}", provider)))?;

    let end = match params.end.as_deref() {
        Some(raw) => crate::time_utils::parse_rfc3339(raw)
            .ok_or_else(|| AppError::BadRequest(format!("Invalid 'end' timestamp: {}", raw)))?,
        None => Utc::now(),
    };
    let start = match params.start.as_deref() {
        Some(raw) => crate::time_utils::parse_rfc3339(raw)
            .ok_or_else(|| AppError::BadRequest(format!("Invalid 'start' timestamp: {}", raw)))?,
        None => end - Duration::days(DEFAULT_SYNC_DAYS),
    };
    if start > end {
        return Err(AppError::BadRequest(
            "'start' must not be after 'end'".to_string(),
        ));
    }

    let service = SyncService::new(state.store.clone(), state.providers.clone());
    let summary = service
        .sync_range(&user.user_id, provider, start, end)
        .await?;

    Ok(Json(summary))
}
