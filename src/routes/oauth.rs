// SPDX-License-Identifier: MIT

//! OAuth browser callback and the signed `state` parameter.
//!
//! The callback is the only browser-facing endpoint: whatever happens, the
//! user lands back in the app via the configured deep link, with either a
//! connected provider or an error code in the query string.

use axum::{
    extract::{Path, Query, State},
    response::Redirect,
    routing::get,
    Router,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::sync::Arc;

use crate::models::{IntegrationRecord, Provider};
use crate::time_utils::now_rfc3339;
use crate::AppState;

/// How long a signed state value stays valid.
const STATE_MAX_AGE_SECS: i64 = 600;

/// OAuth routes (public; identity is carried in the signed state).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/oauth/{provider}/callback", get(callback))
}

/// Redirect URI registered with each provider.
pub fn redirect_uri(api_base_url: &str, provider: Provider) -> String {
    format!("{}/oauth/{}/callback", api_base_url, provider)
}

// ─── Signed state ────────────────────────────────────────────────

type HmacSha256 = Hmac<Sha256>;

fn state_mac(key: &[u8], message: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Sign a state value binding the OAuth round trip to a user.
pub fn sign_state(user_id: &str, key: &[u8]) -> String {
    let issued_at = format!("{:x}", chrono::Utc::now().timestamp());
    let message = format!("{}|{}", user_id, issued_at);
    let signature = state_mac(key, &message);
    URL_SAFE_NO_PAD.encode(format!("{}|{}", message, signature))
}

/// Verify a state value and recover the user ID it was issued for.
pub fn verify_state(state: &str, key: &[u8]) -> Option<String> {
    let decoded = URL_SAFE_NO_PAD.decode(state).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;

    let mut parts = decoded.rsplitn(2, '|');
    let signature = parts.next()?;
    let message = parts.next()?;

    let expected = state_mac(key, message);
    if !crate::providers::constant_time_eq(signature.as_bytes(), expected.as_bytes()) {
        return None;
    }

    let mut fields = message.rsplitn(2, '|');
    let issued_at = i64::from_str_radix(fields.next()?, 16).ok()?;
    let user_id = fields.next()?;

    let age = chrono::Utc::now().timestamp() - issued_at;
    if !(0..=STATE_MAX_AGE_SECS).contains(&age) {
        return None;
    }

    Some(user_id.to_string())
}

// ─── Callback handler ────────────────────────────────────────────

#[derive(Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    /// Providers put a denial reason here when the user cancels
    error: Option<String>,
}

fn deep_link_redirect(deep_link: &str, query: &str) -> Redirect {
    Redirect::temporary(&format!("{}?{}", deep_link, query))
}

/// Browser lands here after provider authorization. Always redirects into
/// the app deep link; never renders an error page.
async fn callback(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    Query(params): Query<CallbackParams>,
) -> Redirect {
    let deep_link = &state.config.mobile_deep_link;

    let Ok(provider) = provider.parse::<Provider>() else {
        return deep_link_redirect(deep_link, "error=unknown_provider");
    };

    if let Some(reason) = params.error {
        tracing::info!(provider = %provider, reason = %reason, "OAuth denied by user");
        return deep_link_redirect(deep_link, &format!("provider={}&error=denied", provider));
    }

    let (Some(code), Some(raw_state)) = (params.code, params.state) else {
        return deep_link_redirect(
            deep_link,
            &format!("provider={}&error=missing_params", provider),
        );
    };

    let Some(user_id) = verify_state(&raw_state, &state.config.oauth_state_key) else {
        tracing::warn!(provider = %provider, "OAuth callback with invalid or expired state");
        return deep_link_redirect(
            deep_link,
            &format!("provider={}&error=invalid_state", provider),
        );
    };

    match complete_connection(&state, provider, &user_id, &code).await {
        Ok(()) => deep_link_redirect(
            deep_link,
            &format!("provider={}&status=connected", provider),
        ),
        Err(e) => {
            tracing::error!(
                provider = %provider,
                user_id = %user_id,
                error = %e,
                "OAuth code exchange failed"
            );
            deep_link_redirect(
                deep_link,
                &format!("provider={}&error=exchange_failed", provider),
            )
        }
    }
}

/// Exchange the code, resolve the external user, and persist the record.
async fn complete_connection(
    state: &AppState,
    provider: Provider,
    user_id: &str,
    code: &str,
) -> crate::error::Result<()> {
    let adapter = state.providers.get(provider)?;
    let redirect = redirect_uri(&state.config.api_base_url, provider);

    let grant = adapter.exchange_code(code, &redirect).await?;
    let external_user_id = adapter.fetch_profile(&grant.access_token).await?;

    // Reconnecting keeps the original connection metadata
    let existing = state.store.get_integration(user_id, provider).await?;
    let (connected_at, last_sync_at) = match existing {
        Some(record) => (record.connected_at, record.last_sync_at),
        None => (now_rfc3339(), None),
    };

    let record = crate::services::tokens::apply_grant(
        IntegrationRecord {
            user_id: user_id.to_string(),
            provider,
            access_token: String::new(),
            refresh_token: String::new(),
            token_expires_at: None,
            external_user_id,
            connected_at,
            last_sync_at,
        },
        &grant,
    );
    state.store.upsert_integration(&record).await?;

    tracing::info!(user_id, provider = %provider, "Provider connected");
    Ok(())
}
