// SPDX-License-Identifier: MIT

//! OAuth token lifecycle.
//!
//! Refresh is lazy: tokens are checked (and refreshed) only when a call is
//! about to use them. There is no cross-request serialization; if two
//! requests refresh concurrently, the later write wins and both tokens work
//! until provider-side rotation catches up. A rejected refresh marks the
//! integration as disconnected but keeps the record so the client can prompt
//! the user to reconnect.

use std::sync::Arc;

use chrono::{Duration, Utc};

use crate::db::SyncStore;
use crate::error::{AppError, Result};
use crate::models::{IntegrationRecord, Provider};
use crate::providers::{ProviderRegistry, TokenGrant};
use crate::time_utils::format_utc_rfc3339;

/// Lazily refreshes stored tokens before use.
#[derive(Clone)]
pub struct TokenManager {
    store: Arc<dyn SyncStore>,
    providers: ProviderRegistry,
}

impl TokenManager {
    pub fn new(store: Arc<dyn SyncStore>, providers: ProviderRegistry) -> Self {
        Self { store, providers }
    }

    /// Return the integration record with a usable access token, refreshing
    /// and persisting first when the stored one is expired.
    pub async fn with_valid_token(
        &self,
        user_id: &str,
        provider: Provider,
    ) -> Result<IntegrationRecord> {
        let record = self
            .store
            .get_integration(user_id, provider)
            .await?
            .ok_or(AppError::NotConnected(provider))?;

        if !record.token_expired(Utc::now()) {
            return Ok(record);
        }

        tracing::info!(user_id, provider = %provider, "Access token expired, refreshing");

        let adapter = self.providers.get(provider)?;
        let grant = match adapter.refresh(&record.refresh_token).await {
            Ok(grant) => grant,
            Err(e) if e.is_auth_rejection() => {
                tracing::warn!(
                    user_id,
                    provider = %provider,
                    error = %e,
                    "Token refresh rejected, integration needs reconnect"
                );
                return Err(AppError::AuthExpired(provider));
            }
            Err(e) => return Err(e),
        };

        let refreshed = apply_grant(record, &grant);
        self.store.upsert_integration(&refreshed).await?;

        Ok(refreshed)
    }
}

/// Fold a fresh token grant into the stored record.
pub fn apply_grant(mut record: IntegrationRecord, grant: &TokenGrant) -> IntegrationRecord {
    record.access_token = grant.access_token.clone();
    record.refresh_token = grant.refresh_token.clone();
    record.token_expires_at = Some(format_utc_rfc3339(
        Utc::now() + Duration::seconds(grant.expires_in),
    ));
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Provider;

    #[test]
    fn test_apply_grant_rotates_both_tokens() {
        let record = IntegrationRecord {
            user_id: "user-1".to_string(),
            provider: Provider::Whoop,
            access_token: "old_at".to_string(),
            refresh_token: "old_rt".to_string(),
            token_expires_at: None,
            external_user_id: "ext-1".to_string(),
            connected_at: "2026-01-01T00:00:00Z".to_string(),
            last_sync_at: Some("2026-02-01T00:00:00Z".to_string()),
        };

        let grant = TokenGrant {
            access_token: "new_at".to_string(),
            refresh_token: "new_rt".to_string(),
            expires_in: 3600,
        };

        let updated = apply_grant(record, &grant);
        assert_eq!(updated.access_token, "new_at");
        assert_eq!(updated.refresh_token, "new_rt");
        assert!(!updated.token_expired(Utc::now()));
        // Unrelated fields survive the rotation
        assert_eq!(updated.external_user_id, "ext-1");
        assert_eq!(updated.last_sync_at.as_deref(), Some("2026-02-01T00:00:00Z"));
    }
}
