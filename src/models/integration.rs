// SPDX-License-Identifier: MIT

//! Provider integration record: the stored OAuth credential and metadata
//! bundle linking one user to one provider.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The fixed set of supported external fitness providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Recovery-tracking wearable (strain, recovery, sleep, workouts)
    Whoop,
    /// Activity-tracking platform (runs, rides, swims, ...)
    Strava,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Whoop => "whoop",
            Provider::Strava => "strava",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "whoop" => Ok(Provider::Whoop),
            "strava" => Ok(Provider::Strava),
            other => Err(UnknownProvider(other.to_string())),
        }
    }
}

/// Error for provider names outside the supported set.
#[derive(Debug, thiserror::Error)]
#[error("Unknown provider: {0}")]
pub struct UnknownProvider(pub String);

/// One integration per (user, provider) — the upsert key.
///
/// Created on successful OAuth exchange, mutated on token refresh and on
/// sync completion, deleted on disconnect. Kept in place when a refresh is
/// rejected so the user can be prompted to reconnect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationRecord {
    /// Journal user ID (owner)
    pub user_id: String,
    /// Which provider this record is for
    pub provider: Provider,
    /// Current OAuth access token
    pub access_token: String,
    /// Current OAuth refresh token
    pub refresh_token: String,
    /// When the access token expires (RFC3339); unset means "treat as expired"
    pub token_expires_at: Option<String>,
    /// The provider's identifier for this user; routes inbound webhooks back
    /// to a user_id
    pub external_user_id: String,
    /// When the user first connected (RFC3339)
    pub connected_at: String,
    /// When the last successful pull sync completed (RFC3339)
    pub last_sync_at: Option<String>,
}

impl IntegrationRecord {
    /// Whether the stored access token is expired (or has no known expiry).
    pub fn token_expired(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        match self
            .token_expires_at
            .as_deref()
            .and_then(crate::time_utils::parse_rfc3339)
        {
            Some(expires_at) => expires_at <= now,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn record(expires_at: Option<String>) -> IntegrationRecord {
        IntegrationRecord {
            user_id: "user-1".to_string(),
            provider: Provider::Whoop,
            access_token: "at".to_string(),
            refresh_token: "rt".to_string(),
            token_expires_at: expires_at,
            external_user_id: "ext-1".to_string(),
            connected_at: "2026-01-01T00:00:00Z".to_string(),
            last_sync_at: None,
        }
    }

    #[test]
    fn test_token_expired_unset_expiry() {
        assert!(record(None).token_expired(Utc::now()));
    }

    #[test]
    fn test_token_expired_past_and_future() {
        let now = Utc::now();
        let past = crate::time_utils::format_utc_rfc3339(now - Duration::hours(1));
        let future = crate::time_utils::format_utc_rfc3339(now + Duration::hours(1));

        assert!(record(Some(past)).token_expired(now));
        assert!(!record(Some(future)).token_expired(now));
    }

    #[test]
    fn test_provider_round_trip() {
        for p in [Provider::Whoop, Provider::Strava] {
            assert_eq!(p.as_str().parse::<Provider>().unwrap(), p);
        }
        assert!("garmin".parse::<Provider>().is_err());
    }
}
