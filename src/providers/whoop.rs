// SPDX-License-Identifier: MIT

//! Whoop adapter: OAuth, workout/recovery fetching, webhook decoding.
//!
//! Whoop workout records carry an integer `sport_id` and a nested `score`
//! object; both are decoded here and never leak past the adapter.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

use super::{
    check_response_json, constant_time_eq, hmac_sha256, http_client, transport_err,
    ProviderAdapter, TokenGrant,
};
use crate::error::{AppError, Result};
use crate::models::{
    ActivityType, Provider, ProviderWorkout, RecoveryMetrics, WebhookEvent, WebhookEventKind,
};
use crate::time_utils::{day_end, day_start, format_utc_rfc3339};

const AUTH_URL: &str = "https://api.prod.whoop.com/oauth/oauth2/auth";
const TOKEN_URL: &str = "https://api.prod.whoop.com/oauth/oauth2/token";
const REVOKE_URL: &str = "https://api.prod.whoop.com/oauth/oauth2/revoke";
const DEFAULT_API_BASE: &str = "https://api.prod.whoop.com/developer/v1";

const SCOPES: &str = "read:profile read:workout read:recovery read:sleep offline";

/// Kilojoules to kilocalories.
const KJ_TO_KCAL: f64 = 0.239_006;

/// Whoop API adapter.
pub struct WhoopAdapter {
    http: reqwest::Client,
    api_base: String,
    client_id: String,
    client_secret: String,
}

impl WhoopAdapter {
    pub fn new(client_id: String, client_secret: String) -> Self {
        Self {
            http: http_client(),
            api_base: DEFAULT_API_BASE.to_string(),
            client_id,
            client_secret,
        }
    }

    /// Fixed lookup from Whoop sport IDs to the internal taxonomy.
    /// Unmapped IDs fall back to `Other`, never an error.
    pub fn map_activity_type(sport_id: i32) -> ActivityType {
        match sport_id {
            1 | 33 | 34 => ActivityType::Running,
            16 | 17 | 18 => ActivityType::Cycling,
            43 | 44 => ActivityType::Swimming,
            71 => ActivityType::StrengthTraining,
            63 => ActivityType::Yoga,
            50 => ActivityType::Walking,
            52 => ActivityType::Hiking,
            48 => ActivityType::Rowing,
            _ => ActivityType::Other,
        }
    }

    /// Fetch one paginated collection endpoint across all pages.
    async fn fetch_paginated<T: serde::de::DeserializeOwned>(
        &self,
        access_token: &str,
        path: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<T>> {
        let url = format!("{}/{}", self.api_base, path);
        let mut records = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let mut query = vec![
                ("start".to_string(), format_utc_rfc3339(start)),
                ("end".to_string(), format_utc_rfc3339(end)),
                ("limit".to_string(), "25".to_string()),
            ];
            if let Some(token) = &next_token {
                query.push(("nextToken".to_string(), token.clone()));
            }

            let response = self
                .http
                .get(&url)
                .bearer_auth(access_token)
                .query(&query)
                .send()
                .await
                .map_err(|e| transport_err(Provider::Whoop, e))?;

            // No data for this window
            if response.status().as_u16() == 404 {
                return Ok(records);
            }

            let page: WhoopPage<T> = check_response_json(Provider::Whoop, response).await?;
            records.extend(page.records);

            match page.next_token {
                Some(token) if !token.is_empty() => next_token = Some(token),
                _ => return Ok(records),
            }
        }
    }
}

#[async_trait]
impl ProviderAdapter for WhoopAdapter {
    fn provider(&self) -> Provider {
        Provider::Whoop
    }

    fn authorization_url(&self, redirect_uri: &str, state: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}",
            AUTH_URL,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(SCOPES),
            urlencoding::encode(state)
        )
    }

    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<TokenGrant> {
        let response = self
            .http
            .post(TOKEN_URL)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri),
            ])
            .send()
            .await
            .map_err(|e| transport_err(Provider::Whoop, e))?;

        let token: WhoopTokenResponse = check_response_json(Provider::Whoop, response).await?;
        Ok(token.into())
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant> {
        let response = self
            .http
            .post(TOKEN_URL)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                // Whoop only re-issues a refresh token with the offline scope
                ("scope", "offline"),
            ])
            .send()
            .await
            .map_err(|e| transport_err(Provider::Whoop, e))?;

        let token: WhoopTokenResponse = check_response_json(Provider::Whoop, response).await?;
        Ok(token.into())
    }

    async fn revoke(&self, access_token: &str) -> Result<()> {
        let response = self
            .http
            .post(REVOKE_URL)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("token", access_token),
            ])
            .send()
            .await
            .map_err(|e| transport_err(Provider::Whoop, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::ProviderRequest {
                provider: Provider::Whoop,
                status: Some(status.as_u16()),
                message: "Token revocation failed".to_string(),
            });
        }
        Ok(())
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<String> {
        let response = self
            .http
            .get(format!("{}/user/profile/basic", self.api_base))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| transport_err(Provider::Whoop, e))?;

        let profile: WhoopProfile = check_response_json(Provider::Whoop, response).await?;
        Ok(profile.user_id.to_string())
    }

    async fn fetch_workouts(
        &self,
        access_token: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ProviderWorkout>> {
        let raw: Vec<WhoopWorkout> = self
            .fetch_paginated(access_token, "activity/workout", start, end)
            .await?;

        let mut workouts = Vec::with_capacity(raw.len());
        for record in raw {
            match record.into_provider_workout() {
                Some(workout) => workouts.push(workout),
                None => {
                    tracing::warn!(provider = "whoop", "Skipping workout with unparsable dates")
                }
            }
        }
        Ok(workouts)
    }

    async fn fetch_latest_recovery(
        &self,
        access_token: &str,
        day: NaiveDate,
    ) -> Result<Option<RecoveryMetrics>> {
        let start = day_start(day);
        let end = day_end(day);

        let recoveries: Vec<WhoopRecovery> = self
            .fetch_paginated(access_token, "recovery", start, end)
            .await?;
        let sleeps: Vec<WhoopSleep> = self
            .fetch_paginated(access_token, "activity/sleep", start, end)
            .await?;

        let recovery_score = recoveries.into_iter().next().and_then(|r| r.score);
        let sleep_score = sleeps.into_iter().next().and_then(|s| s.score);

        if recovery_score.is_none() && sleep_score.is_none() {
            return Ok(None);
        }

        Ok(Some(RecoveryMetrics {
            sleep_performance: sleep_score.and_then(|s| s.sleep_performance_percentage),
            hrv_ms: recovery_score
                .as_ref()
                .and_then(|r| r.hrv_rmssd_milli),
            resting_hr: recovery_score.as_ref().and_then(|r| r.resting_heart_rate),
        }))
    }

    fn signature_header(&self) -> &'static str {
        "X-WHOOP-Signature"
    }

    fn verify_webhook_signature(
        &self,
        raw_payload: &[u8],
        signature: &str,
        secret: &str,
    ) -> bool {
        let expected = STANDARD.encode(hmac_sha256(secret, raw_payload));
        constant_time_eq(signature.as_bytes(), expected.as_bytes())
    }

    fn parse_webhook(&self, raw_payload: &[u8]) -> Result<WebhookEvent> {
        let payload: WhoopWebhookPayload = serde_json::from_slice(raw_payload)
            .map_err(|e| AppError::BadRequest(format!("Malformed webhook payload: {}", e)))?;

        let event_type = payload
            .event_type
            .ok_or_else(|| AppError::BadRequest("Webhook payload missing 'type'".to_string()))?;
        let user_id = payload
            .user_id
            .ok_or_else(|| AppError::BadRequest("Webhook payload missing 'user_id'".to_string()))?;

        let kind = match event_type.as_str() {
            "workout.created" => WebhookEventKind::WorkoutCreated,
            "workout.updated" => WebhookEventKind::WorkoutUpdated,
            "recovery.created" | "recovery.updated" => WebhookEventKind::RecoveryUpdated,
            other => WebhookEventKind::Unknown(other.to_string()),
        };

        Ok(WebhookEvent {
            kind,
            external_user_id: user_id.to_string(),
        })
    }
}

// ─── Whoop API response shapes ───────────────────────────────────

#[derive(Debug, Deserialize)]
struct WhoopPage<T> {
    records: Vec<T>,
    next_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WhoopTokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
}

impl From<WhoopTokenResponse> for TokenGrant {
    fn from(t: WhoopTokenResponse) -> Self {
        TokenGrant {
            access_token: t.access_token,
            refresh_token: t.refresh_token,
            expires_in: t.expires_in,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WhoopProfile {
    user_id: i64,
}

#[derive(Debug, Deserialize)]
struct WhoopWorkout {
    id: String,
    sport_id: i32,
    start: String,
    end: String,
    score: Option<WhoopWorkoutScore>,
}

#[derive(Debug, Deserialize)]
struct WhoopWorkoutScore {
    strain: Option<f64>,
    average_heart_rate: Option<i32>,
    max_heart_rate: Option<i32>,
    kilojoule: Option<f64>,
}

impl WhoopWorkout {
    fn into_provider_workout(self) -> Option<ProviderWorkout> {
        let start = crate::time_utils::parse_rfc3339(&self.start)?;
        let end = crate::time_utils::parse_rfc3339(&self.end)?;
        let score = self.score;

        Some(ProviderWorkout {
            external_id: self.id,
            provider: Provider::Whoop,
            activity_type: WhoopAdapter::map_activity_type(self.sport_id),
            start,
            end,
            calories_burned: score
                .as_ref()
                .and_then(|s| s.kilojoule)
                .map(|kj| kj * KJ_TO_KCAL),
            average_hr: score
                .as_ref()
                .and_then(|s| s.average_heart_rate)
                .map(f64::from),
            max_hr: score
                .as_ref()
                .and_then(|s| s.max_heart_rate)
                .map(f64::from),
            strain_score: score.as_ref().and_then(|s| s.strain),
        })
    }
}

#[derive(Debug, Deserialize)]
struct WhoopRecovery {
    score: Option<WhoopRecoveryScore>,
}

#[derive(Debug, Deserialize)]
struct WhoopRecoveryScore {
    resting_heart_rate: Option<f64>,
    hrv_rmssd_milli: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct WhoopSleep {
    score: Option<WhoopSleepScore>,
}

#[derive(Debug, Deserialize)]
struct WhoopSleepScore {
    sleep_performance_percentage: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct WhoopWebhookPayload {
    #[serde(rename = "type")]
    event_type: Option<String>,
    user_id: Option<i64>,
}
