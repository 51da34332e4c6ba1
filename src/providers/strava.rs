// SPDX-License-Identifier: MIT

//! Strava adapter: OAuth, activity fetching, webhook decoding.
//!
//! Strava activities carry a `sport_type` string and flat top-level metric
//! fields, and windows are expressed as epoch-second `after`/`before` query
//! parameters.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use super::{
    check_response_json, constant_time_eq, hmac_sha256, http_client, transport_err,
    ProviderAdapter, TokenGrant,
};
use crate::error::{AppError, Result};
use crate::models::{
    ActivityType, Provider, ProviderWorkout, WebhookEvent, WebhookEventKind,
};

const AUTH_URL: &str = "https://www.strava.com/oauth/authorize";
const TOKEN_URL: &str = "https://www.strava.com/oauth/token";
const DEAUTHORIZE_URL: &str = "https://www.strava.com/oauth/deauthorize";
const DEFAULT_API_BASE: &str = "https://www.strava.com/api/v3";

const SCOPES: &str = "read,activity:read_all";

/// Activities fetched per page.
const PAGE_SIZE: u32 = 50;

/// Strava API adapter.
pub struct StravaAdapter {
    http: reqwest::Client,
    api_base: String,
    client_id: String,
    client_secret: String,
}

impl StravaAdapter {
    pub fn new(client_id: String, client_secret: String) -> Self {
        Self {
            http: http_client(),
            api_base: DEFAULT_API_BASE.to_string(),
            client_id,
            client_secret,
        }
    }

    /// Map a Strava `sport_type` to the internal taxonomy. Unknown strings
    /// fall back to `Other`, never an error.
    pub fn map_activity_type(sport_type: &str) -> ActivityType {
        match sport_type {
            "Run" | "TrailRun" | "VirtualRun" => ActivityType::Running,
            "Ride" | "GravelRide" | "MountainBikeRide" | "VirtualRide" | "EBikeRide" => {
                ActivityType::Cycling
            }
            "Swim" => ActivityType::Swimming,
            "WeightTraining" | "Crossfit" => ActivityType::StrengthTraining,
            "Yoga" | "Pilates" => ActivityType::Yoga,
            "Walk" => ActivityType::Walking,
            "Hike" => ActivityType::Hiking,
            "Rowing" | "VirtualRow" | "Canoeing" | "Kayaking" => ActivityType::Rowing,
            _ => ActivityType::Other,
        }
    }
}

#[async_trait]
impl ProviderAdapter for StravaAdapter {
    fn provider(&self) -> Provider {
        Provider::Strava
    }

    fn authorization_url(&self, redirect_uri: &str, state: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&approval_prompt=auto&scope={}&state={}",
            AUTH_URL,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(SCOPES),
            urlencoding::encode(state)
        )
    }

    async fn exchange_code(&self, code: &str, _redirect_uri: &str) -> Result<TokenGrant> {
        let response = self
            .http
            .post(TOKEN_URL)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| transport_err(Provider::Strava, e))?;

        let token: StravaTokenResponse = check_response_json(Provider::Strava, response).await?;
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
            ])
            .send()
            .await
            .map_err(|e| transport_err(Provider::Strava, e))?;

        let token: StravaTokenResponse = check_response_json(Provider::Strava, response).await?;
        Ok(token.into())
    }

    async fn revoke(&self, access_token: &str) -> Result<()> {
        let response = self
            .http
            .post(DEAUTHORIZE_URL)
            .form(&[("access_token", access_token)])
            .send()
            .await
            .map_err(|e| transport_err(Provider::Strava, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::ProviderRequest {
                provider: Provider::Strava,
                status: Some(status.as_u16()),
                message: "Deauthorization failed".to_string(),
            });
        }
        Ok(())
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<String> {
        let response = self
            .http
            .get(format!("{}/athlete", self.api_base))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| transport_err(Provider::Strava, e))?;

        let athlete: StravaAthlete = check_response_json(Provider::Strava, response).await?;
        Ok(athlete.id.to_string())
    }

    async fn fetch_workouts(
        &self,
        access_token: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ProviderWorkout>> {
        let url = format!("{}/athlete/activities", self.api_base);
        let mut workouts = Vec::new();
        let mut page: u32 = 1;

        loop {
            let response = self
                .http
                .get(&url)
                .bearer_auth(access_token)
                .query(&[
                    ("after", start.timestamp().to_string()),
                    ("before", end.timestamp().to_string()),
                    ("per_page", PAGE_SIZE.to_string()),
                    ("page", page.to_string()),
                ])
                .send()
                .await
                .map_err(|e| transport_err(Provider::Strava, e))?;

            // No data for this window
            if response.status().as_u16() == 404 {
                return Ok(workouts);
            }

            let activities: Vec<StravaActivity> =
                check_response_json(Provider::Strava, response).await?;
            let page_len = activities.len();

            for activity in activities {
                match activity.into_provider_workout() {
                    Some(workout) => workouts.push(workout),
                    None => tracing::warn!(
                        provider = "strava",
                        "Skipping activity with unparsable start date"
                    ),
                }
            }

            if (page_len as u32) < PAGE_SIZE {
                return Ok(workouts);
            }
            page += 1;
        }
    }

    fn signature_header(&self) -> &'static str {
        "X-Hub-Signature"
    }

    fn verify_webhook_signature(
        &self,
        raw_payload: &[u8],
        signature: &str,
        secret: &str,
    ) -> bool {
        // Header value may carry a "sha256=" prefix
        let signature = signature.strip_prefix("sha256=").unwrap_or(signature);
        let expected = hex::encode(hmac_sha256(secret, raw_payload));
        constant_time_eq(signature.as_bytes(), expected.as_bytes())
    }

    fn parse_webhook(&self, raw_payload: &[u8]) -> Result<WebhookEvent> {
        let payload: StravaWebhookPayload = serde_json::from_slice(raw_payload)
            .map_err(|e| AppError::BadRequest(format!("Malformed webhook payload: {}", e)))?;

        let owner_id = payload
            .owner_id
            .ok_or_else(|| AppError::BadRequest("Webhook payload missing 'owner_id'".to_string()))?;

        // Either a flat "type" field or the object_type/aspect_type pair
        let event_type = match (payload.event_type, payload.object_type, payload.aspect_type) {
            (Some(t), _, _) => t,
            (None, Some(object), Some(aspect)) => format!("{}.{}", object, aspect),
            _ => {
                return Err(AppError::BadRequest(
                    "Webhook payload missing event type".to_string(),
                ))
            }
        };

        let kind = match event_type.as_str() {
            "activity.create" | "workout.created" => WebhookEventKind::WorkoutCreated,
            "activity.update" | "workout.updated" => WebhookEventKind::WorkoutUpdated,
            other => WebhookEventKind::Unknown(other.to_string()),
        };

        Ok(WebhookEvent {
            kind,
            external_user_id: owner_id.to_string(),
        })
    }
}

// ─── Strava API response shapes ──────────────────────────────────

#[derive(Debug, Deserialize)]
struct StravaTokenResponse {
    access_token: String,
    refresh_token: String,
    expires_at: i64,
}

impl From<StravaTokenResponse> for TokenGrant {
    fn from(t: StravaTokenResponse) -> Self {
        // Strava reports an absolute expiry epoch
        let expires_in = t.expires_at - Utc::now().timestamp();
        TokenGrant {
            access_token: t.access_token,
            refresh_token: t.refresh_token,
            expires_in: expires_in.max(0),
        }
    }
}

#[derive(Debug, Deserialize)]
struct StravaAthlete {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct StravaActivity {
    id: i64,
    sport_type: Option<String>,
    #[serde(rename = "type")]
    activity_type: Option<String>,
    start_date: String,
    /// Total elapsed seconds including pauses
    elapsed_time: i64,
    calories: Option<f64>,
    average_heartrate: Option<f64>,
    max_heartrate: Option<f64>,
    suffer_score: Option<f64>,
}

impl StravaActivity {
    fn into_provider_workout(self) -> Option<ProviderWorkout> {
        let start = crate::time_utils::parse_rfc3339(&self.start_date)?;
        let end = start + Duration::seconds(self.elapsed_time.max(0));
        let sport = self
            .sport_type
            .or(self.activity_type)
            .unwrap_or_default();

        Some(ProviderWorkout {
            external_id: self.id.to_string(),
            provider: Provider::Strava,
            activity_type: StravaAdapter::map_activity_type(&sport),
            start,
            end,
            calories_burned: self.calories,
            average_hr: self.average_heartrate,
            max_hr: self.max_heartrate,
            strain_score: self.suffer_score,
        })
    }
}

#[derive(Debug, Deserialize)]
struct StravaWebhookPayload {
    #[serde(rename = "type")]
    event_type: Option<String>,
    object_type: Option<String>,
    aspect_type: Option<String>,
    owner_id: Option<i64>,
}
