// SPDX-License-Identifier: MIT

//! Application configuration loaded from environment variables.
//!
//! Provider OAuth credentials and webhook secrets are injected as env vars
//! (Cloud Run secret bindings in production, `.env` for local development).

use std::env;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,
    /// Public base URL of this API (used to build OAuth redirect URIs)
    pub api_base_url: String,
    /// Mobile deep link the OAuth callback redirects to, e.g. `fitsync://oauth`
    pub mobile_deep_link: String,
    /// Allowed browser origin for CORS
    pub frontend_url: String,
    /// GCP project ID for Firestore
    pub gcp_project_id: String,

    /// JWT signing key for bearer session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// HMAC key for the signed OAuth `state` parameter
    pub oauth_state_key: Vec<u8>,

    /// Whoop OAuth client ID
    pub whoop_client_id: String,
    /// Whoop OAuth client secret
    pub whoop_client_secret: String,
    /// Whoop webhook signing secret; when unset, signature verification is
    /// skipped (loudly logged — not safe for production)
    pub whoop_webhook_secret: Option<String>,

    /// Strava OAuth client ID
    pub strava_client_id: String,
    /// Strava OAuth client secret
    pub strava_client_secret: String,
    /// Strava webhook signing secret; same skip semantics as Whoop's
    pub strava_webhook_secret: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            api_base_url: env::var("API_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            mobile_deep_link: env::var("MOBILE_DEEP_LINK")
                .unwrap_or_else(|_| "fitsync://oauth".to_string()),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),

            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
            oauth_state_key: env::var("OAUTH_STATE_KEY")
                .map_err(|_| ConfigError::Missing("OAUTH_STATE_KEY"))?
                .into_bytes(),

            whoop_client_id: env::var("WHOOP_CLIENT_ID")
                .map_err(|_| ConfigError::Missing("WHOOP_CLIENT_ID"))?,
            whoop_client_secret: env::var("WHOOP_CLIENT_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("WHOOP_CLIENT_SECRET"))?,
            whoop_webhook_secret: env::var("WHOOP_WEBHOOK_SECRET")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),

            strava_client_id: env::var("STRAVA_CLIENT_ID")
                .map_err(|_| ConfigError::Missing("STRAVA_CLIENT_ID"))?,
            strava_client_secret: env::var("STRAVA_CLIENT_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("STRAVA_CLIENT_SECRET"))?,
            strava_webhook_secret: env::var("STRAVA_WEBHOOK_SECRET")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
        })
    }

    /// Config for tests only — no env access, fixed keys.
    pub fn test_default() -> Self {
        Self {
            port: 8080,
            api_base_url: "http://localhost:8080".to_string(),
            mobile_deep_link: "fitsync://oauth".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            gcp_project_id: "test-project".to_string(),
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!!".to_vec(),
            oauth_state_key: b"test_state_key".to_vec(),
            whoop_client_id: "whoop_test_id".to_string(),
            whoop_client_secret: "whoop_test_secret".to_string(),
            whoop_webhook_secret: Some("whoop_test_webhook_secret".to_string()),
            strava_client_id: "strava_test_id".to_string(),
            strava_client_secret: "strava_test_secret".to_string(),
            strava_webhook_secret: Some("strava_test_webhook_secret".to_string()),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}
