// SPDX-License-Identifier: MIT

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::models::Provider;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("No {0} integration connected")]
    NotConnected(Provider),

    /// Provider refresh failed; the user must reconnect. The integration
    /// record is kept so the client can prompt for re-authorization.
    #[error("{0} integration disconnected: token refresh rejected")]
    AuthExpired(Provider),

    /// Non-2xx response (or network failure/timeout) from a provider API.
    #[error("{provider} request failed ({status:?}): {message}")]
    ProviderRequest {
        provider: Provider,
        /// HTTP status if the provider responded at all.
        status: Option<u16>,
        message: String,
    },

    #[error("Webhook signature verification failed")]
    SignatureInvalid,

    /// Sequence allocation lost its race on the initial attempt and the
    /// single retry.
    #[error("Sequence conflict: {0}")]
    SequenceConflict(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Whether a provider-side error indicates a revoked or invalid grant
    /// (as opposed to transient unavailability).
    pub fn is_auth_rejection(&self) -> bool {
        match self {
            AppError::ProviderRequest {
                status: Some(s), ..
            } => matches!(*s, 400 | 401 | 403),
            _ => false,
        }
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            AppError::InvalidToken => (StatusCode::UNAUTHORIZED, "invalid_token", None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::NotConnected(provider) => (
                StatusCode::NOT_FOUND,
                "not_connected",
                Some(format!("{} is not connected", provider)),
            ),
            AppError::AuthExpired(provider) => (
                StatusCode::CONFLICT,
                "integration_disconnected",
                Some(format!("Reconnect {} to continue syncing", provider)),
            ),
            AppError::ProviderRequest { message, .. } => (
                StatusCode::BAD_GATEWAY,
                "provider_error",
                Some(message.clone()),
            ),
            AppError::SignatureInvalid => {
                (StatusCode::UNAUTHORIZED, "invalid_signature", None)
            }
            AppError::SequenceConflict(msg) => {
                tracing::error!(error = %msg, "Sequence conflict not resolved by retry");
                (StatusCode::INTERNAL_SERVER_ERROR, "sequence_conflict", None)
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
