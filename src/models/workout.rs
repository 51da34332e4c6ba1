// SPDX-License-Identifier: MIT

//! Internal workout shape produced by provider adapters.
//!
//! Each adapter decodes its provider-specific JSON at the boundary and emits
//! `ProviderWorkout`, so the import pipeline consumes one uniform type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Provider;

/// Closed set of internal activity categories.
///
/// Provider activity codes map into this set via a fixed per-adapter lookup;
/// unmapped codes fall back to `Other`, never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    Running,
    Cycling,
    Swimming,
    StrengthTraining,
    Yoga,
    Walking,
    Hiking,
    Rowing,
    Other,
}

/// A provider workout, normalized at the adapter boundary.
#[derive(Debug, Clone)]
pub struct ProviderWorkout {
    /// Provider's identifier for this workout (the dedup key)
    pub external_id: String,
    /// Which provider it came from
    pub provider: Provider,
    /// Mapped internal category
    pub activity_type: ActivityType,
    /// Start timestamp (UTC)
    pub start: DateTime<Utc>,
    /// End timestamp (UTC)
    pub end: DateTime<Utc>,
    /// Calories burned (kcal), if reported
    pub calories_burned: Option<f64>,
    /// Average heart rate (bpm), if reported
    pub average_hr: Option<f64>,
    /// Max heart rate (bpm), if reported
    pub max_hr: Option<f64>,
    /// Provider strain/effort score, if reported
    pub strain_score: Option<f64>,
}

/// Recovery metrics from a wearable, applied onto a same-day reflection.
#[derive(Debug, Clone, Default)]
pub struct RecoveryMetrics {
    /// Sleep performance percentage (0-100)
    pub sleep_performance: Option<f64>,
    /// Heart rate variability (RMSSD, milliseconds)
    pub hrv_ms: Option<f64>,
    /// Resting heart rate (bpm)
    pub resting_hr: Option<f64>,
}

/// Classified inbound webhook event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEventKind {
    WorkoutCreated,
    WorkoutUpdated,
    RecoveryUpdated,
    /// Recognized payload but an event type we don't handle; logged and dropped.
    Unknown(String),
}

/// Inbound webhook event, decoded by the provider adapter.
#[derive(Debug, Clone)]
pub struct WebhookEvent {
    pub kind: WebhookEventKind,
    /// The provider's user identifier; joined back to an IntegrationRecord
    pub external_user_id: String,
}
