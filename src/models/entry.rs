// SPDX-License-Identifier: MIT

//! Schedule and reflection entry models.
//!
//! Both are ordered within a (user, date) partition by a sequence number.
//! Sequences are a monotonically-assigned ordering token, not an array
//! index — uniqueness is required, contiguity is not.

use serde::{Deserialize, Serialize};

use super::{ActivityType, Provider};

/// A planned/occurred training session on the daily schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleEntry {
    /// Journal user ID (owner)
    pub user_id: String,
    /// UTC calendar date, `YYYY-MM-DD`
    pub date: String,
    /// Positive ordering token, unique within (user_id, date)
    pub sequence: u32,
    /// Internal activity category
    pub activity_type: ActivityType,
    /// Session start (RFC3339)
    pub start_time: String,
    /// Duration in minutes; None when the source reported a non-positive span
    pub duration_minutes: Option<u32>,
    /// Free-form note; system-generated for imports ("Imported from whoop")
    pub notes: String,
}

/// A post-activity reflection. Provider imports create drafts with objective
/// metrics populated; subjective fields stay unset for the user to fill in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReflectionEntry {
    /// Journal user ID (owner)
    pub user_id: String,
    /// UTC calendar date, `YYYY-MM-DD`
    pub date: String,
    /// Positive ordering token, unique within (user_id, date); its own
    /// namespace, independent of ScheduleEntry.sequence
    pub workout_sequence: u32,
    /// Provider's workout ID — unique per user, the import dedup key
    pub external_activity_id: String,
    /// Which provider this was imported from
    pub provider: Provider,
    /// Internal activity category
    pub activity_type: ActivityType,
    /// Duration in minutes; None when the source reported a non-positive span
    pub duration_minutes: Option<u32>,
    /// Calories burned (kcal)
    pub calories_burned: Option<f64>,
    /// Average heart rate (bpm)
    pub average_hr: Option<f64>,
    /// Max heart rate (bpm)
    pub max_hr: Option<f64>,
    /// Provider strain/effort score
    pub strain_score: Option<f64>,

    // Recovery metrics, filled in by recovery webhooks after the fact.
    /// Sleep performance percentage (0-100)
    pub sleep_performance: Option<f64>,
    /// Heart rate variability (RMSSD, milliseconds)
    pub hrv_ms: Option<f64>,
    /// Resting heart rate (bpm)
    pub resting_hr: Option<f64>,

    // Subjective fields — always unset on import, owned by the user.
    /// How the session felt
    pub feeling: Option<String>,
    /// User's own notes
    pub notes: Option<String>,

    /// When the import pipeline created this draft (RFC3339)
    pub imported_at: String,
}
