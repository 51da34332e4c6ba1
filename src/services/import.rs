// SPDX-License-Identifier: MIT

//! Workout import pipeline.
//!
//! Imports a normalized provider workout as a pair of journal entries: a
//! schedule entry recording that the session happened and a reflection draft
//! holding the objective metrics. At-most-once per (user, workout) is
//! enforced by the store's create semantics on the reflection's dedup key,
//! not by the precheck; the precheck only short-circuits the common case.
//!
//! Sequence allocation is read-max-then-insert with exactly one retry. Losing
//! the race twice in a row means pathological contention and surfaces as an
//! error rather than looping.

use std::sync::Arc;

use crate::db::{StoreError, SyncStore};
use crate::error::{AppError, Result};
use crate::models::{ProviderWorkout, ReflectionEntry, ScheduleEntry};
use crate::time_utils::{format_utc_rfc3339, now_rfc3339, utc_date_string};

/// Result of an import attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    /// A new reflection was created; carries its entry ID.
    Imported(String),
    /// This workout was already imported for this user; nothing was written.
    AlreadyImported,
}

/// Creates journal entries from provider workouts.
#[derive(Clone)]
pub struct ImportPipeline {
    store: Arc<dyn SyncStore>,
}

impl ImportPipeline {
    pub fn new(store: Arc<dyn SyncStore>) -> Self {
        Self { store }
    }

    /// Import one workout for a user.
    ///
    /// Writes the schedule entry first, then the reflection. The reflection
    /// insert is the dedup gate: losing a duplicate race after the schedule
    /// write leaves one extra schedule entry behind, which is accepted.
    pub async fn import_workout(
        &self,
        user_id: &str,
        workout: &ProviderWorkout,
    ) -> Result<ImportOutcome> {
        if self
            .store
            .find_reflection_by_external_id(user_id, &workout.external_id)
            .await?
            .is_some()
        {
            tracing::debug!(
                user_id,
                external_id = %workout.external_id,
                "Workout already imported, skipping"
            );
            return Ok(ImportOutcome::AlreadyImported);
        }

        let date = utc_date_string(workout.start);
        let duration_minutes = duration_minutes(workout);

        self.insert_schedule(user_id, &date, workout, duration_minutes)
            .await?;

        match self
            .insert_reflection(user_id, &date, workout, duration_minutes)
            .await?
        {
            Some(entry_id) => {
                tracing::info!(
                    user_id,
                    external_id = %workout.external_id,
                    entry_id = %entry_id,
                    "Imported workout"
                );
                Ok(ImportOutcome::Imported(entry_id))
            }
            None => Ok(ImportOutcome::AlreadyImported),
        }
    }

    /// Allocate the next schedule sequence and insert, retrying the
    /// allocation once on a lost race.
    async fn insert_schedule(
        &self,
        user_id: &str,
        date: &str,
        workout: &ProviderWorkout,
        duration_minutes: Option<u32>,
    ) -> Result<()> {
        for attempt in 0..2 {
            let sequence = self
                .store
                .max_schedule_sequence(user_id, date)
                .await?
                .unwrap_or(0)
                + 1;

            let entry = ScheduleEntry {
                user_id: user_id.to_string(),
                date: date.to_string(),
                sequence,
                activity_type: workout.activity_type,
                start_time: format_utc_rfc3339(workout.start),
                duration_minutes,
                notes: format!("Imported from {}", workout.provider),
            };

            match self.store.insert_schedule_entry(&entry).await {
                Ok(()) => return Ok(()),
                Err(StoreError::SequenceTaken) if attempt == 0 => {
                    tracing::debug!(user_id, date, sequence, "Schedule sequence taken, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(AppError::SequenceConflict(format!(
            "schedule entry for {} on {}",
            user_id, date
        )))
    }

    /// Allocate the next reflection sequence and insert, retrying once on a
    /// lost sequence race. A duplicate-key conflict means another writer
    /// imported this workout concurrently; that is a clean `None`.
    async fn insert_reflection(
        &self,
        user_id: &str,
        date: &str,
        workout: &ProviderWorkout,
        duration_minutes: Option<u32>,
    ) -> Result<Option<String>> {
        for attempt in 0..2 {
            let workout_sequence = self
                .store
                .max_reflection_sequence(user_id, date)
                .await?
                .unwrap_or(0)
                + 1;

            let entry = ReflectionEntry {
                user_id: user_id.to_string(),
                date: date.to_string(),
                workout_sequence,
                external_activity_id: workout.external_id.clone(),
                provider: workout.provider,
                activity_type: workout.activity_type,
                duration_minutes,
                calories_burned: workout.calories_burned,
                average_hr: workout.average_hr,
                max_hr: workout.max_hr,
                strain_score: workout.strain_score,
                sleep_performance: None,
                hrv_ms: None,
                resting_hr: None,
                feeling: None,
                notes: None,
                imported_at: now_rfc3339(),
            };

            match self.store.insert_reflection_entry(&entry).await {
                Ok(entry_id) => return Ok(Some(entry_id)),
                Err(StoreError::SequenceTaken) if attempt == 0 => {
                    tracing::debug!(
                        user_id,
                        date,
                        workout_sequence,
                        "Reflection sequence taken, retrying"
                    );
                }
                Err(StoreError::DuplicateActivity) => {
                    tracing::debug!(
                        user_id,
                        external_id = %workout.external_id,
                        "Lost duplicate-import race"
                    );
                    return Ok(None);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(AppError::SequenceConflict(format!(
            "reflection entry for {} on {}",
            user_id, date
        )))
    }
}

/// Whole minutes between start and end, rounded; spans that round to zero
/// (including non-positive ones) map to `None`, never a zero-length session.
fn duration_minutes(workout: &ProviderWorkout) -> Option<u32> {
    let seconds = (workout.end - workout.start).num_seconds();
    if seconds <= 0 {
        return None;
    }
    let minutes = ((seconds as f64) / 60.0).round() as u32;
    (minutes > 0).then_some(minutes)
}
