// SPDX-License-Identifier: MIT

//! The `SyncStore` trait: persistent-store operations the sync engine needs.
//!
//! Two implementations exist: [`crate::db::FirestoreStore`] for production
//! and [`crate::db::MemoryStore`] for tests. Business logic is identical
//! against either — there is no "mock mode" branching anywhere else.

use async_trait::async_trait;

use crate::error::AppError;
use crate::models::{
    IntegrationRecord, Provider, RecoveryMetrics, ReflectionEntry, ScheduleEntry,
};

/// Store-level errors. Conflicts are part of the contract — the import
/// pipeline's retry-once discipline depends on them being distinguishable.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The (user_id, date, sequence) slot was already taken by a concurrent
    /// writer.
    #[error("Sequence already taken")]
    SequenceTaken,

    /// A reflection with this (user_id, external_activity_id) already exists.
    #[error("Workout already imported")]
    DuplicateActivity,

    #[error("Store backend error: {0}")]
    Backend(String),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::SequenceTaken => {
                AppError::SequenceConflict("sequence slot taken".to_string())
            }
            StoreError::DuplicateActivity => {
                AppError::Database("unexpected duplicate activity".to_string())
            }
            StoreError::Backend(msg) => AppError::Database(msg),
        }
    }
}

/// Persistent store used by the sync engine.
#[async_trait]
pub trait SyncStore: Send + Sync {
    // ─── Integration records ─────────────────────────────────────

    async fn get_integration(
        &self,
        user_id: &str,
        provider: Provider,
    ) -> Result<Option<IntegrationRecord>, StoreError>;

    /// Create or replace the record for (user_id, provider).
    async fn upsert_integration(&self, record: &IntegrationRecord) -> Result<(), StoreError>;

    async fn delete_integration(&self, user_id: &str, provider: Provider)
        -> Result<(), StoreError>;

    async fn list_integrations(&self, user_id: &str)
        -> Result<Vec<IntegrationRecord>, StoreError>;

    /// Resolve an inbound webhook's external user identifier to a record.
    async fn find_integration_by_external_user(
        &self,
        provider: Provider,
        external_user_id: &str,
    ) -> Result<Option<IntegrationRecord>, StoreError>;

    /// Update only `last_sync_at` for (user_id, provider).
    async fn touch_last_sync(
        &self,
        user_id: &str,
        provider: Provider,
        synced_at: &str,
    ) -> Result<(), StoreError>;

    // ─── Schedule entries ────────────────────────────────────────

    /// Highest sequence currently taken for (user_id, date), if any.
    async fn max_schedule_sequence(
        &self,
        user_id: &str,
        date: &str,
    ) -> Result<Option<u32>, StoreError>;

    /// Insert a schedule entry. Fails with [`StoreError::SequenceTaken`] when
    /// (user_id, date, sequence) is already occupied.
    async fn insert_schedule_entry(&self, entry: &ScheduleEntry) -> Result<(), StoreError>;

    // ─── Reflection entries ──────────────────────────────────────

    /// Dedup lookup by the external activity ID.
    async fn find_reflection_by_external_id(
        &self,
        user_id: &str,
        external_activity_id: &str,
    ) -> Result<Option<ReflectionEntry>, StoreError>;

    /// Highest workout_sequence currently taken for (user_id, date), if any.
    async fn max_reflection_sequence(
        &self,
        user_id: &str,
        date: &str,
    ) -> Result<Option<u32>, StoreError>;

    /// Insert a reflection entry, returning its document ID. Fails with
    /// [`StoreError::SequenceTaken`] on a workout_sequence collision and
    /// [`StoreError::DuplicateActivity`] when the dedup key already exists.
    async fn insert_reflection_entry(&self, entry: &ReflectionEntry)
        -> Result<String, StoreError>;

    /// Most recent (highest workout_sequence) reflection for (user_id, date).
    async fn latest_reflection_for_date(
        &self,
        user_id: &str,
        date: &str,
    ) -> Result<Option<ReflectionEntry>, StoreError>;

    /// Merge recovery metrics onto an existing reflection. Only fields
    /// present in `metrics` are overwritten.
    async fn update_reflection_recovery(
        &self,
        user_id: &str,
        external_activity_id: &str,
        metrics: &RecoveryMetrics,
    ) -> Result<(), StoreError>;
}

/// Apply non-empty recovery fields onto an entry (shared by store impls).
pub(crate) fn apply_recovery(entry: &mut ReflectionEntry, metrics: &RecoveryMetrics) {
    if metrics.sleep_performance.is_some() {
        entry.sleep_performance = metrics.sleep_performance;
    }
    if metrics.hrv_ms.is_some() {
        entry.hrv_ms = metrics.hrv_ms;
    }
    if metrics.resting_hr.is_some() {
        entry.resting_hr = metrics.resting_hr;
    }
}
