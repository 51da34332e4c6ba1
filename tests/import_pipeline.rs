// SPDX-License-Identifier: MIT

//! Import pipeline tests: dedup under concurrency and the retry-once
//! sequence allocation discipline.

mod common;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use fitsync::db::{MemoryStore, StoreError, SyncStore};
use fitsync::error::AppError;
use fitsync::models::{
    IntegrationRecord, Provider, RecoveryMetrics, ReflectionEntry, ScheduleEntry,
};
use fitsync::services::{ImportOutcome, ImportPipeline};

use common::workout;

#[tokio::test]
async fn test_concurrent_duplicate_import_creates_one_reflection() {
    let store = Arc::new(MemoryStore::new());
    let w = workout(Provider::Whoop, "wk-race", Utc::now());

    let a = ImportPipeline::new(store.clone());
    let b = ImportPipeline::new(store.clone());
    let (ra, rb) = tokio::join!(
        a.import_workout("user-1", &w),
        b.import_workout("user-1", &w)
    );

    let outcomes = [ra.unwrap(), rb.unwrap()];
    let imported = outcomes
        .iter()
        .filter(|o| matches!(o, ImportOutcome::Imported(_)))
        .count();
    assert_eq!(imported, 1, "exactly one attempt may win");
    assert_eq!(store.reflections("user-1").len(), 1);
}

#[tokio::test]
async fn test_concurrent_distinct_imports_get_unique_sequences() {
    let store = Arc::new(MemoryStore::new());
    let start = fitsync::time_utils::parse_rfc3339("2026-03-01T07:00:00Z").unwrap();

    let run = |id: &str| {
        let pipeline = ImportPipeline::new(store.clone());
        let w = workout(Provider::Whoop, id, start);
        async move { pipeline.import_workout("user-1", &w).await }
    };
    let (r1, r2, r3, r4) = tokio::join!(run("wk-1"), run("wk-2"), run("wk-3"), run("wk-4"));

    for outcome in [r1.unwrap(), r2.unwrap(), r3.unwrap(), r4.unwrap()] {
        assert!(matches!(outcome, ImportOutcome::Imported(_)));
    }

    let reflections = store.reflections("user-1");
    let mut seqs: Vec<u32> = reflections.iter().map(|r| r.workout_sequence).collect();
    seqs.sort_unstable();
    seqs.dedup();
    assert_eq!(seqs.len(), 4, "workout sequences must be unique");

    let schedule = store.schedule_entries("user-1", "2026-03-01");
    let mut sched_seqs: Vec<u32> = schedule.iter().map(|e| e.sequence).collect();
    sched_seqs.sort_unstable();
    sched_seqs.dedup();
    assert_eq!(sched_seqs.len(), 4, "schedule sequences must be unique");
}

/// Store wrapper that fails sequence-bearing inserts a configurable number
/// of times before delegating.
struct FlakyStore {
    inner: Arc<MemoryStore>,
    schedule_failures: AtomicUsize,
    reflection_failures: AtomicUsize,
    /// When set, every sequence insert conflicts forever
    always_conflict: AtomicBool,
}

impl FlakyStore {
    fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            schedule_failures: AtomicUsize::new(0),
            reflection_failures: AtomicUsize::new(0),
            always_conflict: AtomicBool::new(false),
        }
    }

    fn take(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl SyncStore for FlakyStore {
    async fn get_integration(
        &self,
        user_id: &str,
        provider: Provider,
    ) -> Result<Option<IntegrationRecord>, StoreError> {
        self.inner.get_integration(user_id, provider).await
    }

    async fn upsert_integration(&self, record: &IntegrationRecord) -> Result<(), StoreError> {
        self.inner.upsert_integration(record).await
    }

    async fn delete_integration(
        &self,
        user_id: &str,
        provider: Provider,
    ) -> Result<(), StoreError> {
        self.inner.delete_integration(user_id, provider).await
    }

    async fn list_integrations(
        &self,
        user_id: &str,
    ) -> Result<Vec<IntegrationRecord>, StoreError> {
        self.inner.list_integrations(user_id).await
    }

    async fn find_integration_by_external_user(
        &self,
        provider: Provider,
        external_user_id: &str,
    ) -> Result<Option<IntegrationRecord>, StoreError> {
        self.inner
            .find_integration_by_external_user(provider, external_user_id)
            .await
    }

    async fn touch_last_sync(
        &self,
        user_id: &str,
        provider: Provider,
        synced_at: &str,
    ) -> Result<(), StoreError> {
        self.inner.touch_last_sync(user_id, provider, synced_at).await
    }

    async fn max_schedule_sequence(
        &self,
        user_id: &str,
        date: &str,
    ) -> Result<Option<u32>, StoreError> {
        self.inner.max_schedule_sequence(user_id, date).await
    }

    async fn insert_schedule_entry(&self, entry: &ScheduleEntry) -> Result<(), StoreError> {
        if self.always_conflict.load(Ordering::SeqCst)
            || Self::take(&self.schedule_failures)
        {
            return Err(StoreError::SequenceTaken);
        }
        self.inner.insert_schedule_entry(entry).await
    }

    async fn find_reflection_by_external_id(
        &self,
        user_id: &str,
        external_activity_id: &str,
    ) -> Result<Option<ReflectionEntry>, StoreError> {
        self.inner
            .find_reflection_by_external_id(user_id, external_activity_id)
            .await
    }

    async fn max_reflection_sequence(
        &self,
        user_id: &str,
        date: &str,
    ) -> Result<Option<u32>, StoreError> {
        self.inner.max_reflection_sequence(user_id, date).await
    }

    async fn insert_reflection_entry(
        &self,
        entry: &ReflectionEntry,
    ) -> Result<String, StoreError> {
        if self.always_conflict.load(Ordering::SeqCst)
            || Self::take(&self.reflection_failures)
        {
            return Err(StoreError::SequenceTaken);
        }
        self.inner.insert_reflection_entry(entry).await
    }

    async fn latest_reflection_for_date(
        &self,
        user_id: &str,
        date: &str,
    ) -> Result<Option<ReflectionEntry>, StoreError> {
        self.inner.latest_reflection_for_date(user_id, date).await
    }

    async fn update_reflection_recovery(
        &self,
        user_id: &str,
        external_activity_id: &str,
        metrics: &RecoveryMetrics,
    ) -> Result<(), StoreError> {
        self.inner
            .update_reflection_recovery(user_id, external_activity_id, metrics)
            .await
    }
}

#[tokio::test]
async fn test_single_sequence_conflict_is_retried() {
    let memory = Arc::new(MemoryStore::new());
    let flaky = Arc::new(FlakyStore::new(memory.clone()));
    flaky.schedule_failures.store(1, Ordering::SeqCst);
    flaky.reflection_failures.store(1, Ordering::SeqCst);

    let pipeline = ImportPipeline::new(flaky);
    let outcome = pipeline
        .import_workout("user-1", &workout(Provider::Whoop, "wk-1", Utc::now()))
        .await
        .unwrap();

    assert!(matches!(outcome, ImportOutcome::Imported(_)));
    assert_eq!(memory.reflections("user-1").len(), 1);
}

#[tokio::test]
async fn test_persistent_sequence_conflict_fails_after_one_retry() {
    let memory = Arc::new(MemoryStore::new());
    let flaky = Arc::new(FlakyStore::new(memory.clone()));
    flaky.always_conflict.store(true, Ordering::SeqCst);

    let pipeline = ImportPipeline::new(flaky);
    let err = pipeline
        .import_workout("user-1", &workout(Provider::Whoop, "wk-1", Utc::now()))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::SequenceConflict(_)));
    assert!(memory.reflections("user-1").is_empty());
}

#[tokio::test]
async fn test_cross_day_sequences_are_independent() {
    let store = Arc::new(MemoryStore::new());
    let pipeline = ImportPipeline::new(store.clone());

    let day1 = fitsync::time_utils::parse_rfc3339("2026-03-01T07:00:00Z").unwrap();
    let day2 = fitsync::time_utils::parse_rfc3339("2026-03-02T07:00:00Z").unwrap();

    for (id, start) in [("wk-1", day1), ("wk-2", day1), ("wk-3", day2)] {
        pipeline
            .import_workout("user-1", &workout(Provider::Whoop, id, start))
            .await
            .unwrap();
    }

    let reflections = store.reflections("user-1");
    let seqs: Vec<(String, u32)> = reflections
        .iter()
        .map(|r| (r.date.clone(), r.workout_sequence))
        .collect();
    assert_eq!(
        seqs,
        vec![
            ("2026-03-01".to_string(), 1),
            ("2026-03-01".to_string(), 2),
            ("2026-03-02".to_string(), 1),
        ]
    );
}
