// SPDX-License-Identifier: MIT

//! In-memory store for tests and local development.
//!
//! Enforces the same uniqueness constraints as the Firestore implementation
//! so pipeline semantics (dedup, sequence conflicts) are exercised for real.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::db::store::{apply_recovery, StoreError, SyncStore};
use crate::models::{
    IntegrationRecord, Provider, RecoveryMetrics, ReflectionEntry, ScheduleEntry,
};

#[derive(Default)]
struct Inner {
    /// (user_id, provider) → record
    integrations: HashMap<(String, Provider), IntegrationRecord>,
    /// (user_id, date, sequence) → entry
    schedule: HashMap<(String, String, u32), ScheduleEntry>,
    /// (user_id, external_activity_id) → entry
    reflections: HashMap<(String, String), ReflectionEntry>,
    /// Taken (user_id, date, workout_sequence) slots
    reflection_sequences: HashSet<(String, String, u32)>,
}

/// In-memory `SyncStore` implementation.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All schedule entries for a user/date, ordered by sequence. Test helper.
    pub fn schedule_entries(&self, user_id: &str, date: &str) -> Vec<ScheduleEntry> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        let mut entries: Vec<ScheduleEntry> = inner
            .schedule
            .values()
            .filter(|e| e.user_id == user_id && e.date == date)
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.sequence);
        entries
    }

    /// All reflections for a user, ordered by date then sequence. Test helper.
    pub fn reflections(&self, user_id: &str) -> Vec<ReflectionEntry> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        let mut entries: Vec<ReflectionEntry> = inner
            .reflections
            .values()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| {
            a.date
                .cmp(&b.date)
                .then(a.workout_sequence.cmp(&b.workout_sequence))
        });
        entries
    }
}

#[async_trait]
impl SyncStore for MemoryStore {
    async fn get_integration(
        &self,
        user_id: &str,
        provider: Provider,
    ) -> Result<Option<IntegrationRecord>, StoreError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(inner
            .integrations
            .get(&(user_id.to_string(), provider))
            .cloned())
    }

    async fn upsert_integration(&self, record: &IntegrationRecord) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        inner
            .integrations
            .insert((record.user_id.clone(), record.provider), record.clone());
        Ok(())
    }

    async fn delete_integration(
        &self,
        user_id: &str,
        provider: Provider,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        inner.integrations.remove(&(user_id.to_string(), provider));
        Ok(())
    }

    async fn list_integrations(
        &self,
        user_id: &str,
    ) -> Result<Vec<IntegrationRecord>, StoreError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        let mut records: Vec<IntegrationRecord> = inner
            .integrations
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.provider.as_str());
        Ok(records)
    }

    async fn find_integration_by_external_user(
        &self,
        provider: Provider,
        external_user_id: &str,
    ) -> Result<Option<IntegrationRecord>, StoreError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(inner
            .integrations
            .values()
            .find(|r| r.provider == provider && r.external_user_id == external_user_id)
            .cloned())
    }

    async fn touch_last_sync(
        &self,
        user_id: &str,
        provider: Provider,
        synced_at: &str,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        if let Some(record) = inner
            .integrations
            .get_mut(&(user_id.to_string(), provider))
        {
            record.last_sync_at = Some(synced_at.to_string());
        }
        Ok(())
    }

    async fn max_schedule_sequence(
        &self,
        user_id: &str,
        date: &str,
    ) -> Result<Option<u32>, StoreError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(inner
            .schedule
            .keys()
            .filter(|(u, d, _)| u == user_id && d == date)
            .map(|(_, _, seq)| *seq)
            .max())
    }

    async fn insert_schedule_entry(&self, entry: &ScheduleEntry) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        let key = (entry.user_id.clone(), entry.date.clone(), entry.sequence);
        if inner.schedule.contains_key(&key) {
            return Err(StoreError::SequenceTaken);
        }
        inner.schedule.insert(key, entry.clone());
        Ok(())
    }

    async fn find_reflection_by_external_id(
        &self,
        user_id: &str,
        external_activity_id: &str,
    ) -> Result<Option<ReflectionEntry>, StoreError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(inner
            .reflections
            .get(&(user_id.to_string(), external_activity_id.to_string()))
            .cloned())
    }

    async fn max_reflection_sequence(
        &self,
        user_id: &str,
        date: &str,
    ) -> Result<Option<u32>, StoreError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(inner
            .reflection_sequences
            .iter()
            .filter(|(u, d, _)| u == user_id && d == date)
            .map(|(_, _, seq)| *seq)
            .max())
    }

    async fn insert_reflection_entry(
        &self,
        entry: &ReflectionEntry,
    ) -> Result<String, StoreError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");

        let seq_key = (
            entry.user_id.clone(),
            entry.date.clone(),
            entry.workout_sequence,
        );
        if inner.reflection_sequences.contains(&seq_key) {
            return Err(StoreError::SequenceTaken);
        }

        let dedup_key = (entry.user_id.clone(), entry.external_activity_id.clone());
        if inner.reflections.contains_key(&dedup_key) {
            return Err(StoreError::DuplicateActivity);
        }

        inner.reflection_sequences.insert(seq_key);
        inner.reflections.insert(dedup_key, entry.clone());
        Ok(format!("{}_{}", entry.user_id, entry.external_activity_id))
    }

    async fn latest_reflection_for_date(
        &self,
        user_id: &str,
        date: &str,
    ) -> Result<Option<ReflectionEntry>, StoreError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(inner
            .reflections
            .values()
            .filter(|e| e.user_id == user_id && e.date == date)
            .max_by_key(|e| e.workout_sequence)
            .cloned())
    }

    async fn update_reflection_recovery(
        &self,
        user_id: &str,
        external_activity_id: &str,
        metrics: &RecoveryMetrics,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        let key = (user_id.to_string(), external_activity_id.to_string());
        let entry = inner
            .reflections
            .get_mut(&key)
            .ok_or_else(|| StoreError::Backend("reflection not found".to_string()))?;
        apply_recovery(entry, metrics);
        Ok(())
    }
}
