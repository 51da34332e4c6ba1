// SPDX-License-Identifier: MIT

//! Firestore-backed `SyncStore` implementation.
//!
//! Document IDs encode the uniqueness constraints the sync engine relies on:
//! - integrations:         `{user_id}_{provider}`
//! - schedule_entries:     `{user_id}_{date}_{sequence}`
//! - reflection_entries:   `{user_id}_{external_activity_id}` (dedup key)
//! - reflection_sequences: `{user_id}_{date}_{workout_sequence}`
//!
//! Inserts use create semantics (`insert()`), so a taken slot surfaces as a
//! conflict instead of a silent overwrite.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::db::collections;
use crate::db::store::{apply_recovery, StoreError, SyncStore};
use crate::models::{
    IntegrationRecord, Provider, RecoveryMetrics, ReflectionEntry, ScheduleEntry,
};

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreStore {
    client: firestore::FirestoreDb,
}

/// Reservation marker enforcing workout_sequence uniqueness (the reflection
/// document itself is keyed by the dedup key, so it can't do double duty).
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SequenceMarker {
    user_id: String,
    date: String,
    sequence: u32,
}

fn backend_err(e: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(e.to_string())
}

/// Whether a Firestore error means "document already exists".
fn is_conflict(e: &firestore::errors::FirestoreError) -> bool {
    matches!(
        e,
        firestore::errors::FirestoreError::DataConflictError(_)
    ) || e.to_string().contains("already exists")
}

fn integration_doc_id(user_id: &str, provider: Provider) -> String {
    format!("{}_{}", user_id, provider.as_str())
}

impl FirestoreStore {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, StoreError> {
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::new_emulator(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| backend_err(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self { client })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn new_emulator(project_id: &str) -> Result<Self, StoreError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| backend_err(format!("Failed to connect to Firestore Emulator: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl SyncStore for FirestoreStore {
    async fn get_integration(
        &self,
        user_id: &str,
        provider: Provider,
    ) -> Result<Option<IntegrationRecord>, StoreError> {
        self.client
            .fluent()
            .select()
            .by_id_in(collections::INTEGRATIONS)
            .obj()
            .one(&integration_doc_id(user_id, provider))
            .await
            .map_err(backend_err)
    }

    async fn upsert_integration(&self, record: &IntegrationRecord) -> Result<(), StoreError> {
        let _: IntegrationRecord = self
            .client
            .fluent()
            .update()
            .in_col(collections::INTEGRATIONS)
            .document_id(integration_doc_id(&record.user_id, record.provider))
            .object(record)
            .execute()
            .await
            .map_err(backend_err)?;
        Ok(())
    }

    async fn delete_integration(
        &self,
        user_id: &str,
        provider: Provider,
    ) -> Result<(), StoreError> {
        self.client
            .fluent()
            .delete()
            .from(collections::INTEGRATIONS)
            .document_id(integration_doc_id(user_id, provider))
            .execute()
            .await
            .map_err(backend_err)
    }

    async fn list_integrations(
        &self,
        user_id: &str,
    ) -> Result<Vec<IntegrationRecord>, StoreError> {
        let user_id = user_id.to_string();
        self.client
            .fluent()
            .select()
            .from(collections::INTEGRATIONS)
            .filter(move |q| q.for_all([q.field("user_id").eq(user_id.clone())]))
            .obj()
            .query()
            .await
            .map_err(backend_err)
    }

    async fn find_integration_by_external_user(
        &self,
        provider: Provider,
        external_user_id: &str,
    ) -> Result<Option<IntegrationRecord>, StoreError> {
        let external_user_id = external_user_id.to_string();
        let records: Vec<IntegrationRecord> = self
            .client
            .fluent()
            .select()
            .from(collections::INTEGRATIONS)
            .filter(move |q| {
                q.for_all([
                    q.field("provider").eq(provider.as_str()),
                    q.field("external_user_id").eq(external_user_id.clone()),
                ])
            })
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(backend_err)?;

        Ok(records.into_iter().next())
    }

    async fn touch_last_sync(
        &self,
        user_id: &str,
        provider: Provider,
        synced_at: &str,
    ) -> Result<(), StoreError> {
        // Read-modify-write; only this field changes, and a racing token
        // refresh writing the whole record is the later-write-wins case the
        // design accepts.
        let Some(mut record) = self.get_integration(user_id, provider).await? else {
            return Ok(());
        };
        record.last_sync_at = Some(synced_at.to_string());
        self.upsert_integration(&record).await
    }

    async fn max_schedule_sequence(
        &self,
        user_id: &str,
        date: &str,
    ) -> Result<Option<u32>, StoreError> {
        let user_id = user_id.to_string();
        let date = date.to_string();
        let entries: Vec<ScheduleEntry> = self
            .client
            .fluent()
            .select()
            .from(collections::SCHEDULE_ENTRIES)
            .filter(move |q| {
                q.for_all([
                    q.field("user_id").eq(user_id.clone()),
                    q.field("date").eq(date.clone()),
                ])
            })
            .order_by([(
                "sequence",
                firestore::FirestoreQueryDirection::Descending,
            )])
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(backend_err)?;

        Ok(entries.into_iter().next().map(|e| e.sequence))
    }

    async fn insert_schedule_entry(&self, entry: &ScheduleEntry) -> Result<(), StoreError> {
        let doc_id = format!("{}_{}_{}", entry.user_id, entry.date, entry.sequence);
        let result: Result<ScheduleEntry, _> = self
            .client
            .fluent()
            .insert()
            .into(collections::SCHEDULE_ENTRIES)
            .document_id(&doc_id)
            .object(entry)
            .execute()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(ref e) if is_conflict(e) => Err(StoreError::SequenceTaken),
            Err(e) => Err(backend_err(e)),
        }
    }

    async fn find_reflection_by_external_id(
        &self,
        user_id: &str,
        external_activity_id: &str,
    ) -> Result<Option<ReflectionEntry>, StoreError> {
        self.client
            .fluent()
            .select()
            .by_id_in(collections::REFLECTION_ENTRIES)
            .obj()
            .one(&format!("{}_{}", user_id, external_activity_id))
            .await
            .map_err(backend_err)
    }

    async fn max_reflection_sequence(
        &self,
        user_id: &str,
        date: &str,
    ) -> Result<Option<u32>, StoreError> {
        let user_id = user_id.to_string();
        let date = date.to_string();
        let markers: Vec<SequenceMarker> = self
            .client
            .fluent()
            .select()
            .from(collections::REFLECTION_SEQUENCES)
            .filter(move |q| {
                q.for_all([
                    q.field("user_id").eq(user_id.clone()),
                    q.field("date").eq(date.clone()),
                ])
            })
            .order_by([(
                "sequence",
                firestore::FirestoreQueryDirection::Descending,
            )])
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(backend_err)?;

        Ok(markers.into_iter().next().map(|m| m.sequence))
    }

    async fn insert_reflection_entry(
        &self,
        entry: &ReflectionEntry,
    ) -> Result<String, StoreError> {
        // 1. Reserve the sequence slot. A conflict here is a concurrent
        //    writer racing for the same workout_sequence.
        let marker = SequenceMarker {
            user_id: entry.user_id.clone(),
            date: entry.date.clone(),
            sequence: entry.workout_sequence,
        };
        let marker_id = format!(
            "{}_{}_{}",
            entry.user_id, entry.date, entry.workout_sequence
        );
        let reserved: Result<SequenceMarker, _> = self
            .client
            .fluent()
            .insert()
            .into(collections::REFLECTION_SEQUENCES)
            .document_id(&marker_id)
            .object(&marker)
            .execute()
            .await;

        match reserved {
            Ok(_) => {}
            Err(ref e) if is_conflict(e) => return Err(StoreError::SequenceTaken),
            Err(e) => return Err(backend_err(e)),
        }

        // 2. Create the reflection keyed by the dedup key. A conflict here is
        //    a duplicate import; the stale marker just leaves a sequence gap,
        //    which is allowed.
        let doc_id = format!("{}_{}", entry.user_id, entry.external_activity_id);
        let created: Result<ReflectionEntry, _> = self
            .client
            .fluent()
            .insert()
            .into(collections::REFLECTION_ENTRIES)
            .document_id(&doc_id)
            .object(entry)
            .execute()
            .await;

        match created {
            Ok(_) => Ok(doc_id),
            Err(ref e) if is_conflict(e) => Err(StoreError::DuplicateActivity),
            Err(e) => Err(backend_err(e)),
        }
    }

    async fn latest_reflection_for_date(
        &self,
        user_id: &str,
        date: &str,
    ) -> Result<Option<ReflectionEntry>, StoreError> {
        let user_id = user_id.to_string();
        let date = date.to_string();
        let entries: Vec<ReflectionEntry> = self
            .client
            .fluent()
            .select()
            .from(collections::REFLECTION_ENTRIES)
            .filter(move |q| {
                q.for_all([
                    q.field("user_id").eq(user_id.clone()),
                    q.field("date").eq(date.clone()),
                ])
            })
            .order_by([(
                "workout_sequence",
                firestore::FirestoreQueryDirection::Descending,
            )])
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(backend_err)?;

        Ok(entries.into_iter().next())
    }

    async fn update_reflection_recovery(
        &self,
        user_id: &str,
        external_activity_id: &str,
        metrics: &RecoveryMetrics,
    ) -> Result<(), StoreError> {
        let mut entry = self
            .find_reflection_by_external_id(user_id, external_activity_id)
            .await?
            .ok_or_else(|| StoreError::Backend("reflection not found".to_string()))?;

        apply_recovery(&mut entry, metrics);

        let _: ReflectionEntry = self
            .client
            .fluent()
            .update()
            .in_col(collections::REFLECTION_ENTRIES)
            .document_id(format!("{}_{}", user_id, external_activity_id))
            .object(&entry)
            .execute()
            .await
            .map_err(backend_err)?;
        Ok(())
    }
}
