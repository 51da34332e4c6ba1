// SPDX-License-Identifier: MIT

//! Sync orchestration: pull a window of workouts from a provider and run each
//! through the import pipeline. Also applies recovery-metric updates pushed
//! by webhooks onto the day's most recent reflection.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::db::SyncStore;
use crate::error::Result;
use crate::models::Provider;
use crate::providers::ProviderRegistry;
use crate::services::import::{ImportOutcome, ImportPipeline};
use crate::services::tokens::TokenManager;
use crate::time_utils::{now_rfc3339, utc_date_string};

/// Outcome of one pull sync.
#[derive(Debug, Clone, Serialize)]
pub struct SyncSummary {
    /// Workouts the provider returned for the window
    pub found: usize,
    /// New reflections created (the rest were already imported)
    pub imported: usize,
    /// Entry IDs of the new reflections
    pub entry_ids: Vec<String>,
}

/// Pull-sync orchestrator.
#[derive(Clone)]
pub struct SyncService {
    store: Arc<dyn SyncStore>,
    providers: ProviderRegistry,
    tokens: TokenManager,
    pipeline: ImportPipeline,
}

impl SyncService {
    pub fn new(store: Arc<dyn SyncStore>, providers: ProviderRegistry) -> Self {
        Self {
            tokens: TokenManager::new(store.clone(), providers.clone()),
            pipeline: ImportPipeline::new(store.clone()),
            store,
            providers,
        }
    }

    /// Fetch workouts in [start, end] from the provider and import them.
    ///
    /// Already-imported workouts are skipped; `last_sync_at` is touched only
    /// when the whole window was processed without error.
    pub async fn sync_range(
        &self,
        user_id: &str,
        provider: Provider,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<SyncSummary> {
        let record = self.tokens.with_valid_token(user_id, provider).await?;
        let adapter = self.providers.get(provider)?;

        let workouts = adapter
            .fetch_workouts(&record.access_token, start, end)
            .await?;
        let found = workouts.len();

        let mut entry_ids = Vec::new();
        for workout in &workouts {
            if let ImportOutcome::Imported(entry_id) =
                self.pipeline.import_workout(user_id, workout).await?
            {
                entry_ids.push(entry_id);
            }
        }

        self.store
            .touch_last_sync(user_id, provider, &now_rfc3339())
            .await?;

        let summary = SyncSummary {
            found,
            imported: entry_ids.len(),
            entry_ids,
        };
        tracing::info!(
            user_id,
            provider = %provider,
            found = summary.found,
            imported = summary.imported,
            "Sync completed"
        );
        Ok(summary)
    }

    /// Pull today's recovery metrics from the provider and merge them onto
    /// the user's most recent reflection for today. Returns whether anything
    /// was updated; no same-day reflection (or no metrics yet) is a no-op.
    pub async fn apply_recovery_update(
        &self,
        user_id: &str,
        provider: Provider,
    ) -> Result<bool> {
        let record = self.tokens.with_valid_token(user_id, provider).await?;
        let adapter = self.providers.get(provider)?;

        let today = Utc::now().date_naive();
        let Some(metrics) = adapter
            .fetch_latest_recovery(&record.access_token, today)
            .await?
        else {
            return Ok(false);
        };

        let date = utc_date_string(Utc::now());
        let Some(reflection) = self.store.latest_reflection_for_date(user_id, &date).await?
        else {
            tracing::debug!(user_id, date, "No reflection today, dropping recovery update");
            return Ok(false);
        };

        self.store
            .update_reflection_recovery(user_id, &reflection.external_activity_id, &metrics)
            .await?;

        tracing::info!(
            user_id,
            provider = %provider,
            entry = %reflection.external_activity_id,
            "Applied recovery metrics to reflection"
        );
        Ok(true)
    }
}
