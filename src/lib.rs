// SPDX-License-Identifier: MIT

//! Fitsync: fitness integration synchronization engine.
//!
//! Connects external wearable/fitness providers (Whoop, Strava) to a user's
//! training journal: OAuth token lifecycles, pull sync, push webhooks, and
//! at-most-once import of external workouts into the daily schedule.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod providers;
pub mod routes;
pub mod services;
pub mod time_utils;

use std::sync::Arc;

use config::Config;
use db::SyncStore;
use providers::ProviderRegistry;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn SyncStore>,
    pub providers: ProviderRegistry,
}
