// SPDX-License-Identifier: MIT

//! Fitsync API Server
//!
//! Synchronizes workouts and recovery metrics from external fitness
//! providers (Whoop, Strava) into users' training journals.

use fitsync::{config::Config, db::FirestoreStore, providers::ProviderRegistry, AppState};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting Fitsync API");

    // Initialize Firestore-backed store
    let store = FirestoreStore::new(&config.gcp_project_id)
        .await
        .map_err(|e| format!("Failed to initialize store: {}", e))?;

    // Construct provider adapters from configured credentials
    let providers = ProviderRegistry::from_config(&config);

    let state = Arc::new(AppState {
        config: config.clone(),
        store: Arc::new(store),
        providers,
    });

    // Build router
    let app = fitsync::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("fitsync=debug".parse().expect("valid directive"))
                .add_directive("info".parse().expect("valid directive")),
        )
        .with(format)
        .init();
}
