// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Classroom-Bridge API Server
//!
//! Signs users in with Google and serves their Classroom courses, rosters,
//! coursework and submissions to the dashboard frontend.

use classroom_bridge::{
    config::Config,
    db::{CredentialStore, FirestoreDb, MemoryStore},
    services::{
        ClassroomClientFactory, ClassroomService, CredentialVault, CryptoEnvelope,
        GoogleOAuthClient,
    },
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting Classroom-Bridge API");

    // The key is only ever held by the envelope
    let crypto =
        CryptoEnvelope::new(&config.encryption_key).expect("Failed to load encryption key");

    // Pick the credential store
    let store: Arc<dyn CredentialStore> = match &config.gcp_project_id {
        Some(project_id) => Arc::new(
            FirestoreDb::new(project_id)
                .await
                .expect("Failed to connect to Firestore"),
        ),
        None => {
            tracing::warn!("GCP_PROJECT_ID not set, credentials are kept in memory only");
            Arc::new(MemoryStore::new())
        }
    };
    let vault = CredentialVault::new(store, crypto);

    // One HTTP client for all Google calls, with a per-call deadline
    let http = reqwest::Client::builder()
        .timeout(config.remote_call_timeout)
        .build()?;

    let oauth = GoogleOAuthClient::from_config(http.clone(), &config);
    let client_factory = ClassroomClientFactory::new(http, oauth.clone(), vault.clone());
    let classroom = ClassroomService::from_config(&config);
    tracing::info!(
        fanout = config.submission_fanout_concurrency,
        aggregate_timeout_secs = config.aggregate_timeout.as_secs(),
        "Classroom service initialized"
    );

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        vault,
        oauth,
        client_factory,
        classroom,
    });

    // Build router
    let app = classroom_bridge::routes::create_router(state);

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
                .add_directive("classroom_bridge=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
