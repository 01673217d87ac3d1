// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Meritocracy Board API Server
//!
//! Students request points for their accomplishments; admins review the
//! requests; everyone can see the leaderboard.

use meritocracy_board::{
    config::{Config, StorageBackend},
    db::{Database, FirestoreDb, MemoryDb},
    services::{
        CategorySuggester, FirebaseAuth, HttpCategorySuggester, IdentityProvider,
        KeywordSuggester, MemoryIdentity, StudentDirectory,
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
    tracing::info!(port = config.port, "Starting Meritocracy Board API");

    let db: Arc<dyn Database> = match config.storage_backend {
        StorageBackend::Firestore => Arc::new(
            FirestoreDb::new(&config.gcp_project_id)
                .await
                .expect("Failed to connect to Firestore"),
        ),
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; data is lost on restart");
            Arc::new(MemoryDb::new())
        }
    };

    if let Some(alternate) = &config.alternate_store {
        tracing::info!(
            db_name = %alternate.db_name,
            "MongoDB connection configured; not used by the request workflow"
        );
    }

    let identity: Arc<dyn IdentityProvider> = match &config.firebase_api_key {
        Some(api_key) => Arc::new(FirebaseAuth::new(api_key.clone())),
        None => {
            tracing::warn!("FIREBASE_API_KEY not set; accounts are kept in memory");
            Arc::new(MemoryIdentity::new())
        }
    };

    let suggester: Arc<dyn CategorySuggester> = match &config.suggest_api_url {
        Some(url) => Arc::new(HttpCategorySuggester::new(url.clone())),
        None => {
            tracing::info!("SUGGEST_API_URL not set; using keyword category suggestions");
            Arc::new(KeywordSuggester)
        }
    };

    // Load the student dataset
    let students = match &config.student_data_path {
        Some(path) => {
            tracing::info!(path = %path, "Loading student data");
            StudentDirectory::load_from_file(path).expect("Failed to load student data")
        }
        None => StudentDirectory::builtin().expect("Built-in student data is invalid"),
    };

    // Build shared state
    let state = Arc::new(AppState::new(
        config.clone(),
        db,
        identity,
        suggester,
        students,
    ));

    // Build router
    let app = meritocracy_board::routes::create_router(state);

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
                .add_directive("meritocracy_board=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
