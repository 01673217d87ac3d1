// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use meritocracy_board::config::Config;
use meritocracy_board::db::{Database, FirestoreDb, MemoryDb};
use meritocracy_board::models::{Role, User};
use meritocracy_board::routes::create_router;
use meritocracy_board::services::{
    IdentityProvider, KeywordSuggester, MemoryIdentity, StudentDirectory,
};
use meritocracy_board::AppState;
use serde::Serialize;
use std::sync::Arc;
use tower::ServiceExt;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Router plus handles on its in-memory backends.
#[allow(dead_code)]
pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub db: MemoryDb,
    pub identity: MemoryIdentity,
}

/// Create a test app over in-memory storage and identity.
#[allow(dead_code)]
pub fn create_test_app() -> TestApp {
    create_test_app_with_config(Config::test_default())
}

#[allow(dead_code)]
pub fn create_test_app_with_config(config: Config) -> TestApp {
    let db = MemoryDb::new();
    let identity = MemoryIdentity::new();
    let students = StudentDirectory::builtin().expect("built-in student data");

    let state = Arc::new(AppState::new(
        config,
        Arc::new(db.clone()),
        Arc::new(identity.clone()),
        Arc::new(KeywordSuggester),
        students,
    ));

    TestApp {
        router: create_router(state.clone()),
        state,
        db,
        identity,
    }
}

/// Create a test JWT token (mirrors the middleware's claims).
#[allow(dead_code)]
pub fn create_test_jwt(uid: &str, signing_key: &[u8], ttl_secs: i64) -> String {
    use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
    use std::time::{SystemTime, UNIX_EPOCH};

    #[derive(Serialize)]
    struct Claims {
        sub: String,
        exp: i64,
        iat: i64,
    }

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64;

    encode(
        &Header::new(Algorithm::HS256),
        &Claims {
            sub: uid.to_string(),
            exp: now + ttl_secs,
            iat: now,
        },
        &EncodingKey::from_secret(signing_key),
    )
    .unwrap()
}

/// Register a principal with a profile record; returns `(uid, bearer token)`.
#[allow(dead_code)]
pub async fn seed_user(app: &TestApp, email: &str, name: &str, role: Role) -> (String, String) {
    let principal = app
        .identity
        .create_principal(email, "hunter22", Some(name))
        .await
        .unwrap();
    app.db
        .upsert_user(&User {
            uid: principal.uid.clone(),
            email: Some(email.to_string()),
            name: Some(name.to_string()),
            role,
        })
        .await
        .unwrap();

    let token = create_test_jwt(&principal.uid, &app.state.config.jwt_signing_key, 3600);
    (principal.uid, token)
}

/// Send a request and decode the JSON body (`Null` when empty).
#[allow(dead_code)]
pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), 1 << 20)
        .await
        .unwrap();
    let json = if body.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

#[allow(dead_code)]
pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

#[allow(dead_code)]
pub fn post_json(uri: &str, token: Option<&str>, body: serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}
