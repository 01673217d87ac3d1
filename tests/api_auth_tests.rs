// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API authentication, role gate and CORS tests.
//!
//! These tests verify that:
//! 1. Protected routes reject requests without valid sessions
//! 2. Role-gated routes deny users with the wrong role (never redirect them)
//! 3. CORS preflight requests return correct headers

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use meritocracy_board::models::Role;
use tower::ServiceExt;

mod common;
use common::{create_test_app, create_test_jwt, get, post_json, seed_user, send};

#[tokio::test]
async fn test_protected_route_without_token() {
    let app = create_test_app();

    let (status, body) = send(&app.router, get("/api/me", None)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");
    assert_eq!(body["details"], "/login?redirect=%2Fapi%2Fme");
}

#[tokio::test]
async fn test_protected_route_with_invalid_token() {
    let app = create_test_app();

    let (status, body) = send(&app.router, get("/api/me", Some("invalid.token.here"))).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid_token");
}

#[tokio::test]
async fn test_expired_token_rejected() {
    let app = create_test_app();
    let (uid, _) = seed_user(&app, "ann@example.com", "Ann", Role::Student).await;
    let expired = create_test_jwt(&uid, &app.state.config.jwt_signing_key, -3600);

    let (status, body) = send(&app.router, get("/api/me", Some(&expired))).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid_token");
}

#[tokio::test]
async fn test_valid_token_without_profile() {
    let app = create_test_app();
    let token = create_test_jwt("no-profile-uid", &app.state.config.jwt_signing_key, 3600);

    let (status, body) = send(&app.router, get("/api/me", Some(&token))).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "auth_error");
}

#[tokio::test]
async fn test_protected_route_with_valid_token() {
    let app = create_test_app();
    let (uid, token) = seed_user(&app, "ann@example.com", "Ann Lee", Role::Student).await;

    let (status, body) = send(&app.router, get("/api/me", Some(&token))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["uid"], uid.as_str());
    assert_eq!(body["role"], "student");
    assert_eq!(body["name"], "Ann Lee");
}

#[tokio::test]
async fn test_role_change_applies_to_next_request() {
    use meritocracy_board::db::Database;
    use meritocracy_board::models::User;

    let app = create_test_app();
    let (uid, token) = seed_user(&app, "ann@example.com", "Ann", Role::Student).await;

    let (status, _) = send(&app.router, get("/api/admin/requests", Some(&token))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    app.db
        .upsert_user(&User {
            uid,
            email: Some("ann@example.com".to_string()),
            name: Some("Ann".to_string()),
            role: Role::Admin,
        })
        .await
        .unwrap();

    let (status, _) = send(&app.router, get("/api/admin/requests", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_student_denied_admin_routes() {
    let app = create_test_app();
    let (_, token) = seed_user(&app, "ann@example.com", "Ann", Role::Student).await;

    let (status, body) = send(&app.router, get("/api/admin/requests", Some(&token))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "access_denied");

    let (status, _) = send(
        &app.router,
        post_json(
            "/api/admin/requests/some-id/approve",
            Some(&token),
            serde_json::json!({ "pointsAwarded": 10 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_denied_student_routes() {
    let app = create_test_app();
    let (_, token) = seed_user(&app, "root@example.com", "Root", Role::Admin).await;

    let (status, body) = send(
        &app.router,
        post_json(
            "/api/requests",
            Some(&token),
            serde_json::json!({ "reason": "Admins cannot request points" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["details"], "This page is only available to students.");
    assert_eq!(app.db.write_count(), 1); // only the seeded profile
}

#[tokio::test]
async fn test_unset_role_denied_everywhere_gated() {
    let app = create_test_app();
    let (_, token) = seed_user(&app, "new@example.com", "Newbie", Role::Unset).await;

    let (status, _) = send(&app.router, get("/api/admin/requests", Some(&token))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app.router, get("/api/me", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["role"].is_null());
}

#[tokio::test]
async fn test_shell_reports_gate_and_nav() {
    let app = create_test_app();
    let (_, token) = seed_user(&app, "diana@example.com", "Diana Prince", Role::Student).await;

    let (status, body) = send(
        &app.router,
        get("/api/shell?path=/admin/dashboard", Some(&token)),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["gate"]["decision"], "denied");
    assert_eq!(body["initials"], "DI");
    let labels: Vec<&str> = body["nav"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["label"].as_str().unwrap())
        .collect();
    assert!(labels.contains(&"Request Points"));
    assert!(!labels.contains(&"Admin Dashboard"));
}

#[tokio::test]
async fn test_profile_and_suggestions() {
    let app = create_test_app();
    let (_, token) = seed_user(&app, "diana@example.com", "Diana Prince", Role::Student).await;

    let (status, body) = send(&app.router, get("/api/profile", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Diana Prince");
    assert_eq!(body["totalPoints"], 270);
    assert_eq!(body["rank"], 2);

    let (status, body) = send(
        &app.router,
        post_json(
            "/api/suggest-categories",
            Some(&token),
            serde_json::json!({ "description": "Captained the robotics team" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["categories"],
        serde_json::json!(["Leadership", "Technology", "Sports"])
    );
}

#[tokio::test]
async fn test_cors_preflight() {
    let app = create_test_app();

    let response = app
        .router
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/api/me")
                .header(header::ORIGIN, "http://localhost:9002")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    // OPTIONS should return 200 (CORS preflight success)
    assert_eq!(response.status(), StatusCode::OK);

    // Should have CORS headers
    assert!(response
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    assert!(response
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_METHODS));
}

#[tokio::test]
async fn test_public_routes_no_auth_required() {
    let app = create_test_app();

    let (status, body) = send(&app.router, get("/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = send(&app.router, get("/leaderboard", None)).await;
    assert_eq!(status, StatusCode::OK);
    let totals: Vec<u64> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["totalPoints"].as_u64().unwrap())
        .collect();
    assert_eq!(totals, vec![370, 270, 220, 110]);
    assert_eq!(body[0]["rank"], 1);
}
