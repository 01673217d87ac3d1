// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Leaderboard and signed-in user routes.

use crate::middleware::auth::AuthUser;
use crate::models::{CurrentUser, RankedStudent};
use crate::AppState;
use axum::{extract::State, routing::get, Extension, Json, Router};
use std::sync::Arc;

/// Public routes.
pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new().route("/leaderboard", get(get_leaderboard))
}

/// Routes for any signed-in user.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me))
        .route("/api/profile", get(get_profile))
}

/// All students ranked by total points.
async fn get_leaderboard(State(state): State<Arc<AppState>>) -> Json<Vec<RankedStudent>> {
    Json(state.students.leaderboard())
}

async fn get_me(Extension(AuthUser(user)): Extension<AuthUser>) -> Json<CurrentUser> {
    Json(user)
}

/// The signed-in user's profile: their dataset entry, or an empty one.
async fn get_profile(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
) -> Json<RankedStudent> {
    Json(state.students.profile_for(&user))
}
