// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Presentation shell route.

use crate::access::nav::ShellView;
use crate::middleware::auth::AuthUser;
use crate::services::session::SessionState;
use crate::error::AppError;
use axum::{extract::Query, routing::get, Extension, Json, Router};
use axum_extra::extract::WithRejection;
use serde::Deserialize;
use std::sync::Arc;

use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/shell", get(get_shell))
}

#[derive(Debug, Deserialize)]
pub struct ShellQuery {
    #[serde(default = "default_path")]
    path: String,
}

fn default_path() -> String {
    "/".to_string()
}

/// Navigation, account menu and gate decision for the page at `path`.
async fn get_shell(
    Extension(AuthUser(user)): Extension<AuthUser>,
    WithRejection(Query(query), _): WithRejection<Query<ShellQuery>, AppError>,
) -> Json<ShellView> {
    let session = SessionState::authenticated(user);
    Json(ShellView::build(&session, &query.path))
}
