// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Category suggestion route.

use crate::error::{AppError, Result};
use crate::services::suggest::{suggest_categories, SuggestCategoriesInput};
use crate::AppState;
use axum::{extract::State, routing::post, Json, Router};
use axum_extra::extract::WithRejection;
use serde::Serialize;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/suggest-categories", post(post_suggest))
}

#[derive(Debug, Serialize)]
pub struct SuggestResponse {
    pub categories: Vec<String>,
}

async fn post_suggest(
    State(state): State<Arc<AppState>>,
    WithRejection(Json(body), _): WithRejection<Json<SuggestCategoriesInput>, AppError>,
) -> Result<Json<SuggestResponse>> {
    let categories = suggest_categories(state.suggester.as_ref(), body).await?;
    tracing::debug!(count = categories.len(), "Suggested categories");
    Ok(Json(SuggestResponse { categories }))
}
