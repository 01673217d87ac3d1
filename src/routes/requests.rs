// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Point request routes: student submission and admin review.
//!
//! Role gates are applied in routes/mod.rs.

use crate::dashboard::StatusTab;
use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::PointRequestView;
use crate::services::workflow::{ApproveRequestInput, RejectRequestInput, SubmitRequestInput};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use axum_extra::extract::WithRejection;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Student routes.
pub fn student_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/requests", post(submit_request))
}

/// Admin routes.
pub fn admin_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/admin/requests", get(list_requests))
        .route("/api/admin/requests/{id}/approve", post(approve_request))
        .route("/api/admin/requests/{id}/reject", post(reject_request))
}

// ─── Submission ──────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SubmitBody {
    pub reason: String,
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SubmitResponse {
    pub id: String,
}

/// Submit a point request as the signed-in student.
async fn submit_request(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    WithRejection(Json(body), _): WithRejection<Json<SubmitBody>, AppError>,
) -> Result<(StatusCode, Json<SubmitResponse>)> {
    let student_name = user
        .name
        .clone()
        .or_else(|| user.email.clone())
        .unwrap_or_default();

    let id = state
        .workflow
        .submit_request(SubmitRequestInput {
            reason: body.reason,
            user_id: user.uid,
            student_name,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(SubmitResponse { id })))
}

// ─── Review ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Tab to list; all requests when absent
    #[serde(default)]
    status: Option<StatusTab>,
}

/// List point requests, optionally by status.
async fn list_requests(
    State(state): State<Arc<AppState>>,
    WithRejection(Query(query), _): WithRejection<Query<ListQuery>, AppError>,
) -> Result<Json<Vec<PointRequestView>>> {
    let tab = query.status.unwrap_or(StatusTab::All);
    Ok(Json(state.workflow.list_requests(tab.filter()).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveBody {
    pub points_awarded: i64,
    #[serde(default)]
    pub admin_notes: String,
}

async fn approve_request(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(admin)): Extension<AuthUser>,
    Path(id): Path<String>,
    WithRejection(Json(body), _): WithRejection<Json<ApproveBody>, AppError>,
) -> Result<StatusCode> {
    tracing::debug!(admin = %admin.uid, request_id = %id, "Approving point request");
    state
        .workflow
        .approve_request(ApproveRequestInput {
            request_id: id,
            points_awarded: body.points_awarded,
            admin_notes: body.admin_notes,
        })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectBody {
    #[serde(default)]
    pub admin_notes: String,
}

async fn reject_request(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(admin)): Extension<AuthUser>,
    Path(id): Path<String>,
    WithRejection(Json(body), _): WithRejection<Json<RejectBody>, AppError>,
) -> Result<StatusCode> {
    tracing::debug!(admin = %admin.uid, request_id = %id, "Rejecting point request");
    state
        .workflow
        .reject_request(RejectRequestInput {
            request_id: id,
            admin_notes: body.admin_notes,
        })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
