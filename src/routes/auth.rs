// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Email/password authentication routes.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::{cookie::CookieJar, WithRejection};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::{Validate, ValidationError};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::access::{entry_decision, post_login_destination, EntryDecision};
use crate::error::{AppError, AuthFailure, Result};
use crate::middleware::auth::{create_jwt, removal_cookie, resolve_session, session_cookie};
use crate::models::{Role, User};
use crate::services::identity::Principal;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/entry", get(entry))
}

fn validate_signup_role(role: &Role) -> std::result::Result<(), ValidationError> {
    match role {
        Role::Student | Role::Admin => Ok(()),
        Role::Unset => Err(ValidationError::new("role")
            .with_message("Role must be student or admin.".into())),
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    #[validate(length(min = 2, message = "Name must be at least 2 characters."))]
    pub name: String,
    #[validate(email(message = "Invalid email address."))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters."))]
    pub password: String,
    #[serde(default)]
    #[validate(custom(function = "validate_signup_role"))]
    pub role: Role,
    #[serde(default)]
    pub admin_code: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email address."))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required."))]
    pub password: String,
    /// Page to return to after login
    #[serde(default)]
    pub redirect: Option<String>,
}

/// Successful login or signup.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AuthResponse {
    pub user_id: String,
    #[cfg_attr(
        feature = "binding-generation",
        ts(type = "\"student\" | \"admin\" | null")
    )]
    pub role: Role,
    pub redirect_to: String,
}

fn secure_cookies(state: &AppState) -> bool {
    state.config.frontend_url.starts_with("https://")
}

fn issue_session(state: &AppState, jar: CookieJar, uid: &str) -> Result<CookieJar> {
    let jwt = create_jwt(uid, &state.config.jwt_signing_key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("JWT creation failed: {}", e)))?;
    Ok(jar.add(session_cookie(jwt, secure_cookies(state))))
}

/// Admin self-registration needs the configured code; with none configured it is disabled.
fn check_admin_code(state: &AppState, supplied: Option<&str>) -> Result<()> {
    let expected = state.config.admin_signup_code.as_deref();
    match (expected, supplied.map(str::trim)) {
        (Some(expected), Some(supplied)) if expected == supplied => Ok(()),
        (None, _) => {
            tracing::warn!("Admin signup attempted while admin signup is disabled");
            Err(AuthFailure::InvalidAdminCode.into())
        }
        _ => Err(AuthFailure::InvalidAdminCode.into()),
    }
}

/// An existing principal may finish signing up only if the caller proves the
/// password and no profile record was ever written for it. This is the state
/// left behind when the profile write fails after the principal is created.
async fn principal_without_profile(
    state: &AppState,
    email: &str,
    password: &str,
) -> Result<Principal> {
    let principal = match state.identity.sign_in(email, password).await {
        Ok(principal) => principal,
        Err(AppError::Auth(AuthFailure::InvalidCredentials)) => {
            return Err(AuthFailure::EmailInUse.into())
        }
        Err(e) => return Err(e),
    };

    if state.db.get_user(&principal.uid).await?.is_some() {
        return Err(AuthFailure::EmailInUse.into());
    }

    tracing::warn!(uid = %principal.uid, "Completing signup for principal without profile record");
    Ok(principal)
}

/// Create a principal and its profile record, then start a session.
///
/// Signing up again with the same credentials repairs a principal whose
/// profile write failed.
async fn signup(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    WithRejection(Json(body), _): WithRejection<Json<SignupRequest>, AppError>,
) -> Result<(CookieJar, Json<AuthResponse>)> {
    body.validate()
        .map_err(|e| AppError::validation("Invalid input: ", &e))?;

    if body.role == Role::Admin {
        check_admin_code(&state, body.admin_code.as_deref())?;
    }

    let name = body.name.trim().to_string();
    let principal = match state
        .identity
        .create_principal(&body.email, &body.password, Some(&name))
        .await
    {
        Ok(principal) => principal,
        Err(AppError::Auth(AuthFailure::EmailInUse)) => {
            principal_without_profile(&state, &body.email, &body.password).await?
        }
        Err(e) => return Err(e),
    };

    let profile = User {
        uid: principal.uid.clone(),
        email: principal.email.clone().or(Some(body.email.clone())),
        name: Some(name),
        role: body.role,
    };
    if let Err(e) = state.db.upsert_user(&profile).await {
        tracing::error!(uid = %principal.uid, error = %e, "Principal created but profile write failed");
        return Err(e);
    }

    tracing::info!(uid = %principal.uid, role = ?body.role, "User signed up");

    let jar = issue_session(&state, jar, &principal.uid)?;
    Ok((
        jar,
        Json(AuthResponse {
            user_id: principal.uid,
            role: body.role,
            redirect_to: post_login_destination(body.role, None),
        }),
    ))
}

/// Verify credentials, require a profile record, then start a session.
async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    WithRejection(Json(body), _): WithRejection<Json<LoginRequest>, AppError>,
) -> Result<(CookieJar, Json<AuthResponse>)> {
    body.validate()
        .map_err(|e| AppError::validation("Invalid input: ", &e))?;

    let principal = state.identity.sign_in(&body.email, &body.password).await?;

    let profile = state.db.get_user(&principal.uid).await?.ok_or_else(|| {
        tracing::warn!(uid = %principal.uid, "Login for principal without profile record");
        AppError::Auth(AuthFailure::ProfileMissing)
    })?;

    tracing::info!(uid = %profile.uid, "User logged in");

    let jar = issue_session(&state, jar, &profile.uid)?;
    Ok((
        jar,
        Json(AuthResponse {
            user_id: profile.uid,
            role: profile.role,
            redirect_to: post_login_destination(profile.role, body.redirect.as_deref()),
        }),
    ))
}

/// Clear the session cookie.
async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> (CookieJar, StatusCode) {
    (
        jar.remove(removal_cookie(secure_cookies(&state))),
        StatusCode::NO_CONTENT,
    )
}

#[derive(Debug, Deserialize)]
pub struct EntryParams {
    #[serde(default)]
    redirect: Option<String>,
}

/// Whether the login/signup pages should show or send the caller on.
async fn entry(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    headers: HeaderMap,
    WithRejection(Query(params), _): WithRejection<Query<EntryParams>, AppError>,
) -> Json<EntryDecision> {
    let session = resolve_session(&state, &jar, &headers).await;
    Json(entry_decision(&session, params.redirect.as_deref()))
}
