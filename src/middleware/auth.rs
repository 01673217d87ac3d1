// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! JWT authentication and role-gate middleware.
//!
//! The token only carries the uid; the profile record (and so the role) is
//! looked up on every request.

use crate::access::{AccessGate, GateDecision, Requirement, ADMIN_DASHBOARD_PATH};
use crate::error::{AppError, AuthFailure};
use crate::models::CurrentUser;
use crate::services::session::SessionState;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "merit_token";

const SESSION_TTL_SECS: usize = 30 * 24 * 60 * 60;

/// JWT claims structure.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (identity provider uid)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
}

/// Authenticated user resolved from the session token.
#[derive(Debug, Clone)]
pub struct AuthUser(pub CurrentUser);

/// Session token from the cookie, falling back to a bearer header.
fn session_token(jar: &CookieJar, headers: &HeaderMap) -> Option<String> {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        return Some(cookie.value().to_string());
    }
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::to_string)
}

/// Verify a session token and return its uid.
pub fn verify_jwt(token: &str, signing_key: &[u8]) -> Result<String, AppError> {
    let key = DecodingKey::from_secret(signing_key);
    let validation = Validation::new(Algorithm::HS256);

    let token_data = decode::<Claims>(token, &key, &validation).map_err(|e| {
        tracing::debug!(error = %e, "Rejected session token");
        AppError::InvalidToken
    })?;
    Ok(token_data.claims.sub)
}

/// Resolve a token to the signed-in user via their profile record.
async fn user_for_token(state: &AppState, token: &str) -> Result<CurrentUser, AppError> {
    let uid = verify_jwt(token, &state.config.jwt_signing_key)?;
    let profile = state.db.get_user(&uid).await?.ok_or_else(|| {
        tracing::info!(uid = %uid, "Session token for principal without profile");
        AppError::Auth(AuthFailure::ProfileMissing)
    })?;
    Ok(CurrentUser::from_profile(profile, None, None))
}

/// Session for the caller. Any failure to resolve counts as anonymous.
pub async fn resolve_session(state: &AppState, jar: &CookieJar, headers: &HeaderMap) -> SessionState {
    let Some(token) = session_token(jar, headers) else {
        return SessionState::anonymous();
    };
    match user_for_token(state, &token).await {
        Ok(user) => SessionState::authenticated(user),
        Err(e) => {
            tracing::debug!(error = %e, "Treating caller as anonymous");
            SessionState::anonymous()
        }
    }
}

/// Middleware that requires a valid session with a profile record.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(token) = session_token(&jar, request.headers()) else {
        return Err(AppError::Unauthorized {
            login: crate::access::login_location(request.uri().path()),
        });
    };

    let user = user_for_token(&state, &token).await?;
    request.extensions_mut().insert(AuthUser(user));

    Ok(next.run(request).await)
}

/// Gate for admin-only routes. Must run after [`require_auth`].
pub async fn require_admin(request: Request, next: Next) -> Result<Response, AppError> {
    require_role(AccessGate::for_path(ADMIN_DASHBOARD_PATH), request, next).await
}

/// Gate for student-only routes. Must run after [`require_auth`].
pub async fn require_student(request: Request, next: Next) -> Result<Response, AppError> {
    require_role(
        AccessGate::new("/request-points", Requirement::Student),
        request,
        next,
    )
    .await
}

async fn require_role(gate: AccessGate, request: Request, next: Next) -> Result<Response, AppError> {
    let session = match request.extensions().get::<AuthUser>() {
        Some(AuthUser(user)) => SessionState::authenticated(user.clone()),
        None => SessionState::anonymous(),
    };

    match gate.evaluate(&session) {
        GateDecision::Allowed => Ok(next.run(request).await),
        GateDecision::Denied { message } => Err(AppError::Forbidden(message)),
        GateDecision::RedirectToLogin { location } => Err(AppError::Unauthorized { login: location }),
        // Server-side sessions are always resolved.
        GateDecision::Checking => Err(AppError::InvalidToken),
    }
}

/// Create a JWT for a user session.
pub fn create_jwt(uid: &str, signing_key: &[u8]) -> anyhow::Result<String> {
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as usize;

    let claims = Claims {
        sub: uid.to_string(),
        iat: now,
        exp: now + SESSION_TTL_SECS,
    };

    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )?)
}

/// Session cookie carrying `token`.
pub fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .build()
}

/// Cookie that clears the session; attributes match [`session_cookie`].
pub fn removal_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE)
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .build()
}
