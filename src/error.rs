// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use validator::ValidationErrors;

/// Known identity-provider failure causes, each with a fixed user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthFailure {
    #[error("Invalid email or password.")]
    InvalidCredentials,

    #[error("This email address is already registered.")]
    EmailInUse,

    #[error("Password is too weak. Use at least 6 characters.")]
    WeakPassword,

    #[error("Invalid admin code.")]
    InvalidAdminCode,

    #[error("Your account profile is incomplete. Please contact an administrator.")]
    ProfileMissing,

    /// Unrecognized provider response; the raw code is kept for logs only.
    #[error("Authentication failed. Please try again.")]
    Provider(String),
}

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized { login: String },

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Auth(#[from] AuthFailure),

    #[error("Access denied: {0}")]
    Forbidden(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Persistence(String),

    #[error("Upstream service error: {0}")]
    Upstream(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Build a validation error from `validator` output, joining field messages.
    ///
    /// Fields are reported in name order so messages are stable.
    pub fn validation(prefix: &str, errors: &ValidationErrors) -> Self {
        let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
        fields.sort_by(|a, b| a.0.cmp(&b.0));

        let messages: Vec<String> = fields
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| match &e.message {
                    Some(msg) => msg.to_string(),
                    None => format!("{} is invalid", field),
                })
            })
            .collect();

        AppError::Validation(format!("{}{}", prefix, messages.join(", ")))
    }

    /// Stable machine-readable code used in the JSON body.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Unauthorized { .. } => "unauthorized",
            AppError::InvalidToken => "invalid_token",
            AppError::Validation(_) => "validation_error",
            AppError::Auth(_) => "auth_error",
            AppError::Forbidden(_) => "access_denied",
            AppError::NotFound(_) => "not_found",
            AppError::Persistence(_) => "persistence_error",
            AppError::Upstream(_) => "upstream_error",
            AppError::Internal(_) => "internal_error",
        }
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, details) = match &self {
            AppError::Unauthorized { login } => (StatusCode::UNAUTHORIZED, Some(login.clone())),
            AppError::InvalidToken => (StatusCode::UNAUTHORIZED, None),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, Some(msg.clone())),
            AppError::Auth(failure) => {
                if let AuthFailure::Provider(code) = failure {
                    tracing::warn!(code = %code, "Unmapped identity provider failure");
                }
                let status = match failure {
                    AuthFailure::EmailInUse => StatusCode::CONFLICT,
                    AuthFailure::InvalidAdminCode => StatusCode::FORBIDDEN,
                    _ => StatusCode::UNAUTHORIZED,
                };
                (status, Some(failure.to_string()))
            }
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, Some(msg.clone())),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, Some(msg.clone())),
            AppError::Persistence(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, Some(msg.clone()))
            }
            AppError::Upstream(msg) => (StatusCode::BAD_GATEWAY, Some(msg.clone())),
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, None)
            }
        };

        let body = ErrorResponse {
            error: self.code().to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

// Extractor failures answer with the same JSON body as every other error.
// Use with `axum_extra::extract::WithRejection<_, AppError>`.

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(status = %rejection.status(), "Rejected request body");
        AppError::Validation(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(format!("Invalid query string: {}", rejection.body_text()))
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
