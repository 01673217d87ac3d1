// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Route access gate.
//!
//! Evaluates a [`SessionState`] against a route's [`Requirement`]. A loading
//! session never produces a decision other than [`GateDecision::Checking`],
//! and a user without the required role is shown a denial rather than
//! redirected.

pub mod nav;

use crate::models::Role;
use crate::services::session::SessionState;
use serde::Serialize;

pub const LOGIN_PATH: &str = "/login";
pub const SIGNUP_PATH: &str = "/signup";
pub const PROFILE_PATH: &str = "/profile";
pub const ADMIN_DASHBOARD_PATH: &str = "/admin/dashboard";

const ADMIN_DENIED: &str = "You do not have permission to view this page. Admin access required.";
const STUDENT_DENIED: &str = "This page is only available to students.";

/// What a route demands of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Public,
    /// Login and signup: shown only to anonymous sessions.
    Entry,
    Authenticated,
    Student,
    Admin,
}

impl Requirement {
    pub fn for_path(path: &str) -> Self {
        match path {
            LOGIN_PATH | SIGNUP_PATH => Requirement::Entry,
            PROFILE_PATH | "/suggest-categories" => Requirement::Authenticated,
            "/request-points" => Requirement::Student,
            p if p == "/admin" || p.starts_with("/admin/") => Requirement::Admin,
            _ => Requirement::Public,
        }
    }

    fn required_role(self) -> Option<Role> {
        match self {
            Requirement::Student => Some(Role::Student),
            Requirement::Admin => Some(Role::Admin),
            _ => None,
        }
    }
}

/// Outcome of evaluating a gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum GateDecision {
    /// Session still resolving; take no action yet.
    Checking,
    RedirectToLogin { location: String },
    Denied { message: String },
    Allowed,
}

/// Guard for one route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessGate {
    path: String,
    requirement: Requirement,
}

impl AccessGate {
    pub fn new(path: impl Into<String>, requirement: Requirement) -> Self {
        Self {
            path: path.into(),
            requirement,
        }
    }

    pub fn for_path(path: &str) -> Self {
        Self::new(path, Requirement::for_path(path))
    }

    pub fn requirement(&self) -> Requirement {
        self.requirement
    }

    pub fn evaluate(&self, session: &SessionState) -> GateDecision {
        if matches!(self.requirement, Requirement::Public | Requirement::Entry) {
            return GateDecision::Allowed;
        }
        if session.is_loading() {
            return GateDecision::Checking;
        }

        let Some(user) = session.current_user.as_ref() else {
            return GateDecision::RedirectToLogin {
                location: login_location(&self.path),
            };
        };

        match self.requirement.required_role() {
            Some(role) if user.role != role => {
                tracing::info!(
                    uid = %user.uid,
                    path = %self.path,
                    required = ?role,
                    "Access denied"
                );
                GateDecision::Denied {
                    message: denial_message(role).to_string(),
                }
            }
            _ => GateDecision::Allowed,
        }
    }
}

fn denial_message(role: Role) -> &'static str {
    match role {
        Role::Admin => ADMIN_DENIED,
        _ => STUDENT_DENIED,
    }
}

/// Login page location that returns to `path` afterwards.
pub fn login_location(path: &str) -> String {
    format!("{}?redirect={}", LOGIN_PATH, urlencoding::encode(path))
}

/// Only same-site absolute paths are accepted as return targets.
pub fn is_safe_return_target(target: &str) -> bool {
    target.starts_with('/') && !target.starts_with("//") && !target.contains('\\')
}

/// Where a signed-in user lands after login or signup.
pub fn post_login_destination(role: Role, return_to: Option<&str>) -> String {
    if let Some(target) = return_to.filter(|t| is_safe_return_target(t)) {
        return target.to_string();
    }
    match role {
        Role::Admin => ADMIN_DASHBOARD_PATH.to_string(),
        Role::Student => PROFILE_PATH.to_string(),
        Role::Unset => "/".to_string(),
    }
}

/// Outcome for the login/signup pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", content = "location", rename_all = "snake_case")]
pub enum EntryDecision {
    Checking,
    Show,
    Redirect(String),
}

/// Evaluate an entry route: signed-in users are sent on, anonymous ones see the page.
pub fn entry_decision(session: &SessionState, return_to: Option<&str>) -> EntryDecision {
    if session.is_loading() {
        return EntryDecision::Checking;
    }
    match session.current_user.as_ref() {
        Some(user) => EntryDecision::Redirect(post_login_destination(user.role, return_to)),
        None => EntryDecision::Show,
    }
}
