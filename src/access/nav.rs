// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Navigation and account menu for the application shell.

use crate::access::{AccessGate, GateDecision, ADMIN_DASHBOARD_PATH, LOGIN_PATH, PROFILE_PATH, SIGNUP_PATH};
use crate::services::session::SessionState;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visibility {
    Always,
    SignedIn,
    Student,
    Admin,
}

const NAV_ITEMS: [(&str, &str, Visibility); 5] = [
    ("Leaderboard", "/", Visibility::Always),
    ("My Profile", PROFILE_PATH, Visibility::SignedIn),
    ("Suggest Categories", "/suggest-categories", Visibility::SignedIn),
    ("Request Points", "/request-points", Visibility::Student),
    ("Admin Dashboard", ADMIN_DASHBOARD_PATH, Visibility::Admin),
];

impl Visibility {
    fn visible_to(self, session: &SessionState) -> bool {
        match self {
            Visibility::Always => true,
            Visibility::SignedIn => session.is_resolved() && session.current_user.is_some(),
            Visibility::Student => session.is_student(),
            Visibility::Admin => session.is_admin(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavItem {
    pub label: &'static str,
    pub href: &'static str,
    pub active: bool,
}

/// Whether `href` is the current page. Nested pages count as active.
pub fn is_active(href: &str, current_path: &str) -> bool {
    if href == "/" {
        return current_path == "/";
    }
    current_path == href
        || current_path
            .strip_prefix(href)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Navigation items visible to this session.
pub fn nav_items(session: &SessionState, current_path: &str) -> Vec<NavItem> {
    NAV_ITEMS
        .iter()
        .filter(|(_, _, visibility)| visibility.visible_to(session))
        .map(|&(label, href, _)| NavItem {
            label,
            href,
            active: is_active(href, current_path),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MenuEntry {
    Link {
        label: &'static str,
        href: &'static str,
    },
    Logout {
        label: &'static str,
    },
}

pub fn account_menu(session: &SessionState) -> Vec<MenuEntry> {
    if session.current_user.is_none() {
        return vec![
            MenuEntry::Link {
                label: "Login",
                href: LOGIN_PATH,
            },
            MenuEntry::Link {
                label: "Sign Up",
                href: SIGNUP_PATH,
            },
        ];
    }

    let mut entries = vec![MenuEntry::Link {
        label: "Profile",
        href: PROFILE_PATH,
    }];
    if session.is_admin() {
        entries.push(MenuEntry::Link {
            label: "Admin Dashboard",
            href: ADMIN_DASHBOARD_PATH,
        });
    }
    entries.push(MenuEntry::Logout { label: "Logout" });
    entries
}

/// Everything the shell renders around a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShellView {
    pub nav: Vec<NavItem>,
    pub account_menu: Vec<MenuEntry>,
    pub user_name: Option<String>,
    pub initials: Option<String>,
    pub gate: GateDecision,
}

impl ShellView {
    pub fn build(session: &SessionState, current_path: &str) -> Self {
        let user = session.current_user.as_ref();
        Self {
            nav: nav_items(session, current_path),
            account_menu: account_menu(session),
            user_name: user.and_then(|u| u.name.clone()),
            initials: user.map(|u| u.initials()),
            gate: AccessGate::for_path(current_path).evaluate(session),
        }
    }
}
