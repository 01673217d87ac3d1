// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Meritocracy Board: student achievements, point requests and a leaderboard.
//!
//! This crate provides the backend API (students submit point requests,
//! admins review them) together with the client-side session store,
//! access gate and dashboard view-model.

pub mod access;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod error;
pub mod ids;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::Database;
use services::{CategorySuggester, IdentityProvider, PointRequestWorkflow, StudentDirectory};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: Arc<dyn Database>,
    pub identity: Arc<dyn IdentityProvider>,
    pub suggester: Arc<dyn CategorySuggester>,
    pub students: StudentDirectory,
    pub workflow: PointRequestWorkflow,
}

impl AppState {
    pub fn new(
        config: Config,
        db: Arc<dyn Database>,
        identity: Arc<dyn IdentityProvider>,
        suggester: Arc<dyn CategorySuggester>,
        students: StudentDirectory,
    ) -> Self {
        Self {
            workflow: PointRequestWorkflow::new(db.clone()),
            config,
            db,
            identity,
            suggester,
            students,
        }
    }
}
