// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Student and accomplishment models for the leaderboard dataset.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// A recognized achievement with the points it earned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Accomplishment {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub points_awarded: u32,
    /// ISO 8601
    pub date_added: String,
}

/// A student as stored in the dataset. Totals and rank are never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub name: String,
    pub avatar_url: String,
    #[serde(default)]
    pub accomplishments: Vec<Accomplishment>,
}

impl Student {
    /// Sum of points awarded, saturating at `u32::MAX`.
    pub fn total_points(&self) -> u32 {
        self.accomplishments
            .iter()
            .fold(0u32, |total, a| total.saturating_add(a.points_awarded))
    }
}

/// A student with derived totals, as rendered on the leaderboard and profile.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RankedStudent {
    pub id: String,
    pub name: String,
    pub avatar_url: String,
    pub accomplishments: Vec<Accomplishment>,
    pub total_points: u32,
    /// 1-based; `None` for profiles outside the ranked set
    pub rank: Option<u32>,
}
