// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Point request model: a student's claim for points, reviewed once by an admin.

use crate::time_utils::format_utc_rfc3339;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Review status of a point request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RequestStatus::Pending),
            "approved" => Ok(RequestStatus::Approved),
            "rejected" => Ok(RequestStatus::Rejected),
            other => Err(format!("unknown request status '{}'", other)),
        }
    }
}

/// Outcome recorded when an admin reviews a request.
#[derive(Debug, Clone, PartialEq)]
pub enum Review {
    Approved {
        points_awarded: u32,
        admin_notes: String,
        reviewed_at: DateTime<Utc>,
    },
    Rejected {
        admin_notes: String,
        reviewed_at: DateTime<Utc>,
    },
}

impl Review {
    pub fn reviewed_at(&self) -> DateTime<Utc> {
        match self {
            Review::Approved { reviewed_at, .. } | Review::Rejected { reviewed_at, .. } => {
                *reviewed_at
            }
        }
    }

    pub fn admin_notes(&self) -> &str {
        match self {
            Review::Approved { admin_notes, .. } | Review::Rejected { admin_notes, .. } => {
                admin_notes
            }
        }
    }
}

/// An admin decision before the storage layer stamps it with a review time.
#[derive(Debug, Clone, PartialEq)]
pub enum ReviewDecision {
    Approve {
        points_awarded: u32,
        admin_notes: String,
    },
    Reject {
        admin_notes: String,
    },
}

impl ReviewDecision {
    pub fn stamp(self, reviewed_at: DateTime<Utc>) -> Review {
        match self {
            ReviewDecision::Approve {
                points_awarded,
                admin_notes,
            } => Review::Approved {
                points_awarded,
                admin_notes,
                reviewed_at,
            },
            ReviewDecision::Reject { admin_notes } => Review::Rejected {
                admin_notes,
                reviewed_at,
            },
        }
    }
}

/// A validated request ready to be inserted. `requested_at` is assigned on write.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPointRequest {
    pub user_id: String,
    pub student_name: String,
    pub reason: String,
}

impl NewPointRequest {
    pub fn into_record(self, id: String, requested_at: DateTime<Utc>) -> PointRequest {
        PointRequest {
            id,
            user_id: self.user_id,
            student_name: self.student_name,
            reason: self.reason,
            requested_at,
            review: None,
        }
    }
}

/// A stored point request.
///
/// `review` is `None` exactly while the request is pending, so review fields
/// cannot exist without a decision.
#[derive(Debug, Clone, PartialEq)]
pub struct PointRequest {
    pub id: String,
    pub user_id: String,
    pub student_name: String,
    pub reason: String,
    pub requested_at: DateTime<Utc>,
    pub review: Option<Review>,
}

impl PointRequest {
    pub fn status(&self) -> RequestStatus {
        match self.review {
            None => RequestStatus::Pending,
            Some(Review::Approved { .. }) => RequestStatus::Approved,
            Some(Review::Rejected { .. }) => RequestStatus::Rejected,
        }
    }

    pub fn points_awarded(&self) -> Option<u32> {
        match self.review {
            Some(Review::Approved { points_awarded, .. }) => Some(points_awarded),
            _ => None,
        }
    }
}

/// Transport shape for views: timestamps normalized to RFC 3339 strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct PointRequestView {
    pub id: String,
    pub user_id: String,
    pub student_name: String,
    pub reason: String,
    pub status: RequestStatus,
    pub requested_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points_awarded: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_notes: Option<String>,
}

impl From<&PointRequest> for PointRequestView {
    fn from(request: &PointRequest) -> Self {
        Self {
            id: request.id.clone(),
            user_id: request.user_id.clone(),
            student_name: request.student_name.clone(),
            reason: request.reason.clone(),
            status: request.status(),
            requested_at: format_utc_rfc3339(request.requested_at),
            reviewed_at: request
                .review
                .as_ref()
                .map(|r| format_utc_rfc3339(r.reviewed_at())),
            points_awarded: request.points_awarded(),
            admin_notes: request.review.as_ref().map(|r| r.admin_notes().to_string()),
        }
    }
}
