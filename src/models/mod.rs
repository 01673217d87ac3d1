// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod point_request;
pub mod student;
pub mod user;

pub use point_request::{
    NewPointRequest, PointRequest, PointRequestView, RequestStatus, Review, ReviewDecision,
};
pub use student::{Accomplishment, RankedStudent, Student};
pub use user::{CurrentUser, Role, User};
