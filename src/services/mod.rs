// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod identity;
pub mod leaderboard;
pub mod session;
pub mod suggest;
pub mod workflow;

pub use identity::{AuthClient, FirebaseAuth, IdentityProvider, MemoryIdentity, Principal};
pub use leaderboard::{rank_students, StudentDataError, StudentDirectory};
pub use session::{SessionPhase, SessionState, SessionStore};
pub use suggest::{CategorySuggester, HttpCategorySuggester, KeywordSuggester};
pub use workflow::PointRequestWorkflow;
