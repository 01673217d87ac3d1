// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting.

use chrono::{DateTime, SecondsFormat, Utc};

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
///
/// Sub-second precision is kept to milliseconds so storage timestamps
/// from the same second still sort correctly on the client.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    if date.timestamp_subsec_millis() == 0 {
        date.to_rfc3339_opts(SecondsFormat::Secs, true)
    } else {
        date.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}
