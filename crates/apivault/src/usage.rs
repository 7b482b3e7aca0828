// SPDX-FileCopyrightText: 2026 Apivault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Usage accounting with a rolling daily window.
//!
//! [`apply_usage`] is a pure function over [`UsageCounters`] so the window
//! arithmetic is testable without a store or a real clock. The daily limit
//! is advisory: the tracker reports the breach and never blocks the call;
//! enforcement belongs to the caller.

use apivault_core::types::{next_utc_midnight, UsageCounters};
use chrono::{DateTime, Utc};

/// Advisory outcome of a usage-tracking call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageReport {
    /// True when a daily limit is configured and `daily_used` now exceeds it.
    pub limit_exceeded: bool,
}

/// Apply one tracked call of `units` to the counters as of `now`.
///
/// Lifetime counters increment unconditionally. The daily counter rolls
/// over when `now` has passed `daily_reset_at`: it restarts at `units` and
/// the boundary advances to the next UTC midnight after `now`.
pub fn apply_usage(counters: &mut UsageCounters, units: u64, now: DateTime<Utc>) -> UsageReport {
    counters.usage_count += 1;
    counters.total_units_consumed += units;

    if now >= counters.daily_reset_at {
        counters.daily_used = units;
        counters.daily_reset_at = next_utc_midnight(now);
    } else {
        counters.daily_used += units;
    }

    let limit_exceeded = counters
        .daily_limit
        .is_some_and(|limit| counters.daily_used > limit);

    UsageReport { limit_exceeded }
}
