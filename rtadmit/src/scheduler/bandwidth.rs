/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Minimal-bandwidth search.
//!
//! Binary search over integer percentages for the smallest server bandwidth
//! that makes a container pass [`is_schedulable`].  Schedulability is
//! monotone in bandwidth, so the search converges on the boundary in at most
//! seven probes.  One percentage point is added on top of the boundary to
//! cover server overhead.

use tracing::debug;

use super::feasibility::is_schedulable;
use crate::task::Container;

// ── Constants ─────────────────────────────────────────────────────────────────

/// Largest bandwidth a single server may be given, in percent.
pub const MAX_BANDWIDTH: u32 = 99;

/// Percentage points added on top of the analytical minimum.
pub const OVERHEAD_COMPENSATION: u32 = 1;

// ── Result type ───────────────────────────────────────────────────────────────

/// Outcome of [`minimal_bandwidth`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BandwidthSearch {
    /// Smallest passing bandwidth plus overhead, capped at [`MAX_BANDWIDTH`].
    pub band: u32,

    /// `true` iff `band` is below the threshold and passes the analysis.
    pub schedulable: bool,
}

// ── Search ────────────────────────────────────────────────────────────────────

/// Smallest bandwidth for `candidate` among `co_resident`.
///
/// The upper bound of the search is `99 − Σ band` of the co-resident
/// containers with a strictly higher priority.  The candidate is never
/// mutated; probes run on a private copy.
pub fn minimal_bandwidth(
    candidate: &Container,
    co_resident: &[Container],
    threshold: u32,
) -> BandwidthSearch {
    let allotted: u32 = co_resident
        .iter()
        .filter(|c| c.priority > candidate.priority)
        .map(|c| c.band)
        .sum();

    let mut probe = candidate.clone();
    let mut low: u32 = 0;
    let mut high: u32 = MAX_BANDWIDTH.saturating_sub(allotted);

    while low + 1 < high {
        let mid = low + (high - low) / 2;
        probe.band = mid;
        if is_schedulable(&probe, co_resident) {
            high = mid;
        } else {
            low = mid;
        }
    }

    let band = (high + OVERHEAD_COMPENSATION).min(MAX_BANDWIDTH);
    probe.band = band;
    let schedulable = band < threshold && is_schedulable(&probe, co_resident);

    debug!(
        container = %candidate.name,
        priority = candidate.priority,
        allotted,
        band,
        schedulable,
        "bandwidth search finished"
    );

    BandwidthSearch { band, schedulable }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
