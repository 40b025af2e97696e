/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Rate-monotonic server priority assignment.
//!
//! Server priorities live in `0..256`.  Containers are ordered by their
//! shortest task period; a newcomer is slotted between its neighbours in that
//! order by taking the midpoint of their priorities, so existing servers never
//! need to be renumbered.  Shorter period ⇒ numerically larger priority.

use tracing::debug;

use crate::task::{min_period_us, Container, Task, NO_PRIORITY};

/// Priority of the first server on a node.
pub const DEFAULT_PRIORITY: i32 = 128;

/// Exclusive upper end of the server priority range.
pub const PRIORITY_CEILING: i32 = 256;

/// Priority for a new container with `tasks` among `existing` containers.
///
/// Returns [`NO_PRIORITY`] when the midpoint collides with a neighbour, i.e.
/// no free integer is left between them.
pub fn assign_priority(tasks: &[Task], existing: &[Container]) -> i32 {
    if existing.is_empty() {
        return DEFAULT_PRIORITY;
    }

    let candidate_period = min_period_us(tasks);

    let mut ordered: Vec<&Container> = existing.iter().collect();
    ordered.sort_by_key(|c| c.min_period_us());

    // Equal periods go after the existing containers.
    let index = ordered.partition_point(|c| c.min_period_us() <= candidate_period);

    let (priority, neighbours) = match index {
        0 => {
            let next = ordered[0].priority;
            ((next + PRIORITY_CEILING) / 2, [None, Some(next)])
        }
        i if i == ordered.len() => {
            let prev = ordered[i - 1].priority;
            (prev / 2, [Some(prev), None])
        }
        i => {
            let prev = ordered[i - 1].priority;
            let next = ordered[i].priority;
            ((prev + next) / 2, [Some(prev), Some(next)])
        }
    };

    if neighbours.iter().flatten().any(|&n| n == priority) {
        debug!(
            min_period_us = candidate_period,
            priority, "priority collides with a neighbour"
        );
        return NO_PRIORITY;
    }

    debug!(
        min_period_us = candidate_period,
        index, priority, "server priority assigned"
    );
    priority
}

// ── Tests ─────────────────────────────────────────────────────────────────────
