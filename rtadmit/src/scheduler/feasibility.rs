/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Hierarchical sporadic-server response-time analysis.
//!
//! # Theory
//! Every admitted workload runs inside a sporadic server that may consume
//! `C_s = band × P_s / 100` of CPU time in every server period `P_s`.  A task
//! inside the server therefore waits not only for higher-priority tasks of its
//! own container but also for the server's own budget to be replenished, and
//! for higher-priority servers on the same core (Davis & Burns).
//!
//! For a task with WCET `C` and period `T`, starting from
//!
//! $$w_0 = C + \left(\left\lceil C / C_s \right\rceil - 1\right)(P_s - C_s)$$
//!
//! the recurrence is
//!
//! $$L_{n} = C + \sum_{h \in hp} \left\lceil \frac{w_{n-1} + (T_h - C_h)}{T_h} \right\rceil C_h$$
//! $$w_n = L_n + \left(\left\lceil L_n / C_s \right\rceil - 1\right)(P_s - C_s) + \sum_{x \in hp\_servers} C_x$$
//!
//! and the task meets its deadline iff every `w_n ≤ T − (P_s − C_s)`.
//! The sequence is non-decreasing, so it either stabilises or crosses the
//! bound.  It is additionally capped at a fixed number of steps; failing to
//! converge inside the cap counts as "not schedulable".
//!
//! The test is sufficient, not exact: a rejected container may in fact be
//! schedulable.

use tracing::trace;

use crate::task::{Container, Task};

// ── Constants ─────────────────────────────────────────────────────────────────

/// Recurrence steps allowed regardless of the size of the task set.
pub const RTA_BASE_ITERATIONS: usize = 1_000;

/// Extra recurrence steps allowed per interfering task or server.
pub const RTA_ITERATIONS_PER_INTERFERER: usize = 100;

// ── Public API ────────────────────────────────────────────────────────────────

/// Returns `true` if every task of `candidate` meets its deadline at the
/// candidate's current `band`, given the servers in `co_resident`.
///
/// Only co-resident containers with a strictly higher priority interfere;
/// `co_resident` may therefore include `candidate` itself.
pub fn is_schedulable(candidate: &Container, co_resident: &[Container]) -> bool {
    response_times(candidate, co_resident).is_some()
}

/// Worst-case response time of each task of `candidate`, in task order.
///
/// Returns `None` as soon as one task misses its bound, when the container
/// carries the "no priority" sentinel, or when its capacity is zero.
pub fn response_times(candidate: &Container, co_resident: &[Container]) -> Option<Vec<u64>> {
    if !candidate.has_priority() {
        trace!(container = %candidate.name, "no valid priority, not schedulable");
        return None;
    }

    let capacity_us = candidate.capacity_us();
    let interference_us = higher_priority_capacity(candidate.priority, co_resident);
    let max_iterations = RTA_BASE_ITERATIONS
        + RTA_ITERATIONS_PER_INTERFERER * (candidate.tasks.len() + co_resident.len());

    candidate
        .tasks
        .iter()
        .map(|task| {
            let r = response_time(
                task,
                &candidate.tasks,
                candidate.period_us,
                capacity_us,
                interference_us,
                max_iterations,
            );
            trace!(
                container = %candidate.name,
                band = candidate.band,
                period_us = task.period_us,
                wcet_us = task.wcet_us,
                response_us = ?r,
                "task response time"
            );
            r
        })
        .collect()
}

/// Sum of the per-period capacities of all servers in `co_resident` whose
/// priority is strictly higher than `priority`.
pub fn higher_priority_capacity(priority: i32, co_resident: &[Container]) -> u64 {
    co_resident
        .iter()
        .filter(|c| c.priority > priority)
        .fold(0u64, |acc, c| acc.saturating_add(c.capacity_us()))
}

/// Fixed-point response-time recurrence for one task.
///
/// `siblings` is the task set of the task's own container (the task itself
/// may be included; only strictly higher task priorities interfere).
///
/// Returns the converged response time, or `None` if the bound
/// `task.period_us − (server_period_us − capacity_us)` is exceeded, the
/// recurrence does not settle within `max_iterations` steps, or the server has
/// no capacity.
pub fn response_time(
    task: &Task,
    siblings: &[Task],
    server_period_us: u64,
    capacity_us: u64,
    interference_us: u64,
    max_iterations: usize,
) -> Option<u64> {
    if capacity_us == 0 || task.period_us == 0 {
        return None;
    }

    // Time per server period during which the server holds no budget.
    let gap_us = server_period_us.saturating_sub(capacity_us);
    let bound_us = task.period_us.checked_sub(gap_us)?;

    let blocking = |load: u64| {
        load.div_ceil(capacity_us)
            .saturating_sub(1)
            .saturating_mul(gap_us)
    };

    let mut current = task.wcet_us.saturating_add(blocking(task.wcet_us));

    for _ in 0..max_iterations {
        let higher = siblings
            .iter()
            .filter(|h| h.priority > task.priority && h.period_us > 0)
            .fold(0u64, |acc, h| {
                let jitter = h.period_us.saturating_sub(h.wcet_us);
                let releases = current.saturating_add(jitter).div_ceil(h.period_us);
                acc.saturating_add(releases.saturating_mul(h.wcet_us))
            });

        let load = task.wcet_us.saturating_add(higher);
        let next = load
            .saturating_add(blocking(load))
            .saturating_add(interference_us);

        if next > bound_us {
            return None;
        }
        if next == current {
            return Some(next);
        }
        current = next;
    }

    None
}

// ── Tests ─────────────────────────────────────────────────────────────────────
