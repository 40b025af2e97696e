/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Core data structures for the admission engine.
//!
//! Three types model the two sides of an admission decision:
//!
//! ```text
//! HTTP body ──►  AdmissionRequest  ──(scheduler)──►  Container  ──(store)──►  storage
//!                 ↑ input, tasks                       ↑ sporadic server
//!                 as submitted                         band / priority / core
//! ```
//!
//! # Priority convention
//! For both tasks and containers a **numerically larger priority means higher
//! precedence**.  The priority assigner gives shorter-period containers larger
//! numbers, and the analyzer counts interference from tasks / containers whose
//! priority is strictly greater than the one under analysis.

// ── Constants ─────────────────────────────────────────────────────────────────

/// Sentinel server priority meaning "no valid priority could be assigned".
///
/// A container carrying this value is never schedulable.
pub const NO_PRIORITY: i32 = -1;

// ── Criticality ───────────────────────────────────────────────────────────────

/// Severity class of a workload.
///
/// Selects which WCET estimate feeds the schedulability test: `Lo` workloads
/// have their WCETs inflated by the node's WCET multiplier, `Hi` workloads are
/// analysed with the values exactly as submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Criticality {
    /// High-criticality: WCETs are trusted as submitted.
    #[default]
    Hi,
    /// Low-criticality: WCETs are scaled by the configured multiplier.
    Lo,
}

impl Criticality {
    /// Parse the label carried in the request body.
    ///
    /// Only `"LO"` (any case) selects [`Criticality::Lo`]; everything else,
    /// including an empty label, maps to `Hi` so that an unknown tag can never
    /// make the analysis less conservative.
    pub fn from_label(label: &str) -> Self {
        if label.trim().eq_ignore_ascii_case("LO") {
            Criticality::Lo
        } else {
            Criticality::Hi
        }
    }

    pub fn as_label(self) -> &'static str {
        match self {
            Criticality::Hi => "HI",
            Criticality::Lo => "LO",
        }
    }
}

// ── Task ──────────────────────────────────────────────────────────────────────

/// A periodic unit of work inside a container.
///
/// All timing values are in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Task {
    /// Task period in µs.
    pub period_us: u64,

    /// Worst-case execution time of one job in µs.
    pub wcet_us: u64,

    /// Task-level priority inside its container (larger = higher precedence).
    pub priority: i32,
}

impl Task {
    /// Copy of this task with the WCET multiplied by `multiplier`.
    pub fn with_scaled_wcet(&self, multiplier: u64) -> Self {
        Task {
            wcet_us: self.wcet_us.saturating_mul(multiplier),
            ..*self
        }
    }
}

// ── AdmissionRequest ──────────────────────────────────────────────────────────

/// A workload asking to be admitted on this node.
#[derive(Debug, Clone, Default)]
pub struct AdmissionRequest {
    /// Unique workload identifier (the pod name).
    pub name: String,

    /// Task set as submitted by the caller.
    pub tasks: Vec<Task>,

    pub criticality: Criticality,
}

impl AdmissionRequest {
    /// Tasks ready for analysis: stably sorted by ascending task priority and,
    /// for [`Criticality::Lo`] workloads, with WCETs scaled by
    /// `wcet_multiplier`.
    pub fn prepared_tasks(&self, wcet_multiplier: u64) -> Vec<Task> {
        let mut tasks: Vec<Task> = match self.criticality {
            Criticality::Lo => self
                .tasks
                .iter()
                .map(|t| t.with_scaled_wcet(wcet_multiplier))
                .collect(),
            Criticality::Hi => self.tasks.clone(),
        };
        tasks.sort_by_key(|t| t.priority);
        tasks
    }
}

// ── Container ─────────────────────────────────────────────────────────────────

/// A sporadic server: the CPU reservation that hosts one admitted workload.
///
/// `band` is a percentage of one core.  `period_us` is the node-wide server
/// replenishment period; the server may run for `capacity_us()` in each of
/// those periods.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Container {
    pub name: String,
    pub tasks: Vec<Task>,

    /// Assigned bandwidth in percent of one core.
    pub band: u32,

    /// Server replenishment period in µs.
    pub period_us: u64,

    /// Server priority (larger = higher precedence, [`NO_PRIORITY`] = none).
    pub priority: i32,

    /// Index of the core the server is pinned to.
    pub core: usize,
}

impl Container {
    /// Shortest task period, the container's rate-monotonic key.
    ///
    /// Returns `u64::MAX` for a container without tasks so that it sorts last.
    pub fn min_period_us(&self) -> u64 {
        min_period_us(&self.tasks)
    }

    /// Server budget per replenishment period: `band × period / 100`.
    pub fn capacity_us(&self) -> u64 {
        u64::from(self.band).saturating_mul(self.period_us) / 100
    }

    /// `false` when the priority assigner could not place this container.
    pub fn has_priority(&self) -> bool {
        self.priority != NO_PRIORITY
    }
}

/// Shortest period among `tasks`, or `u64::MAX` if the slice is empty.
pub fn min_period_us(tasks: &[Task]) -> u64 {
    tasks.iter().map(|t| t.period_us).min().unwrap_or(u64::MAX)
}

/// Per-core sum of container bandwidths.
///
/// Containers whose `core` is outside `0..cores` are ignored.
pub fn per_core_bandwidth(containers: &[Container], cores: usize) -> Vec<u32> {
    let mut used = vec![0u32; cores];
    for c in containers {
        if let Some(slot) = used.get_mut(c.core) {
            *slot += c.band;
        }
    }
    used
}

// ── Tests ─────────────────────────────────────────────────────────────────────
