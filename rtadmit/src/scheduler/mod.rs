/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Admission orchestrator.
//!
//! [`plan_admission`] decides whether a workload can be hosted on this node
//! and, if so, on which core, with which server bandwidth and priority, and
//! how the bands of lower-priority co-resident servers must grow.  It is a
//! pure function of the request and a snapshot of the committed containers:
//! every probe works on scratch copies and nothing is committed here.  The
//! [`NodeStore`](crate::store::NodeStore) applies the resulting
//! [`AdmissionPlan`] under its lock.
//!
//! # Per-core probe
//! ```text
//! for core in 0..cores:
//!     band ← minimal_bandwidth(candidate, residents)     ─ unschedulable → next
//!     used[core] + band ≤ threshold?                     ─ no → next
//!     merged ← residents + candidate, highest priority first
//!     for each lower-priority container in merged:
//!         re-run minimal_bandwidth, update its band      ─ fails → next
//!     Σ merged bands ≤ threshold?                        ─ no → next
//!     → plan
//! ```

pub mod bandwidth;
pub mod error;
pub mod feasibility;
pub mod priority;

pub use bandwidth::{minimal_bandwidth, BandwidthSearch};
pub use error::{AdmissionError, CoreRejection};

use tracing::{debug, info, warn};

use crate::task::{per_core_bandwidth, AdmissionRequest, Container, NO_PRIORITY};

use priority::assign_priority;

// ── Constants ─────────────────────────────────────────────────────────────────

/// Maximum committed bandwidth per core, in percent.
pub const DEFAULT_SCHEDULABLE_THRESHOLD: u32 = 80;

/// Node-wide sporadic-server replenishment period in µs.
pub const DEFAULT_SERVER_PERIOD_US: u64 = 2_500;

/// WCET multiplier applied to low-criticality workloads by default.
pub const DEFAULT_WCET_MULTIPLIER: u64 = 1;

// ── AdmissionPolicy ───────────────────────────────────────────────────────────

/// Node-wide parameters of the admission decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionPolicy {
    /// Number of cores servers may be pinned to.
    pub cores: usize,

    /// Per-core bandwidth ceiling in percent.
    pub threshold: u32,

    pub server_period_us: u64,

    /// Factor applied to the WCETs of low-criticality workloads.
    pub wcet_multiplier: u64,
}

impl AdmissionPolicy {
    /// Policy for `cores` cores with every other parameter at its default.
    pub fn new(cores: usize) -> Self {
        Self {
            cores,
            threshold: DEFAULT_SCHEDULABLE_THRESHOLD,
            server_period_us: DEFAULT_SERVER_PERIOD_US,
            wcet_multiplier: DEFAULT_WCET_MULTIPLIER,
        }
    }
}

// ── AdmissionPlan ─────────────────────────────────────────────────────────────

/// A fully validated placement, ready to be committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionPlan {
    /// The candidate with `band`, `priority` and `core` filled in.
    pub container: Container,

    /// New bands of the lower-priority co-resident containers, by name.
    pub rebalanced: Vec<(String, u32)>,

    /// Per-core used bandwidth after the commit.
    pub used: Vec<u32>,
}

impl AdmissionPlan {
    /// Commit the plan into `containers`: grow the rebalanced servers, then
    /// append the candidate.
    pub fn apply(self, containers: &mut Vec<Container>) {
        for (name, band) in &self.rebalanced {
            if let Some(c) = containers.iter_mut().find(|c| &c.name == name) {
                c.band = *band;
            }
        }
        containers.push(self.container);
    }
}

// ── Validation ────────────────────────────────────────────────────────────────

/// Reject names that would corrupt the persisted records.
pub fn validate_name(name: &str) -> Result<(), AdmissionError> {
    if name.is_empty() {
        return Err(AdmissionError::MissingName);
    }
    if name.contains([',', '\n', '\r']) || name.trim() != name {
        return Err(AdmissionError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Reject empty task sets and tasks with a zero period or WCET.
pub fn validate_tasks(request: &AdmissionRequest) -> Result<(), AdmissionError> {
    if request.tasks.is_empty() {
        return Err(AdmissionError::NoTasks);
    }
    for (index, task) in request.tasks.iter().enumerate() {
        if task.period_us == 0 {
            return Err(AdmissionError::ZeroPeriod {
                workload: request.name.clone(),
                index,
            });
        }
        if task.wcet_us == 0 {
            return Err(AdmissionError::ZeroWcet {
                workload: request.name.clone(),
                index,
            });
        }
    }
    Ok(())
}

// ── Orchestrator ──────────────────────────────────────────────────────────────

/// Find the first core that can host `request` next to `existing`.
///
/// # Errors
/// * task validation failures;
/// * [`AdmissionError::NoPriority`] when no server priority is free;
/// * [`AdmissionError::InsufficientBandwidth`] when every core refuses, with
///   the per-core reasons.
pub fn plan_admission(
    request: &AdmissionRequest,
    existing: &[Container],
    policy: &AdmissionPolicy,
) -> Result<AdmissionPlan, AdmissionError> {
    validate_tasks(request)?;

    let tasks = request.prepared_tasks(policy.wcet_multiplier);
    let priority = assign_priority(&tasks, existing);
    if priority == NO_PRIORITY {
        let min_period_us = crate::task::min_period_us(&tasks);
        warn!(workload = %request.name, min_period_us, "no free server priority");
        return Err(AdmissionError::NoPriority {
            workload: request.name.clone(),
            min_period_us,
        });
    }

    let mut candidate = Container {
        name: request.name.clone(),
        tasks,
        band: 0,
        period_us: policy.server_period_us,
        priority,
        core: 0,
    };

    let mut used = per_core_bandwidth(existing, policy.cores);
    let mut rejections = Vec::new();

    for core in 0..policy.cores {
        candidate.core = core;
        match probe_core(&candidate, existing, used[core], policy) {
            Ok(fit) => {
                used[core] = fit.total;
                candidate.band = fit.band;
                info!(
                    workload = %candidate.name,
                    criticality = request.criticality.as_label(),
                    core,
                    band = fit.band,
                    priority,
                    rebalanced = fit.rebalanced.len(),
                    "workload admissible"
                );
                return Ok(AdmissionPlan {
                    container: candidate,
                    rebalanced: fit.rebalanced,
                    used,
                });
            }
            Err(reason) => {
                debug!(workload = %candidate.name, %reason, "core refused workload");
                rejections.push(reason);
            }
        }
    }

    warn!(
        workload = %request.name,
        priority,
        used = ?used,
        "no core can host workload"
    );
    Err(AdmissionError::InsufficientBandwidth { rejections })
}

/// Successful probe of one core.
struct CoreFit {
    band: u32,
    rebalanced: Vec<(String, u32)>,
    total: u32,
}

fn probe_core(
    candidate: &Container,
    existing: &[Container],
    used: u32,
    policy: &AdmissionPolicy,
) -> Result<CoreFit, CoreRejection> {
    let core = candidate.core;
    let residents: Vec<Container> = existing
        .iter()
        .filter(|c| c.core == core)
        .cloned()
        .collect();

    let search = minimal_bandwidth(candidate, &residents, policy.threshold);
    if !search.schedulable {
        return Err(CoreRejection::Unschedulable {
            core,
            band: search.band,
        });
    }
    if used + search.band > policy.threshold {
        return Err(CoreRejection::ThresholdExceeded {
            core,
            used,
            band: search.band,
            threshold: policy.threshold,
        });
    }

    let mut merged = residents;
    merged.push(Container {
        band: search.band,
        ..candidate.clone()
    });
    merged.sort_by(|a, b| b.priority.cmp(&a.priority));

    let mut rebalanced = Vec::new();
    for i in 0..merged.len() {
        if merged[i].priority >= candidate.priority {
            continue;
        }
        let r = minimal_bandwidth(&merged[i], &merged, policy.threshold);
        if !r.schedulable {
            return Err(CoreRejection::Cascade {
                core,
                container: merged[i].name.clone(),
            });
        }
        debug!(
            container = %merged[i].name,
            from = merged[i].band,
            to = r.band,
            "rebalanced lower-priority server"
        );
        merged[i].band = r.band;
        rebalanced.push((merged[i].name.clone(), r.band));
    }

    let total: u32 = merged.iter().map(|c| c.band).sum();
    if total > policy.threshold {
        return Err(CoreRejection::RebalancedOverThreshold {
            core,
            total,
            threshold: policy.threshold,
        });
    }

    Ok(CoreFit {
        band: search.band,
        rebalanced,
        total,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
