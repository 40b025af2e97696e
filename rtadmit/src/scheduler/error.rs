/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Structured error types for the admission engine.
//!
//! Two types model the two failure layers:
//!
//! * [`CoreRejection`]: why one specific core refused the candidate
//!   (low-level, carries exact bandwidth values).
//! * [`AdmissionError`]: top-level failure of an admission request, the
//!   text of which travels in-band in the `Error` field of the HTTP reply.
//!
//! **Do not** replace these with `anyhow::Error` in the admission path: the
//! HTTP layer matches on the variants and the rejection message is part of
//! the wire contract.

use thiserror::Error;

// ── Per-core rejection ────────────────────────────────────────────────────────

/// Reason a single core could not host the candidate.
///
/// Collected for every core inside [`AdmissionError::InsufficientBandwidth`]
/// so the caller can log exactly where each probe stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreRejection {
    /// No bandwidth below the schedulable threshold makes the candidate pass
    /// the response-time test on this core.
    Unschedulable { core: usize, band: u32 },

    /// The candidate is schedulable but the core has no headroom left for it.
    ThresholdExceeded {
        core: usize,
        used: u32,
        band: u32,
        threshold: u32,
    },

    /// Admitting the candidate would make a lower-priority co-resident
    /// container unschedulable.
    Cascade { core: usize, container: String },

    /// Every co-resident container still passes, but their enlarged bands push
    /// the core total over the threshold.
    RebalancedOverThreshold {
        core: usize,
        total: u32,
        threshold: u32,
    },
}

impl std::fmt::Display for CoreRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CoreRejection::Unschedulable { core, band } => write!(
                f,
                "core {}: not schedulable (best band {}%)",
                core, band
            ),

            CoreRejection::ThresholdExceeded {
                core,
                used,
                band,
                threshold,
            } => write!(
                f,
                "core {}: {}% used + {}% requested exceeds {}%",
                core, used, band, threshold
            ),

            CoreRejection::Cascade { core, container } => write!(
                f,
                "core {}: container '{}' would become unschedulable",
                core, container
            ),

            CoreRejection::RebalancedOverThreshold {
                core,
                total,
                threshold,
            } => write!(
                f,
                "core {}: rebalanced total {}% exceeds {}%",
                core, total, threshold
            ),
        }
    }
}

// ── Top-level admission errors ────────────────────────────────────────────────

/// Error returned by the admission orchestrator and the node store.
///
/// | Variant | Raised by |
/// |---|---|
/// | `NoTasks`, `MissingName`, `InvalidName`, `ZeroPeriod`, `ZeroWcet` | request validation |
/// | `AlreadyAdmitted` | `NodeStore::bind` |
/// | `NoPriority` | priority assigner collision |
/// | `InsufficientBandwidth` | no core admitted the candidate |
/// | `Internal` | the blocking admission worker died |
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdmissionError {
    /// The request carried an empty task list.
    #[error("no tasks provided: task list is empty")]
    NoTasks,

    /// A bind arrived without a workload name.
    #[error("workload name is empty")]
    MissingName,

    /// The name would not survive the persisted records intact: `,`, line
    /// breaks and leading or trailing whitespace are refused.
    #[error("workload name '{0}' has a reserved character or surrounding whitespace")]
    InvalidName(String),

    #[error("task {index} of '{workload}' has a zero period")]
    ZeroPeriod { workload: String, index: usize },

    #[error("task {index} of '{workload}' has a zero WCET")]
    ZeroWcet { workload: String, index: usize },

    /// A container with this name is already committed on the node.
    #[error("workload '{0}' is already admitted on this node")]
    AlreadyAdmitted(String),

    /// No free integer priority exists between the rate-monotonic neighbours.
    #[error("no free server priority for workload '{workload}' (min period {min_period_us}µs)")]
    NoPriority { workload: String, min_period_us: u64 },

    /// No core could host the candidate.  The message is part of the wire
    /// contract; per-core reasons are kept for logging.
    #[error("Not enough CPU bandwidth")]
    InsufficientBandwidth { rejections: Vec<CoreRejection> },

    #[error("admission worker failed: {0}")]
    Internal(String),
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_bandwidth_message_is_stable() {
        let err = AdmissionError::InsufficientBandwidth {
            rejections: vec![CoreRejection::Unschedulable { core: 0, band: 99 }],
        };
        assert_eq!(err.to_string(), "Not enough CPU bandwidth");
    }

    #[test]
    fn core_rejection_carries_values() {
        let r = CoreRejection::ThresholdExceeded {
            core: 1,
            used: 77,
            band: 7,
            threshold: 80,
        };
        assert_eq!(r.to_string(), "core 1: 77% used + 7% requested exceeds 80%");
    }
}
