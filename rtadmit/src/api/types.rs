/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! JSON wire types.
//!
//! Field names are PascalCase on the wire.  Conversions to and from the
//! engine's own types live here so handlers stay thin.

use serde::{Deserialize, Serialize};

use crate::store::{Decision, Removal};
use crate::task::{AdmissionRequest, Criticality, Task};
use crate::tdma::Slice;

// ── CPU admission ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TaskSpec {
    #[serde(alias = "period")]
    pub period: u64,
    #[serde(alias = "wcet")]
    pub wcet: u64,
    #[serde(alias = "prio")]
    pub prio: i32,
}

/// Body of `/schedulabilityTest` and `/podBind`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SchedRequest {
    #[serde(alias = "tasks")]
    pub tasks: Vec<TaskSpec>,
    #[serde(default, alias = "name")]
    pub name: String,
    #[serde(default, alias = "criticality")]
    pub criticality: String,
}

impl From<SchedRequest> for AdmissionRequest {
    fn from(r: SchedRequest) -> Self {
        AdmissionRequest {
            name: r.name,
            tasks: r
                .tasks
                .into_iter()
                .map(|t| Task {
                    period_us: t.period,
                    wcet_us: t.wcet,
                    priority: t.prio,
                })
                .collect(),
            criticality: Criticality::from_label(&r.criticality),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SchedResult {
    pub schedulable: bool,
    pub bandwidth: u32,
    pub core: usize,
    pub error: String,
}

impl SchedResult {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            ..Self::default()
        }
    }
}

impl From<&Decision> for SchedResult {
    fn from(d: &Decision) -> Self {
        match &d.outcome {
            Ok(p) => SchedResult {
                schedulable: true,
                bandwidth: p.band,
                core: p.core,
                error: String::new(),
            },
            Err(e) => SchedResult::failure(e.to_string()),
        }
    }
}

/// Reply of `/schedulabilityTest`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SchedResponse {
    pub sched_res: SchedResult,
    pub status: Vec<u32>,
}

impl From<Decision> for SchedResponse {
    fn from(d: Decision) -> Self {
        SchedResponse {
            sched_res: SchedResult::from(&d),
            status: d.status,
        }
    }
}

/// Reply of `/podBind`.  `TGID` is 0 when nothing was bound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BindResponse {
    pub result: SchedResult,
    #[serde(rename = "TGID")]
    pub tgid: u32,
}

impl From<Decision> for BindResponse {
    fn from(d: Decision) -> Self {
        let tgid = d
            .outcome
            .as_ref()
            .ok()
            .and_then(|p| p.tgid)
            .unwrap_or(0);
        BindResponse {
            result: SchedResult::from(&d),
            tgid,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeleteRequest {
    #[serde(alias = "name")]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeleteResponse {
    pub removed: bool,
    pub status: Vec<u32>,
}

impl From<Removal> for DeleteResponse {
    fn from(r: Removal) -> Self {
        DeleteResponse {
            removed: r.removed.is_some(),
            status: r.status,
        }
    }
}

// ── TDMA ──────────────────────────────────────────────────────────────────────

/// Reply of the TDMA commit/remove endpoints on success.
pub const TDMA_OK: &str = "OK";

/// Reply of the TDMA endpoints to an unparsable body.
pub const TDMA_BAD_PARSING: &str = "Bad parsing";

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SliceSpec {
    pub begin: i64,
    pub end: i64,
    #[serde(default)]
    pub pod_name: String,
    #[serde(default)]
    pub node_name: String,
}

impl From<SliceSpec> for Slice {
    fn from(s: SliceSpec) -> Self {
        Slice {
            begin_us: s.begin,
            end_us: s.end,
            pod_name: s.pod_name,
            node_name: s.node_name,
        }
    }
}

impl From<Slice> for SliceSpec {
    fn from(s: Slice) -> Self {
        SliceSpec {
            begin: s.begin_us,
            end: s.end_us,
            pod_name: s.pod_name,
            node_name: s.node_name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProbeRequest {
    pub length: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProbeResponse {
    pub fits: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReserveRequest {
    pub length: i64,
    pub pod_name: String,
    #[serde(default)]
    pub node_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReserveResponse {
    pub slice: Option<SliceSpec>,
    pub error: String,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
