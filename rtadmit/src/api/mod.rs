/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! HTTP/JSON surface.
//!
//! | Endpoint | Handler |
//! |---|---|
//! | `GET /` | [`banner`] |
//! | `POST /schedulabilityTest` (alias `/shedulabilityTest`) | dry-run admission |
//! | `POST /podBind` | committing admission |
//! | `POST /podDelete` | release a container |
//! | `POST /TDMAsched`, `/TDMAremove`, `/TDMAprobe`, `/TDMAreserve` | slot allocator |
//!
//! Every reply is HTTP 200: failures travel in-band in the body, as the
//! callers expect.  `/TDMAsched` and `/TDMAremove` answer in plain text
//! (`OK` or an error message); the other endpoints answer JSON.  Bodies are
//! taken as raw bytes and parsed here so a malformed body still produces a
//! well-formed reply.
//!
//! Admission decisions hold the node lock for their whole duration and run
//! the analysis, so they are moved to the blocking pool.

pub mod types;

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::scheduler::AdmissionError;
use crate::store::{Decision, NodeStore};
use crate::task::AdmissionRequest;
use crate::tdma::{Slice, TdmaDomain};

use types::{
    BindResponse, DeleteRequest, DeleteResponse, ProbeRequest, ProbeResponse, ReserveRequest,
    ReserveResponse, SchedRequest, SchedResponse, SchedResult, SliceSpec, TDMA_BAD_PARSING,
    TDMA_OK,
};

// ── State ─────────────────────────────────────────────────────────────────────

/// Shared handles passed to every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    pub node_name: Arc<str>,
    pub store: Arc<NodeStore>,

    /// `None` when this node does not allocate TDMA slots.
    pub tdma: Option<Arc<TdmaDomain>>,
}

/// Build the router for `state`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(banner))
        .route("/schedulabilityTest", post(schedulability_test))
        .route("/shedulabilityTest", post(schedulability_test))
        .route("/podBind", post(pod_bind))
        .route("/podDelete", post(pod_delete))
        .route("/TDMAsched", post(tdma_sched))
        .route("/TDMAremove", post(tdma_remove))
        .route("/TDMAprobe", post(tdma_probe))
        .route("/TDMAreserve", post(tdma_reserve))
        .with_state(state)
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn parse<T: DeserializeOwned>(endpoint: &str, body: &Bytes) -> Result<T, serde_json::Error> {
    serde_json::from_slice(body).map_err(|e| {
        warn!(endpoint, error = %e, "malformed request body");
        e
    })
}

/// Run an admission decision on the blocking pool.
async fn decide<F>(store: &Arc<NodeStore>, f: F) -> Decision
where
    F: FnOnce(&NodeStore) -> Decision + Send + 'static,
{
    let worker = Arc::clone(store);
    match tokio::task::spawn_blocking(move || f(&worker)).await {
        Ok(decision) => decision,
        Err(e) => {
            warn!(error = %e, "admission worker failed");
            Decision {
                outcome: Err(AdmissionError::Internal(e.to_string())),
                status: store.used_bandwidths(),
            }
        }
    }
}

// ── CPU admission handlers ────────────────────────────────────────────────────

async fn banner(State(state): State<AppState>) -> String {
    format!(
        "rtadmit {} on node {}\n",
        env!("CARGO_PKG_VERSION"),
        state.node_name
    )
}

async fn schedulability_test(State(state): State<AppState>, body: Bytes) -> Json<SchedResponse> {
    let request: AdmissionRequest = match parse::<SchedRequest>("schedulabilityTest", &body) {
        Ok(r) => r.into(),
        Err(e) => {
            return Json(SchedResponse {
                sched_res: SchedResult::failure(e.to_string()),
                status: state.store.used_bandwidths(),
            })
        }
    };

    debug!(workload = %request.name, tasks = request.tasks.len(), "schedulability test");
    let decision = decide(&state.store, move |s| s.schedulability_test(&request)).await;
    Json(decision.into())
}

async fn pod_bind(State(state): State<AppState>, body: Bytes) -> Json<BindResponse> {
    let request: AdmissionRequest = match parse::<SchedRequest>("podBind", &body) {
        Ok(r) => r.into(),
        Err(e) => {
            return Json(BindResponse {
                result: SchedResult::failure(e.to_string()),
                tgid: 0,
            })
        }
    };

    debug!(workload = %request.name, tasks = request.tasks.len(), "bind");
    let decision = decide(&state.store, move |s| s.bind(&request)).await;
    Json(decision.into())
}

async fn pod_delete(State(state): State<AppState>, body: Bytes) -> Json<DeleteResponse> {
    let request = match parse::<DeleteRequest>("podDelete", &body) {
        Ok(r) => r,
        Err(_) => {
            return Json(DeleteResponse {
                removed: false,
                status: state.store.used_bandwidths(),
            })
        }
    };

    let store = Arc::clone(&state.store);
    let name = request.name;
    let removal = match tokio::task::spawn_blocking(move || store.delete(&name)).await {
        Ok(removal) => removal.into(),
        Err(e) => {
            warn!(error = %e, "delete worker failed");
            DeleteResponse {
                removed: false,
                status: state.store.used_bandwidths(),
            }
        }
    };
    Json(removal)
}

// ── TDMA handlers ─────────────────────────────────────────────────────────────

fn domain(state: &AppState) -> Option<&TdmaDomain> {
    state.tdma.as_deref()
}

const TDMA_DISABLED: &str = "TDMA allocation is not enabled on this node";

async fn tdma_sched(State(state): State<AppState>, body: Bytes) -> String {
    let Ok(wire) = parse::<SliceSpec>("TDMAsched", &body) else {
        return TDMA_BAD_PARSING.to_string();
    };
    let Some(tdma) = domain(&state) else {
        return TDMA_DISABLED.to_string();
    };

    match tdma.commit(Slice::from(wire)) {
        Ok(()) => TDMA_OK.to_string(),
        Err(e) => {
            warn!(error = %e, "TDMA commit rejected");
            e.to_string()
        }
    }
}

async fn tdma_remove(State(state): State<AppState>, body: Bytes) -> String {
    let Ok(wire) = parse::<SliceSpec>("TDMAremove", &body) else {
        return TDMA_BAD_PARSING.to_string();
    };
    let Some(tdma) = domain(&state) else {
        return TDMA_DISABLED.to_string();
    };

    tdma.release(&wire.pod_name);
    TDMA_OK.to_string()
}

async fn tdma_probe(State(state): State<AppState>, body: Bytes) -> Json<ProbeResponse> {
    let fits = match (parse::<ProbeRequest>("TDMAprobe", &body), domain(&state)) {
        (Ok(req), Some(tdma)) => tdma.fits(req.length),
        _ => false,
    };
    Json(ProbeResponse { fits })
}

async fn tdma_reserve(State(state): State<AppState>, body: Bytes) -> Json<ReserveResponse> {
    let Ok(req) = parse::<ReserveRequest>("TDMAreserve", &body) else {
        return Json(ReserveResponse {
            slice: None,
            error: TDMA_BAD_PARSING.to_string(),
        });
    };
    let Some(tdma) = domain(&state) else {
        return Json(ReserveResponse {
            slice: None,
            error: TDMA_DISABLED.to_string(),
        });
    };

    let node_name = if req.node_name.is_empty() {
        state.node_name.to_string()
    } else {
        req.node_name
    };

    match tdma.reserve(req.length, &req.pod_name, &node_name) {
        Ok(slice) => Json(ReserveResponse {
            slice: Some(slice.into()),
            error: String::new(),
        }),
        Err(e) => Json(ReserveResponse {
            slice: None,
            error: e.to_string(),
        }),
    }
}
