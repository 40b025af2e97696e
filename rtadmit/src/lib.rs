/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! rtadmit – per-node real-time admission control
//!
//! Module layout:
//!
//! ```text
//! lib.rs
//! ├── task.rs         – tasks, admission requests, sporadic-server containers
//! ├── scheduler/      – response-time analysis, bandwidth search,
//! │                     priority assignment, per-core admission planning
//! ├── store/          – authoritative node state + CSV / YAML / memory backends
//! ├── tdma/           – TDMA slot allocator per cycle domain
//! ├── config/         – YAML engine configuration
//! └── api/            – HTTP/JSON endpoints (axum)
//! ```

pub mod api;
pub mod config;
pub mod scheduler;
pub mod store;
pub mod task;
pub mod tdma;
