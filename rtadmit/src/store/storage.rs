/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Persistence seam of the node store.
//!
//! The store only ever hands a backend a complete snapshot and only ever
//! asks for one back at startup.  Backends exchange flat records:
//!
//! ```text
//! containers: name,bandwidth,priority,core
//! tasks:      containerName,wcet,period,priority
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::task::{Container, Task};

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A persisted line could not be parsed.
    #[error("{}:{line}: {reason}", path.display())]
    Malformed {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("YAML error in {}: {source}", path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

// ── Trait ─────────────────────────────────────────────────────────────────────

/// A place the committed containers can be written to and restored from.
pub trait Storage: Send + Sync + std::fmt::Debug {
    /// Short backend name for logs.
    fn backend(&self) -> &'static str;

    /// Restore every persisted container.  Servers are rebuilt with
    /// `server_period_us`, which is node configuration rather than state.
    fn load(&self, server_period_us: u64) -> Result<Vec<Container>, StorageError>;

    /// Replace whatever is stored with `containers`.
    fn save(&self, containers: &[Container]) -> Result<(), StorageError>;
}

// ── Records ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerRecord {
    pub name: String,
    pub bandwidth: u32,
    pub priority: i32,
    pub core: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub container: String,
    pub wcet: u64,
    pub period: u64,
    pub priority: i32,
}

/// Flatten containers into records, tasks in container order.
pub fn to_records(containers: &[Container]) -> (Vec<ContainerRecord>, Vec<TaskRecord>) {
    let heads = containers
        .iter()
        .map(|c| ContainerRecord {
            name: c.name.clone(),
            bandwidth: c.band,
            priority: c.priority,
            core: c.core,
        })
        .collect();

    let tasks = containers
        .iter()
        .flat_map(|c| {
            c.tasks.iter().map(move |t| TaskRecord {
                container: c.name.clone(),
                wcet: t.wcet_us,
                period: t.period_us,
                priority: t.priority,
            })
        })
        .collect();

    (heads, tasks)
}

/// Rebuild containers from records.
///
/// Task records naming an unknown container are dropped with a warning; task
/// order within a container follows record order.
pub fn from_records(
    heads: Vec<ContainerRecord>,
    tasks: Vec<TaskRecord>,
    server_period_us: u64,
) -> Vec<Container> {
    let mut containers: Vec<Container> = heads
        .into_iter()
        .map(|r| Container {
            name: r.name,
            tasks: Vec::new(),
            band: r.bandwidth,
            period_us: server_period_us,
            priority: r.priority,
            core: r.core,
        })
        .collect();

    let index: HashMap<String, usize> = containers
        .iter()
        .enumerate()
        .map(|(i, c)| (c.name.clone(), i))
        .collect();

    for t in tasks {
        match index.get(&t.container) {
            Some(&i) => containers[i].tasks.push(Task {
                period_us: t.period,
                wcet_us: t.wcet,
                priority: t.priority,
            }),
            None => warn!(container = %t.container, "task record for unknown container dropped"),
        }
    }

    containers
}

// ── MemoryStorage ─────────────────────────────────────────────────────────────

/// Keeps the last snapshot in memory.  Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    snapshot: Mutex<Vec<Container>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a pre-populated snapshot.
    pub fn with_containers(containers: Vec<Container>) -> Self {
        Self {
            snapshot: Mutex::new(containers),
        }
    }

    /// Copy of the last saved snapshot.
    pub fn snapshot(&self) -> Vec<Container> {
        self.snapshot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl Storage for MemoryStorage {
    fn backend(&self) -> &'static str {
        "memory"
    }

    fn load(&self, server_period_us: u64) -> Result<Vec<Container>, StorageError> {
        let mut containers = self.snapshot();
        for c in &mut containers {
            c.period_us = server_period_us;
        }
        Ok(containers)
    }

    fn save(&self, containers: &[Container]) -> Result<(), StorageError> {
        *self
            .snapshot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = containers.to_vec();
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
