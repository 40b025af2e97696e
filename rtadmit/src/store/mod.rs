/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Authoritative per-node admission state.
//!
//! [`NodeStore`] owns the committed containers behind one mutex.  The whole
//! admission decision (plan + commit) runs under that lock, so two concurrent
//! binds can never both claim the same headroom.  Persistence is decoupled:
//! mutations only set a dirty flag, and [`run_flush_loop`] periodically
//! snapshots the state under the lock and writes it through the configured
//! [`Storage`] backend outside the lock.

pub mod flat_file;
pub mod storage;
pub mod yaml;

pub use flat_file::FlatFileStorage;
pub use storage::{MemoryStorage, Storage, StorageError};
pub use yaml::YamlStorage;

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::scheduler::{plan_admission, validate_name, AdmissionError, AdmissionPolicy};
use crate::task::{per_core_bandwidth, AdmissionRequest, Container};

// ── Result types ──────────────────────────────────────────────────────────────

/// Where an admitted workload went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub core: usize,
    pub band: u32,
    pub priority: i32,

    /// Resource-group handle; only assigned by a committing bind.
    pub tgid: Option<u32>,
}

/// Outcome of a dry run or bind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub outcome: Result<Placement, AdmissionError>,

    /// Per-core used bandwidth: after the (hypothetical) commit on success,
    /// unchanged on failure.
    pub status: Vec<u32>,
}

impl Decision {
    pub fn is_admitted(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Outcome of a delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removal {
    /// The container that was removed, if the name was known.
    pub removed: Option<Container>,
    pub status: Vec<u32>,
}

// ── Internal state ────────────────────────────────────────────────────────────

#[derive(Debug)]
struct NodeState {
    containers: Vec<Container>,
    dirty: bool,
    next_tgid: u32,

    /// Last availability reported: `true` while some core is below the
    /// threshold.
    schedulable: bool,
}

impl NodeState {
    fn used(&self, cores: usize) -> Vec<u32> {
        per_core_bandwidth(&self.containers, cores)
    }

    /// Recompute availability and log transitions.
    fn refresh_availability(&mut self, policy: &AdmissionPolicy) {
        let now = self
            .used(policy.cores)
            .iter()
            .any(|&u| u < policy.threshold);
        if now != self.schedulable {
            self.schedulable = now;
            if now {
                info!("node has bandwidth again, marked schedulable");
            } else {
                warn!("every core at threshold, node marked saturated");
            }
        }
    }
}

// ── NodeStore ─────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct NodeStore {
    state: Mutex<NodeState>,
    storage: Box<dyn Storage>,
    policy: AdmissionPolicy,
}

impl NodeStore {
    /// Restore the committed containers from `storage`.
    ///
    /// Containers pinned to a core outside `0..policy.cores` are dropped with
    /// a warning (and the next flush forgets them).
    ///
    /// # Errors
    /// Returns the backend error if the persisted state cannot be read.
    pub fn open(storage: Box<dyn Storage>, policy: AdmissionPolicy) -> Result<Self, StorageError> {
        let restored = storage.load(policy.server_period_us)?;
        let total = restored.len();

        let (containers, dropped): (Vec<Container>, Vec<Container>) = restored
            .into_iter()
            .partition(|c| c.core < policy.cores);
        for c in &dropped {
            warn!(
                container = %c.name,
                core = c.core,
                cores = policy.cores,
                "restored container is pinned to a missing core, dropped"
            );
        }

        info!(
            backend = storage.backend(),
            restored = total - dropped.len(),
            dropped = dropped.len(),
            "node state restored"
        );

        let mut state = NodeState {
            containers,
            dirty: !dropped.is_empty(),
            next_tgid: 1,
            schedulable: true,
        };
        state.refresh_availability(&policy);

        Ok(Self {
            state: Mutex::new(state),
            storage,
            policy,
        })
    }

    fn lock(&self) -> MutexGuard<'_, NodeState> {
        // Plans are applied in one step, so a poisoned state is consistent.
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ── Admission ─────────────────────────────────────────────────────────────

    /// Dry run: would `request` be admitted right now?  Commits nothing.
    pub fn schedulability_test(&self, request: &AdmissionRequest) -> Decision {
        let state = self.lock();
        let status = state.used(self.policy.cores);

        if !request.name.is_empty() {
            if let Err(e) = validate_name(&request.name) {
                return Decision {
                    outcome: Err(e),
                    status,
                };
            }
        }

        match plan_admission(request, &state.containers, &self.policy) {
            Ok(plan) => Decision {
                outcome: Ok(Placement {
                    core: plan.container.core,
                    band: plan.container.band,
                    priority: plan.container.priority,
                    tgid: None,
                }),
                status: plan.used,
            },
            Err(e) => Decision { outcome: Err(e), status },
        }
    }

    /// Admit `request` and commit the placement.
    pub fn bind(&self, request: &AdmissionRequest) -> Decision {
        let mut state = self.lock();
        let status = state.used(self.policy.cores);

        if let Err(e) = validate_name(&request.name) {
            return Decision {
                outcome: Err(e),
                status,
            };
        }
        if state.containers.iter().any(|c| c.name == request.name) {
            warn!(workload = %request.name, "bind rejected: already admitted");
            return Decision {
                outcome: Err(AdmissionError::AlreadyAdmitted(request.name.clone())),
                status,
            };
        }

        let plan = match plan_admission(request, &state.containers, &self.policy) {
            Ok(plan) => plan,
            Err(e) => return Decision { outcome: Err(e), status },
        };

        let tgid = state.next_tgid;
        state.next_tgid = state.next_tgid.wrapping_add(1).max(1);

        let placement = Placement {
            core: plan.container.core,
            band: plan.container.band,
            priority: plan.container.priority,
            tgid: Some(tgid),
        };
        let status = plan.used.clone();

        plan.apply(&mut state.containers);
        state.dirty = true;
        state.refresh_availability(&self.policy);

        info!(
            workload = %request.name,
            core = placement.core,
            band = placement.band,
            priority = placement.priority,
            tgid,
            used = ?status,
            "workload bound"
        );

        Decision {
            outcome: Ok(placement),
            status,
        }
    }

    /// Remove the container called `name`.  Unknown names are not an error.
    pub fn delete(&self, name: &str) -> Removal {
        let mut state = self.lock();

        let removed = state
            .containers
            .iter()
            .position(|c| c.name == name)
            .map(|i| state.containers.remove(i));

        if let Some(c) = &removed {
            state.dirty = true;
            state.refresh_availability(&self.policy);
            info!(workload = %name, core = c.core, band = c.band, "workload released");
        } else {
            debug!(workload = %name, "delete of unknown workload ignored");
        }

        Removal {
            removed,
            status: state.used(self.policy.cores),
        }
    }

    // ── Queries ───────────────────────────────────────────────────────────────

    /// Snapshot of the committed containers, in admission order.
    pub fn list(&self) -> Vec<Container> {
        self.lock().containers.clone()
    }

    pub fn used_bandwidths(&self) -> Vec<u32> {
        self.lock().used(self.policy.cores)
    }

    pub fn is_dirty(&self) -> bool {
        self.lock().dirty
    }

    /// `false` once every core has reached the threshold.
    pub fn is_schedulable(&self) -> bool {
        self.lock().schedulable
    }

    // ── Persistence ───────────────────────────────────────────────────────────

    /// Write the current state if it changed since the last flush.
    ///
    /// Returns `Ok(true)` if a snapshot was written.  On failure the state is
    /// marked dirty again so the next flush retries.
    pub fn flush(&self) -> Result<bool, StorageError> {
        let snapshot = {
            let mut state = self.lock();
            if !state.dirty {
                return Ok(false);
            }
            state.dirty = false;
            state.containers.clone()
        };

        match self.storage.save(&snapshot) {
            Ok(()) => {
                debug!(
                    backend = self.storage.backend(),
                    containers = snapshot.len(),
                    "node state flushed"
                );
                Ok(true)
            }
            Err(e) => {
                self.lock().dirty = true;
                Err(e)
            }
        }
    }
}

/// Flush `store` every `interval`, forever.
///
/// Storage errors are logged and retried on the next tick; they never affect
/// admission.
pub async fn run_flush_loop(store: Arc<NodeStore>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let store = Arc::clone(&store);
        match tokio::task::spawn_blocking(move || store.flush()).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => warn!("state flush failed: {}", e),
            Err(e) => warn!("state flush task failed: {}", e),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Criticality, Task};

    /// Storage that always fails to save.
    #[derive(Debug)]
    struct BrokenStorage;

    impl Storage for BrokenStorage {
        fn backend(&self) -> &'static str {
            "broken"
        }

        fn load(&self, _: u64) -> Result<Vec<Container>, StorageError> {
            Ok(Vec::new())
        }

        fn save(&self, _: &[Container]) -> Result<(), StorageError> {
            Err(StorageError::Io {
                path: "/dev/full".into(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
            })
        }
    }

    fn pod_request(name: &str) -> AdmissionRequest {
        AdmissionRequest {
            name: name.into(),
            tasks: vec![
                Task {
                    period_us: 100_000,
                    wcet_us: 3_000,
                    priority: 8,
                },
                Task {
                    period_us: 12_000,
                    wcet_us: 10,
                    priority: 10,
                },
                Task {
                    period_us: 2_500,
                    wcet_us: 50,
                    priority: 13,
                },
            ],
            criticality: Criticality::Hi,
        }
    }

    fn make_store(cores: usize) -> NodeStore {
        NodeStore::open(Box::new(MemoryStorage::new()), AdmissionPolicy::new(cores)).unwrap()
    }

    // ── Dry run / bind ────────────────────────────────────────────────────────

    #[test]
    fn dry_run_is_idempotent() {
        let store = make_store(2);
        let a = store.schedulability_test(&pod_request("pod1"));
        let b = store.schedulability_test(&pod_request("pod1"));

        assert_eq!(a, b);
        assert_eq!(a.status, vec![7, 0]);
        assert!(store.list().is_empty());
        assert!(!store.is_dirty());
    }

    #[test]
    fn dry_run_accepts_anonymous_workloads() {
        let store = make_store(1);
        assert!(store.schedulability_test(&pod_request("")).is_admitted());
    }

    #[test]
    fn bind_commits_and_assigns_tgids() {
        let store = make_store(2);

        let first = store.bind(&pod_request("pod1"));
        assert_eq!(
            first.outcome,
            Ok(Placement {
                core: 0,
                band: 7,
                priority: 128,
                tgid: Some(1),
            })
        );
        assert_eq!(first.status, vec![7, 0]);

        let second = store.bind(&pod_request("pod2"));
        assert_eq!(second.outcome.as_ref().unwrap().tgid, Some(2));
        assert_eq!(second.status, vec![17, 0]);
        assert_eq!(store.used_bandwidths(), vec![17, 0]);
        assert!(store.is_dirty());
    }

    #[test]
    fn bind_requires_a_name() {
        let store = make_store(1);
        let d = store.bind(&pod_request(""));
        assert_eq!(d.outcome, Err(AdmissionError::MissingName));
        assert!(store.list().is_empty());
    }

    #[test]
    fn bound_names_survive_a_restart_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let open = || {
            NodeStore::open(
                Box::new(FlatFileStorage::new(dir.path())),
                AdmissionPolicy::new(1),
            )
            .unwrap()
        };

        let store = open();
        let padded = store.bind(&pod_request(" pod1"));
        assert_eq!(
            padded.outcome,
            Err(AdmissionError::InvalidName(" pod1".into()))
        );
        assert!(store.bind(&pod_request("my pod")).is_admitted());
        assert!(store.flush().unwrap());

        let restarted = open();
        assert!(restarted.delete("my pod").removed.is_some());
        assert_eq!(restarted.used_bandwidths(), vec![0]);
    }

    #[test]
    fn duplicate_bind_is_rejected() {
        let store = make_store(1);
        assert!(store.bind(&pod_request("pod1")).is_admitted());

        let again = store.bind(&pod_request("pod1"));
        assert_eq!(
            again.outcome,
            Err(AdmissionError::AlreadyAdmitted("pod1".into()))
        );
        assert_eq!(again.status, vec![7]);
        assert_eq!(store.list().len(), 1);
    }

    #[test]
    fn rejection_leaves_status_unchanged() {
        let store = make_store(1);
        let d = store.schedulability_test(&AdmissionRequest {
            name: "hog".into(),
            tasks: vec![Task {
                period_us: 100_000,
                wcet_us: 90_000,
                priority: 1,
            }],
            criticality: Criticality::Hi,
        });
        assert_eq!(
            d.outcome.unwrap_err().to_string(),
            "Not enough CPU bandwidth"
        );
        assert_eq!(d.status, vec![0]);
    }

    // ── Delete ────────────────────────────────────────────────────────────────

    #[test]
    fn delete_is_the_inverse_of_bind() {
        let store = make_store(2);
        store.bind(&pod_request("pod1"));
        let before = store.used_bandwidths();

        store.bind(&pod_request("pod2"));
        let removal = store.delete("pod2");

        assert_eq!(removal.removed.map(|c| c.name), Some("pod2".to_string()));
        assert_eq!(removal.status, before);
    }

    #[test]
    fn delete_of_unknown_name_changes_nothing() {
        let store = make_store(1);
        store.bind(&pod_request("pod1"));
        store.flush().unwrap();

        let removal = store.delete("ghost");
        assert!(removal.removed.is_none());
        assert_eq!(removal.status, vec![7]);
        assert!(!store.is_dirty());
    }

    // ── Availability ──────────────────────────────────────────────────────────

    #[test]
    fn availability_follows_headroom() {
        let policy = AdmissionPolicy {
            threshold: 7,
            ..AdmissionPolicy::new(1)
        };
        // A single 7 % server saturates the only core.
        let storage = MemoryStorage::with_containers(vec![Container {
            name: "pod1".into(),
            tasks: pod_request("pod1").tasks,
            band: 7,
            period_us: 2_500,
            priority: 128,
            core: 0,
        }]);
        let store = NodeStore::open(Box::new(storage), policy).unwrap();
        assert!(!store.is_schedulable());

        store.delete("pod1");
        assert!(store.is_schedulable());
    }

    // ── Restore / flush ───────────────────────────────────────────────────────

    #[test]
    fn restore_drops_containers_on_missing_cores() {
        let stray = Container {
            name: "stray".into(),
            tasks: pod_request("stray").tasks,
            band: 7,
            period_us: 2_500,
            priority: 128,
            core: 3,
        };
        let keep = Container {
            name: "keep".into(),
            core: 0,
            ..stray.clone()
        };

        let storage = MemoryStorage::with_containers(vec![keep, stray]);
        let store = NodeStore::open(Box::new(storage), AdmissionPolicy::new(2)).unwrap();

        let names: Vec<String> = store.list().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["keep".to_string()]);
        assert!(store.is_dirty(), "dropping must be persisted");
    }

    #[test]
    fn flush_writes_only_when_dirty() {
        let store = make_store(1);
        assert!(!store.flush().unwrap());

        store.bind(&pod_request("pod1"));
        assert!(store.flush().unwrap());
        assert!(!store.is_dirty());
        assert!(!store.flush().unwrap());
    }

    #[test]
    fn failed_flush_marks_state_dirty_again() {
        let store = NodeStore::open(Box::new(BrokenStorage), AdmissionPolicy::new(1)).unwrap();
        store.bind(&pod_request("pod1"));

        assert!(store.flush().is_err());
        assert!(store.is_dirty());
        // Admission state is unaffected.
        assert_eq!(store.used_bandwidths(), vec![7]);
    }

    #[test]
    fn rebalanced_bands_are_committed() {
        let store = make_store(1);
        let bulk = AdmissionRequest {
            name: "bulk".into(),
            tasks: vec![Task {
                period_us: 100_000,
                wcet_us: 20_000,
                priority: 1,
            }],
            criticality: Criticality::Hi,
        };
        let fast = AdmissionRequest {
            name: "fast".into(),
            tasks: vec![Task {
                period_us: 2_500,
                wcet_us: 300,
                priority: 1,
            }],
            criticality: Criticality::Hi,
        };
        store.bind(&bulk);
        let d = store.bind(&fast);

        assert_eq!(d.status, vec![35]);
        let bands: Vec<(String, u32)> = store
            .list()
            .into_iter()
            .map(|c| (c.name, c.band))
            .collect();
        assert_eq!(
            bands,
            vec![("bulk".to_string(), 22), ("fast".to_string(), 13)]
        );
    }
}
