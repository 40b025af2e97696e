/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! TDMA slot allocation within a fixed major cycle.
//!
//! A cycle domain hands out non-overlapping time windows (`[begin, end)` in
//! µs, relative to the cycle start) to pods.  Slices are kept sorted by
//! `begin`.  The head of the cycle, `[0, reserved_head)`, is held by an
//! ownerless sentinel slice for overhead.  Neighbouring slices are always
//! separated by at least half a guard band:
//!
//! ```text
//! 0        head        begin         end                     cycle
//! |██████████|<- g/2 ->|████ pod ████|<- ≥ g/2 ->|  ...       |
//! ```
//!
//! Placement is first-fit with no compaction: released slices leave holes
//! that later requests may fill.

pub mod error;

pub use error::TdmaError;

use std::sync::{Mutex, MutexGuard};

use tracing::{debug, info};

// ── Constants ─────────────────────────────────────────────────────────────────

pub const DEFAULT_MAJOR_CYCLE_US: i64 = 5_000;
pub const DEFAULT_GUARD_BAND_US: i64 = 20;
pub const DEFAULT_RESERVED_HEAD_US: i64 = 100;

// ── Types ─────────────────────────────────────────────────────────────────────

/// Parameters of one cycle domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TdmaConfig {
    /// Address of the node that owns the cycle.
    pub master: String,
    pub major_cycle_us: i64,
    pub guard_band_us: i64,

    /// Length of the sentinel slice at the start of the cycle.
    pub reserved_head_us: i64,
}

impl Default for TdmaConfig {
    fn default() -> Self {
        Self {
            master: String::new(),
            major_cycle_us: DEFAULT_MAJOR_CYCLE_US,
            guard_band_us: DEFAULT_GUARD_BAND_US,
            reserved_head_us: DEFAULT_RESERVED_HEAD_US,
        }
    }
}

/// A time window owned by one pod on one node.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Slice {
    pub begin_us: i64,
    pub end_us: i64,
    pub pod_name: String,
    pub node_name: String,
}

impl Slice {
    pub fn len_us(&self) -> i64 {
        self.end_us.saturating_sub(self.begin_us)
    }

    /// The head reservation has no owner.
    pub fn is_sentinel(&self) -> bool {
        self.pod_name.is_empty()
    }
}

// ── TdmaAllocator ─────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct TdmaAllocator {
    config: TdmaConfig,
    slices: Vec<Slice>,
}

impl TdmaAllocator {
    /// Empty cycle holding only the head sentinel.
    pub fn new(config: TdmaConfig) -> Self {
        let sentinel = Slice {
            begin_us: 0,
            end_us: config.reserved_head_us,
            ..Slice::default()
        };
        Self {
            config,
            slices: vec![sentinel],
        }
    }

    pub fn config(&self) -> &TdmaConfig {
        &self.config
    }

    /// All slices including the sentinel, sorted by `begin_us`.
    pub fn slices(&self) -> &[Slice] {
        &self.slices
    }

    fn half_guard(&self) -> i64 {
        self.config.guard_band_us / 2
    }

    /// Start of the first gap that can hold `length_us`, if any.
    ///
    /// Lengths outside `(0, major_cycle]` never fit; every slice lies inside
    /// the cycle, so the remaining arithmetic stays within it.
    fn first_fit(&self, length_us: i64) -> Option<i64> {
        if length_us <= 0 || length_us > self.config.major_cycle_us {
            return None;
        }
        let needed = length_us.checked_add(self.config.guard_band_us)?;

        let gap = self
            .slices
            .windows(2)
            .find(|pair| pair[1].begin_us.saturating_sub(pair[0].end_us) > needed)
            .map(|pair| pair[0].end_us);

        gap.or_else(|| {
            let last = self.slices.last()?.end_us;
            (last < self.config.major_cycle_us.saturating_sub(needed)).then_some(last)
        })
        .and_then(|end| end.checked_add(self.half_guard()))
    }

    /// Read-only probe: would a slice of `length_us` fit right now?
    pub fn fits(&self, length_us: i64) -> bool {
        self.first_fit(length_us).is_some()
    }

    /// Place a slice of `length_us` for `pod_name` at the first fitting gap.
    ///
    /// # Errors
    /// [`TdmaError::Unsatisfiable`] when no gap is wide enough; validation
    /// errors for a non-positive length or a missing pod name.
    pub fn reserve(
        &mut self,
        length_us: i64,
        pod_name: &str,
        node_name: &str,
    ) -> Result<Slice, TdmaError> {
        if length_us <= 0 {
            return Err(TdmaError::InvalidLength(length_us));
        }
        if pod_name.is_empty() {
            return Err(TdmaError::MissingPodName);
        }

        let unsatisfiable = TdmaError::Unsatisfiable { length_us };
        let begin_us = self.first_fit(length_us).ok_or(unsatisfiable.clone())?;
        let end_us = begin_us.checked_add(length_us).ok_or(unsatisfiable)?;

        let slice = Slice {
            begin_us,
            end_us,
            pod_name: pod_name.to_string(),
            node_name: node_name.to_string(),
        };
        self.insert_sorted(slice.clone());

        info!(
            pod = pod_name,
            node = node_name,
            begin_us,
            end_us = slice.end_us,
            "TDMA slice reserved"
        );
        Ok(slice)
    }

    /// Commit a slice at the exact position chosen by the caller.
    ///
    /// The slice must lie inside the cycle and keep half a guard band from
    /// every existing slice and from the cycle end.
    pub fn commit(&mut self, slice: Slice) -> Result<(), TdmaError> {
        if slice.pod_name.is_empty() {
            return Err(TdmaError::MissingPodName);
        }

        let cycle_us = self.config.major_cycle_us;
        if slice.begin_us < 0 || slice.end_us > cycle_us {
            return Err(TdmaError::OutOfCycle {
                begin_us: slice.begin_us,
                end_us: slice.end_us,
                cycle_us,
            });
        }
        if slice.len_us() <= 0 {
            return Err(TdmaError::InvalidLength(slice.len_us()));
        }

        let half = self.half_guard();
        if slice.end_us.saturating_add(half) > cycle_us {
            return Err(TdmaError::OutOfCycle {
                begin_us: slice.begin_us,
                end_us: slice.end_us,
                cycle_us,
            });
        }

        let clash = self.slices.iter().find(|other| {
            !(other.end_us.saturating_add(half) <= slice.begin_us
                || slice.end_us.saturating_add(half) <= other.begin_us)
        });
        if let Some(other) = clash {
            debug!(
                pod = %slice.pod_name,
                other = %other.pod_name,
                "TDMA slice conflicts with existing slice"
            );
            return Err(TdmaError::Conflict {
                begin_us: slice.begin_us,
                end_us: slice.end_us,
                other_begin_us: other.begin_us,
                other_end_us: other.end_us,
                other_pod: other.pod_name.clone(),
            });
        }

        info!(
            pod = %slice.pod_name,
            node = %slice.node_name,
            begin_us = slice.begin_us,
            end_us = slice.end_us,
            "TDMA slice committed"
        );
        self.insert_sorted(slice);
        Ok(())
    }

    /// Remove every slice owned by `pod_name`; returns what was removed.
    ///
    /// The sentinel is never released.  Unknown pods release nothing.
    pub fn release(&mut self, pod_name: &str) -> Vec<Slice> {
        if pod_name.is_empty() {
            return Vec::new();
        }

        let (released, kept): (Vec<Slice>, Vec<Slice>) = std::mem::take(&mut self.slices)
            .into_iter()
            .partition(|s| s.pod_name == pod_name);
        self.slices = kept;

        if !released.is_empty() {
            info!(pod = pod_name, count = released.len(), "TDMA slices released");
        }
        released
    }

    fn insert_sorted(&mut self, slice: Slice) {
        let at = self.slices.partition_point(|s| s.begin_us <= slice.begin_us);
        self.slices.insert(at, slice);
    }
}

// ── TdmaDomain ────────────────────────────────────────────────────────────────

/// A cycle domain shared between request handlers.
///
/// Each operation takes the domain lock for its whole duration, so probe and
/// reserve each see a consistent slice list.
#[derive(Debug)]
pub struct TdmaDomain {
    allocator: Mutex<TdmaAllocator>,
}

impl TdmaDomain {
    pub fn new(config: TdmaConfig) -> Self {
        Self {
            allocator: Mutex::new(TdmaAllocator::new(config)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TdmaAllocator> {
        self.allocator
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn fits(&self, length_us: i64) -> bool {
        self.lock().fits(length_us)
    }

    pub fn reserve(
        &self,
        length_us: i64,
        pod_name: &str,
        node_name: &str,
    ) -> Result<Slice, TdmaError> {
        self.lock().reserve(length_us, pod_name, node_name)
    }

    pub fn commit(&self, slice: Slice) -> Result<(), TdmaError> {
        self.lock().commit(slice)
    }

    pub fn release(&self, pod_name: &str) -> Vec<Slice> {
        self.lock().release(pod_name)
    }

    pub fn slices(&self) -> Vec<Slice> {
        self.lock().slices().to_vec()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn make_config(major_cycle_us: i64, reserved_head_us: i64) -> TdmaConfig {
        TdmaConfig {
            master: "192.168.1.1".into(),
            major_cycle_us,
            guard_band_us: DEFAULT_GUARD_BAND_US,
            reserved_head_us,
        }
    }

    fn make_slice(begin_us: i64, end_us: i64, pod: &str) -> Slice {
        Slice {
            begin_us,
            end_us,
            pod_name: pod.into(),
            node_name: "node10".into(),
        }
    }

    /// Every pair of neighbours keeps half a guard band apart, and the last
    /// slice stays inside the cycle.
    fn assert_well_separated(alloc: &TdmaAllocator) {
        let half = alloc.config().guard_band_us / 2;
        for pair in alloc.slices().windows(2) {
            assert!(
                pair[0].end_us + half <= pair[1].begin_us,
                "{:?} too close to {:?}",
                pair[0],
                pair[1]
            );
        }
        let last = alloc.slices().last().unwrap();
        assert!(last.end_us <= alloc.config().major_cycle_us);
    }

    // ── reserve ───────────────────────────────────────────────────────────────

    #[test]
    fn first_slice_without_head_starts_after_half_guard() {
        let mut alloc = TdmaAllocator::new(make_config(4_000, 0));
        let s = alloc.reserve(50, "pod1", "node10").unwrap();
        assert_eq!((s.begin_us, s.end_us), (10, 60));
    }

    #[test]
    fn first_slice_with_default_head_starts_after_head() {
        let mut alloc = TdmaAllocator::new(make_config(4_000, DEFAULT_RESERVED_HEAD_US));
        let s = alloc.reserve(50, "pod1", "node10").unwrap();
        assert_eq!((s.begin_us, s.end_us), (110, 160));
    }

    #[test]
    fn full_cycle_request_is_rejected() {
        let mut alloc = TdmaAllocator::new(make_config(4_000, 0));
        assert!(!alloc.fits(4_000));
        assert_eq!(
            alloc.reserve(4_000, "pod1", "node10"),
            Err(TdmaError::Unsatisfiable { length_us: 4_000 })
        );
        assert_eq!(alloc.slices().len(), 1);
    }

    #[test]
    fn consecutive_reservations_are_packed_in_order() {
        let mut alloc = TdmaAllocator::new(make_config(4_000, 0));
        let a = alloc.reserve(50, "a", "n").unwrap();
        let b = alloc.reserve(50, "b", "n").unwrap();
        assert_eq!(b.begin_us, a.end_us + 10);
        assert_well_separated(&alloc);
    }

    #[test]
    fn released_hole_is_reused_first_fit() {
        let mut alloc = TdmaAllocator::new(make_config(4_000, 0));
        alloc.reserve(500, "a", "n").unwrap();
        alloc.reserve(500, "b", "n").unwrap();
        alloc.reserve(500, "c", "n").unwrap();

        alloc.release("b");
        let d = alloc.reserve(100, "d", "n").unwrap();
        // Directly after "a", inside the hole left by "b".
        assert_eq!(d.begin_us, 510 + 10);
        assert_well_separated(&alloc);
    }

    #[test]
    fn gap_must_exceed_length_plus_guard() {
        let mut alloc = TdmaAllocator::new(make_config(4_000, 0));
        // Hole between a and c is exactly 120 µs wide.
        alloc.commit(make_slice(10, 100, "a")).unwrap();
        alloc.commit(make_slice(220, 300, "c")).unwrap();

        let s = alloc.reserve(100, "b", "n").unwrap();
        assert_eq!(s.begin_us, 310, "100 + 20 does not fit a 120 µs hole");
        let t = alloc.reserve(99, "d", "n").unwrap();
        assert_eq!(t.begin_us, 110);
    }

    #[test]
    fn pods_may_hold_several_slices() {
        let mut alloc = TdmaAllocator::new(make_config(4_000, 0));
        alloc.reserve(50, "a", "n").unwrap();
        alloc.reserve(50, "a", "n").unwrap();
        assert_eq!(alloc.release("a").len(), 2);
        assert_eq!(alloc.slices().len(), 1);
    }

    #[test]
    fn reserve_validates_input() {
        let mut alloc = TdmaAllocator::new(make_config(4_000, 0));
        assert_eq!(alloc.reserve(0, "a", "n"), Err(TdmaError::InvalidLength(0)));
        assert_eq!(alloc.reserve(10, "", "n"), Err(TdmaError::MissingPodName));
        assert!(!alloc.fits(-5));
    }

    // ── commit ────────────────────────────────────────────────────────────────

    #[test]
    fn commit_accepts_probed_position() {
        let mut alloc = TdmaAllocator::new(make_config(4_000, DEFAULT_RESERVED_HEAD_US));
        alloc.commit(make_slice(110, 160, "pod1")).unwrap();
        assert_eq!(alloc.slices().len(), 2);
    }

    #[test]
    fn commit_rejects_slice_inside_guard() {
        let mut alloc = TdmaAllocator::new(make_config(4_000, DEFAULT_RESERVED_HEAD_US));
        let err = alloc.commit(make_slice(105, 160, "pod1")).unwrap_err();
        assert!(matches!(err, TdmaError::Conflict { other_end_us: 100, .. }));
    }

    #[test]
    fn commit_rejects_overlap() {
        let mut alloc = TdmaAllocator::new(make_config(4_000, 0));
        alloc.commit(make_slice(100, 200, "a")).unwrap();
        assert!(matches!(
            alloc.commit(make_slice(150, 250, "b")),
            Err(TdmaError::Conflict { .. })
        ));
    }

    #[test]
    fn commit_rejects_slice_past_cycle_end() {
        let mut alloc = TdmaAllocator::new(make_config(4_000, 0));
        assert!(matches!(
            alloc.commit(make_slice(3_900, 3_995, "a")),
            Err(TdmaError::OutOfCycle { .. })
        ));
        assert!(alloc.commit(make_slice(3_900, 3_990, "a")).is_ok());
    }

    // ── Extreme values ────────────────────────────────────────────────────────

    #[test]
    fn huge_lengths_never_fit() {
        let mut alloc = TdmaAllocator::new(make_config(5_000, DEFAULT_RESERVED_HEAD_US));
        alloc.reserve(50, "a", "n").unwrap();

        for length in [i64::MAX, i64::MAX - 5, 5_001] {
            assert!(!alloc.fits(length));
            assert_eq!(
                alloc.reserve(length, "big", "n"),
                Err(TdmaError::Unsatisfiable { length_us: length })
            );
        }
        assert_eq!(alloc.slices().len(), 2);
        assert_well_separated(&alloc);
    }

    #[test]
    fn commit_rejects_slices_spanning_the_whole_range() {
        let mut alloc = TdmaAllocator::new(make_config(5_000, 0));
        for (begin, end) in [(-10, i64::MAX), (i64::MIN, 50), (i64::MIN, i64::MAX)] {
            assert!(matches!(
                alloc.commit(make_slice(begin, end, "a")),
                Err(TdmaError::OutOfCycle { .. })
            ));
        }
        assert_eq!(alloc.slices().len(), 1);
    }

    #[test]
    fn inverted_slice_inside_cycle_is_invalid() {
        let mut alloc = TdmaAllocator::new(make_config(5_000, 0));
        assert_eq!(
            alloc.commit(make_slice(200, 100, "a")),
            Err(TdmaError::InvalidLength(-100))
        );
    }

    // ── release ───────────────────────────────────────────────────────────────

    #[test]
    fn release_is_idempotent_and_spares_sentinel() {
        let mut alloc = TdmaAllocator::new(make_config(4_000, DEFAULT_RESERVED_HEAD_US));
        alloc.reserve(50, "pod1", "n").unwrap();

        assert_eq!(alloc.release("pod1").len(), 1);
        assert!(alloc.release("pod1").is_empty());
        assert!(alloc.release("").is_empty());
        assert_eq!(alloc.slices().len(), 1);
        assert!(alloc.slices()[0].is_sentinel());
    }

    // ── Properties ────────────────────────────────────────────────────────────

    proptest! {
        #[test]
        fn slices_never_overlap(
            ops in proptest::collection::vec((1i64..800, 0usize..6, any::<bool>()), 1..40),
        ) {
            let mut alloc = TdmaAllocator::new(make_config(5_000, DEFAULT_RESERVED_HEAD_US));
            for (length, pod, release) in ops {
                let pod = format!("pod{pod}");
                if release {
                    alloc.release(&pod);
                } else {
                    let fits = alloc.fits(length);
                    let reserved = alloc.reserve(length, &pod, "n");
                    prop_assert_eq!(fits, reserved.is_ok());
                }
                let half = alloc.config().guard_band_us / 2;
                for pair in alloc.slices().windows(2) {
                    prop_assert!(pair[0].end_us + half <= pair[1].begin_us);
                }
                prop_assert!(alloc.slices().last().unwrap().end_us <= 5_000);
                prop_assert!(alloc.slices()[0].is_sentinel());
            }
        }
    }
}
