/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

use thiserror::Error;

/// Failure of a TDMA slot operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TdmaError {
    #[error("slice length must be positive, got {0}µs")]
    InvalidLength(i64),

    #[error("slice has no pod name")]
    MissingPodName,

    /// No gap in the cycle is wide enough.  The message is part of the wire
    /// contract.
    #[error("TDMA request cannot be satisfied")]
    Unsatisfiable { length_us: i64 },

    #[error("slice [{begin_us}, {end_us}) does not fit in the {cycle_us}µs cycle")]
    OutOfCycle {
        begin_us: i64,
        end_us: i64,
        cycle_us: i64,
    },

    /// The slice is closer than half a guard band to an existing one.
    #[error("slice [{begin_us}, {end_us}) conflicts with [{other_begin_us}, {other_end_us}) of '{other_pod}'")]
    Conflict {
        begin_us: i64,
        end_us: i64,
        other_begin_us: i64,
        other_end_us: i64,
        other_pod: String,
    },
}
