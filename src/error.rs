//! Engine error taxonomy.
//!
//! Only structural and configuration problems surface as errors; per-test
//! data problems degrade gracefully into hold-pool reasons and never abort
//! a run.

use thiserror::Error;

/// Errors returned by the scheduling engine's call boundaries.
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// A configuration value was rejected before any computation started.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A manual mutation was applied against a stale snapshot.
    ///
    /// The move is rejected outright; nothing is clobbered.
    #[error("snapshot version {expected} is stale, current version is {current}")]
    StaleSnapshot { expected: u64, current: u64 },

    /// The referenced queue does not exist in the snapshot.
    #[error("queue '{0}' not found in snapshot")]
    QueueNotFound(String),

    /// The referenced test is not in the stated source list.
    #[error("scheduled test {schedule_id} not found in {source_list}")]
    TestNotFound { schedule_id: u64, source_list: String },

    /// The referenced forecast sequence does not exist.
    #[error("forecast sequence '{0}' not found")]
    SequenceNotFound(String),

    /// A reorder did not cover exactly the sequence's current tests.
    #[error("reorder of '{sequence}' must cover exactly its {expected} tests (got {got})")]
    ReorderMismatch {
        sequence: String,
        expected: usize,
        got: usize,
    },
}
