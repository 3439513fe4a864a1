//! Interactive reassignment protocol.
//!
//! A [`ScheduleSnapshot`] is one run's output held in memory for manual
//! editing: moving a test between queues, reordering within a queue,
//! promoting a hold-pool test, or reordering a forecast sequence. Each
//! mutation regroups only the affected queues and recomputes their totals.
//!
//! A snapshot is owned by at most one mutator at a time. Every mutation
//! carries the version it was computed against; a mismatch fails closed
//! with [`ScheduleError::StaleSnapshot`] instead of clobbering concurrent
//! edits.
//!
//! Manual placement is an override of the automatic compatibility rule:
//! the engine never re-validates detector/column/phase fit on a move and
//! never silently reverts one.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ScheduleError;
use crate::grouping::GroupingEngine;
use crate::models::{HoldEntry, InstrumentForecast, InstrumentQueue, ScheduledTest};

use super::daily::ScheduleOutcome;

/// Where a moved test is taken from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoveSource {
    /// An instrument queue, by instrument id.
    Queue(String),
    /// The hold pool. Tests leave the hold pool only through a move.
    Hold,
}

/// A manual move of one test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveRequest {
    /// Schedule-id of the test to move.
    pub schedule_id: u64,
    pub from: MoveSource,
    /// Destination instrument id.
    pub to_queue: String,
    /// Insertion index in the destination; clamped to the list length.
    pub index: usize,
    /// Snapshot version this move was computed against.
    pub expected_version: u64,
}

/// One run's output, mutable through the manual protocol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleSnapshot {
    version: u64,
    pub queues: Vec<InstrumentQueue>,
    pub hold_pool: Vec<HoldEntry>,
    pub forecast: Vec<InstrumentForecast>,
}

impl ScheduleSnapshot {
    /// Builds a snapshot from a scheduling run and its forecast.
    pub fn from_run(outcome: ScheduleOutcome, forecast: Vec<InstrumentForecast>) -> Self {
        Self {
            version: 1,
            queues: outcome.queues,
            hold_pool: outcome.hold_pool,
            forecast,
        }
    }

    /// Current snapshot version; bumped by every successful mutation.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Applies a manual move.
    ///
    /// Splices the test out of its source, into the destination at the
    /// requested position, regroups the affected queues, and recomputes
    /// their totals. All other queues are untouched.
    pub fn apply_move(
        &mut self,
        grouping: &GroupingEngine,
        request: &MoveRequest,
    ) -> Result<(), ScheduleError> {
        self.check_version(request.expected_version)?;
        // Destination must exist before anything is spliced out.
        self.queue_index(&request.to_queue)?;

        let mut moved = match &request.from {
            MoveSource::Queue(queue_id) => {
                let idx = self.queue_index(queue_id)?;
                let queue = &mut self.queues[idx];
                let pos = queue.position_of(request.schedule_id).ok_or_else(|| {
                    ScheduleError::TestNotFound {
                        schedule_id: request.schedule_id,
                        source_list: format!("queue '{queue_id}'"),
                    }
                })?;
                queue.tests.remove(pos)
            }
            MoveSource::Hold => {
                let pos = self
                    .hold_pool
                    .iter()
                    .position(|entry| entry.test.schedule_id == request.schedule_id)
                    .ok_or_else(|| ScheduleError::TestNotFound {
                        schedule_id: request.schedule_id,
                        source_list: "hold pool".to_string(),
                    })?;
                self.hold_pool.remove(pos).test
            }
        };
        moved.sort_order = Some(request.index);

        let dest = self.queue_index(&request.to_queue)?;
        let at = request.index.min(self.queues[dest].tests.len());
        self.queues[dest].tests.insert(at, moved);

        self.regroup_queue(grouping, dest);
        if let MoveSource::Queue(queue_id) = &request.from {
            if queue_id != &request.to_queue {
                let src = self.queue_index(queue_id)?;
                self.regroup_queue(grouping, src);
            }
        }

        self.version += 1;
        debug!(
            schedule_id = request.schedule_id,
            to_queue = %request.to_queue,
            version = self.version,
            "manual move applied"
        );
        Ok(())
    }

    /// Reorders one forecast sequence and regroups it.
    ///
    /// `ordered_ids` must cover exactly the sequence's current tests.
    pub fn reorder_forecast_sequence(
        &mut self,
        grouping: &GroupingEngine,
        sequence_name: &str,
        ordered_ids: &[u64],
        expected_version: u64,
    ) -> Result<(), ScheduleError> {
        self.check_version(expected_version)?;

        let sequence = self
            .forecast
            .iter_mut()
            .flat_map(|f| f.sequences.iter_mut())
            .find(|s| s.name == sequence_name)
            .ok_or_else(|| ScheduleError::SequenceNotFound(sequence_name.to_string()))?;

        // Validate before mutating anything: the ids must cover exactly
        // the sequence's current tests, no extras, no duplicates.
        let mismatch = || ScheduleError::ReorderMismatch {
            sequence: sequence_name.to_string(),
            expected: sequence.tests.len(),
            got: ordered_ids.len(),
        };
        if ordered_ids.len() != sequence.tests.len() {
            return Err(mismatch());
        }
        let mut taken = vec![false; sequence.tests.len()];
        let mut positions = Vec::with_capacity(ordered_ids.len());
        for &id in ordered_ids {
            let pos = sequence
                .tests
                .iter()
                .enumerate()
                .position(|(i, t)| !taken[i] && t.schedule_id == id)
                .ok_or_else(|| mismatch())?;
            taken[pos] = true;
            positions.push(pos);
        }

        let current = std::mem::take(&mut sequence.tests);
        let reordered: Vec<ScheduledTest> =
            positions.iter().map(|&pos| current[pos].clone()).collect();

        let grouped = grouping.group_queue(reordered);
        let total = grouped.total_minutes();
        sequence.tests = grouped.tests;
        sequence.groups = grouped.groups;
        sequence.end_minutes = sequence.start_minutes + total.ceil() as i64;

        self.version += 1;
        debug!(sequence = sequence_name, version = self.version, "sequence reordered");
        Ok(())
    }

    fn check_version(&self, expected: u64) -> Result<(), ScheduleError> {
        if expected != self.version {
            return Err(ScheduleError::StaleSnapshot {
                expected,
                current: self.version,
            });
        }
        Ok(())
    }

    fn queue_index(&self, instrument_id: &str) -> Result<usize, ScheduleError> {
        self.queues
            .iter()
            .position(|q| q.instrument_id == instrument_id)
            .ok_or_else(|| ScheduleError::QueueNotFound(instrument_id.to_string()))
    }

    fn regroup_queue(&mut self, grouping: &GroupingEngine, index: usize) {
        let queue = &mut self.queues[index];
        let grouped = grouping.group_queue(std::mem::take(&mut queue.tests));
        queue.tests = grouped.tests;
        queue.groups = grouped.groups;
        queue.recompute_total();
    }
}
