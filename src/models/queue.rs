//! Instrument queue and hold-pool models.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{Group, ScheduledTest};

/// One instrument's assigned work for the current run.
///
/// Invariant: `total_minutes` equals the sum of the current
/// `execution_time` across `tests`; call [`recompute_total`]
/// after any mutation of the test list.
///
/// [`recompute_total`]: InstrumentQueue::recompute_total
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentQueue {
    pub instrument_id: String,
    #[serde(default)]
    pub instrument_name: String,
    /// Column the instrument locked to when it accepted its first test.
    #[serde(default)]
    pub locked_column: Option<String>,
    /// Detector the instrument locked to when it accepted its first test.
    #[serde(default)]
    pub locked_detector: Option<String>,
    /// Accumulated mobile-phase/wash codes (normalized, sorted).
    #[serde(default)]
    pub mobile_phase_set: Vec<String>,
    pub tests: Vec<ScheduledTest>,
    #[serde(default)]
    pub groups: Vec<Group>,
    /// Rolling total of current execution times (minutes).
    pub total_minutes: f64,
}

impl InstrumentQueue {
    /// Creates an empty queue for an instrument.
    pub fn new(instrument_id: impl Into<String>, instrument_name: impl Into<String>) -> Self {
        Self {
            instrument_id: instrument_id.into(),
            instrument_name: instrument_name.into(),
            locked_column: None,
            locked_detector: None,
            mobile_phase_set: Vec::new(),
            tests: Vec::new(),
            groups: Vec::new(),
            total_minutes: 0.0,
        }
    }

    /// Recomputes the rolling total from current execution times.
    pub fn recompute_total(&mut self) {
        self.total_minutes = self.tests.iter().map(|t| t.execution_time).sum();
    }

    /// Finds a test position by schedule id.
    pub fn position_of(&self, schedule_id: u64) -> Option<usize> {
        self.tests.iter().position(|t| t.schedule_id == schedule_id)
    }
}

/// Why a test could not be placed in the current run.
///
/// Not an error: every reason is recoverable by a later run or by the
/// forecast planner once capacity or a compatible instrument appears.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HoldReason {
    /// The test alone exceeds the per-assignment runtime ceiling.
    ExceedsRuntimeCeiling {
        cost_minutes: f64,
        ceiling_minutes: f64,
    },
    /// The test needs more mobile-phase/wash channels than any instrument has.
    ExceedsMobilePhaseLimit { required: usize, limit: usize },
    /// No instrument anywhere drives this test's detector type.
    NoCompatibleDetector { detector_id: String },
    /// No instrument currently matches the column/detector/mobile-phase
    /// profile. Also the generic reason for incomplete test records.
    NoMatchingInstrument,
}

impl fmt::Display for HoldReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HoldReason::ExceedsRuntimeCeiling {
                cost_minutes,
                ceiling_minutes,
            } => write!(
                f,
                "exceeds the {ceiling_minutes:.0} minute runtime ceiling ({cost_minutes:.1} min)"
            ),
            HoldReason::ExceedsMobilePhaseLimit { required, limit } => write!(
                f,
                "exceeds the {limit}-slot mobile phase/wash limit (needs {required})"
            ),
            HoldReason::NoCompatibleDetector { detector_id } => {
                write!(f, "no instrument has a compatible detector ({detector_id})")
            }
            HoldReason::NoMatchingInstrument => write!(
                f,
                "no instrument currently matches column/detector/mobile-phase"
            ),
        }
    }
}

/// A test that could not be placed, with the recorded reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoldEntry {
    pub test: ScheduledTest,
    pub reason: HoldReason,
}

impl HoldEntry {
    /// Creates a hold entry.
    pub fn new(test: ScheduledTest, reason: HoldReason) -> Self {
        Self { test, reason }
    }
}
