//! Forecast models: one instrument's projected work on one future day.
//!
//! # Time Model
//! Instants are minutes since a caller-defined epoch; a day is 1440
//! minutes with boundaries at multiples of 1440. The consumer defines
//! what the epoch means.

use serde::{Deserialize, Serialize};

use super::{Group, ScheduledTest};

/// Minutes per forecast day.
pub const MINUTES_PER_DAY: i64 = 1440;

/// One instrument's planned sequence for one future day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastSequence {
    /// Sequence name, `F-{day}-{slot letter}`.
    pub name: String,
    pub instrument_id: String,
    /// Day number, 1..=horizon.
    pub day: u32,
    /// When the instrument starts this sequence (minutes since epoch).
    pub start_minutes: i64,
    /// `start_minutes` + total sequence time.
    pub end_minutes: i64,
    /// Column locked in by the first packed test.
    #[serde(default)]
    pub locked_column: Option<String>,
    /// Detector locked in for this sequence.
    #[serde(default)]
    pub locked_detector: Option<String>,
    /// Accumulated mobile-phase/wash codes (normalized, sorted).
    #[serde(default)]
    pub mobile_phase_set: Vec<String>,
    pub tests: Vec<ScheduledTest>,
    #[serde(default)]
    pub groups: Vec<Group>,
}

impl ForecastSequence {
    /// Total planned time (minutes).
    pub fn total_minutes(&self) -> f64 {
        self.tests.iter().map(|t| t.execution_time).sum()
    }

    /// Whether the sequence packed no tests.
    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }
}

/// All planned sequences for one instrument across the horizon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentForecast {
    pub instrument_id: String,
    #[serde(default)]
    pub instrument_name: String,
    /// Sequences in day order. Days the instrument was skipped on
    /// (still busy past the day boundary) have no entry.
    pub sequences: Vec<ForecastSequence>,
}

impl InstrumentForecast {
    /// Creates an empty forecast for an instrument.
    pub fn new(instrument_id: impl Into<String>, instrument_name: impl Into<String>) -> Self {
        Self {
            instrument_id: instrument_id.into(),
            instrument_name: instrument_name.into(),
            sequences: Vec::new(),
        }
    }

    /// The sequence planned for a given day, if any.
    pub fn sequence_for_day(&self, day: u32) -> Option<&ForecastSequence> {
        self.sequences.iter().find(|s| s.day == day)
    }
}

/// Start of the day a given instant falls in (minutes since epoch).
#[inline]
pub fn start_of_day(minutes: i64) -> i64 {
    minutes.div_euclid(MINUTES_PER_DAY) * MINUTES_PER_DAY
}
