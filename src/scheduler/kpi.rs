//! Run-level quality metrics.
//!
//! Computed from a completed scheduling run for dashboards and sanity
//! checks; nothing here feeds back into scheduling decisions.

use std::collections::HashMap;

use super::daily::ScheduleOutcome;

/// Key figures of one scheduling run.
#[derive(Debug, Clone)]
pub struct ScheduleKpi {
    /// Tests that entered the run.
    pub total_tests: usize,
    /// Tests placed on an instrument.
    pub placed_tests: usize,
    /// Tests in the hold pool.
    pub held_tests: usize,
    /// Fraction of tests placed (1.0 when the run was empty).
    pub placement_rate: f64,
    /// Sum of queue totals (minutes).
    pub total_queue_minutes: f64,
    /// Minutes saved by grouping across all queues.
    pub total_saved_minutes: f64,
    /// Hold counts per reason label.
    pub hold_reasons: HashMap<String, usize>,
    /// Each queue's share of the total queued minutes.
    pub load_share: HashMap<String, f64>,
}

impl ScheduleKpi {
    /// Computes KPIs from a run outcome.
    pub fn calculate(outcome: &ScheduleOutcome) -> Self {
        let placed_tests: usize = outcome.queues.iter().map(|q| q.tests.len()).sum();
        let held_tests = outcome.hold_pool.len();
        let total_tests = placed_tests + held_tests;

        let total_queue_minutes: f64 = outcome.queues.iter().map(|q| q.total_minutes).sum();
        let total_saved_minutes: f64 = outcome
            .queues
            .iter()
            .flat_map(|q| q.groups.iter())
            .map(|g| g.time_saved)
            .sum();

        let mut hold_reasons: HashMap<String, usize> = HashMap::new();
        for entry in &outcome.hold_pool {
            *hold_reasons.entry(entry.reason.to_string()).or_insert(0) += 1;
        }

        let mut load_share = HashMap::new();
        if total_queue_minutes > 0.0 {
            for queue in &outcome.queues {
                load_share.insert(
                    queue.instrument_id.clone(),
                    queue.total_minutes / total_queue_minutes,
                );
            }
        }

        let placement_rate = if total_tests == 0 {
            1.0
        } else {
            placed_tests as f64 / total_tests as f64
        };

        Self {
            total_tests,
            placed_tests,
            held_tests,
            placement_rate,
            total_queue_minutes,
            total_saved_minutes,
            hold_reasons,
            load_share,
        }
    }
}
