//! Daily assignment scheduler.
//!
//! # Algorithm
//!
//! 1. Flatten every not-started test of every batch into a costed
//!    [`ScheduledTest`] (all-active baseline), resolving its origin API.
//! 2. Stable-sort the pool by priority tier, descending.
//! 3. First-fit placement over instruments in list order: an empty
//!    instrument accepts a test iff it drives the test's detector, the
//!    test's phase/wash codes fit the channel limit, and its cost fits the
//!    runtime ceiling; a non-empty instrument additionally requires the
//!    locked column and detector to match and the accumulated phase union
//!    and total time to stay within limits. No backtracking.
//! 4. Unplaced tests fall to the hold pool with the first applicable
//!    reason; each queue is then grouped and its total recomputed.
//!
//! # Complexity
//! O(n * m) placement for n tests and m instruments, plus grouping.

use std::cmp::Reverse;
use std::collections::HashMap;

use tracing::{debug, instrument};

use crate::catalog::MasterDataCatalog;
use crate::cost::CostModel;
use crate::error::ScheduleError;
use crate::grouping::GroupingEngine;
use crate::models::{
    Batch, HoldEntry, HoldReason, Instrument, InstrumentQueue, ScheduledTest, Test,
};
use crate::resolver::resolve_origin_api;

/// Result of one scheduling run.
///
/// Owns every derived entity; the next run rebuilds everything from
/// scratch. Instruments with no assigned tests are dropped from the
/// current queue view but retained for forecast planning.
#[derive(Debug, Clone)]
pub struct ScheduleOutcome {
    /// Non-empty instrument queues, grouped, in instrument order.
    pub queues: Vec<InstrumentQueue>,
    /// Tests that could not be placed, with reasons.
    pub hold_pool: Vec<HoldEntry>,
    /// All active instruments in input order (queue owners and idle).
    pub instruments: Vec<Instrument>,
}

impl ScheduleOutcome {
    /// The queue assigned to an instrument, if it received tests.
    pub fn queue_for(&self, instrument_id: &str) -> Option<&InstrumentQueue> {
        self.queues.iter().find(|q| q.instrument_id == instrument_id)
    }

    /// Active instruments that received no tests in this run.
    pub fn idle_instruments(&self) -> Vec<&Instrument> {
        self.instruments
            .iter()
            .filter(|i| self.queue_for(&i.id).is_none())
            .collect()
    }

    /// Total number of tests across queues and hold pool.
    pub fn test_count(&self) -> usize {
        self.queues.iter().map(|q| q.tests.len()).sum::<usize>() + self.hold_pool.len()
    }
}

/// Packing state of one instrument slot during first-fit placement.
///
/// Shared by the daily scheduler and the forecast planner, which packs
/// future slots under the same rule.
#[derive(Debug, Clone, Default)]
pub(crate) struct PackState {
    pub locked_column: Option<String>,
    pub locked_detector: Option<String>,
    /// Normalized, sorted union of accepted phase/wash codes.
    pub phase_set: Vec<String>,
    pub total_minutes: f64,
    pub count: usize,
}

impl PackState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempts to admit a test; on success the lock-in state advances.
    ///
    /// `detector_allowed` is the slot's compatibility rule: the
    /// instrument's detector set, possibly narrowed to a locked detector.
    pub fn try_admit(
        &mut self,
        test: &Test,
        cost_minutes: f64,
        ceiling_minutes: f64,
        phase_slots: usize,
        detector_allowed: impl Fn(&str) -> bool,
    ) -> bool {
        if !test.has_complete_method() {
            return false;
        }
        let detector = test.detector_id.trim();
        let column = test.column_code.trim();
        let codes = test.combined_phase_codes();

        if self.count == 0 {
            if !detector_allowed(detector)
                || codes.len() > phase_slots
                || cost_minutes > ceiling_minutes
            {
                return false;
            }
            self.locked_column = Some(column.to_string());
            self.locked_detector = Some(detector.to_string());
            self.phase_set = codes;
            self.total_minutes = cost_minutes;
            self.count = 1;
            true
        } else {
            if self.locked_column.as_deref() != Some(column)
                || self.locked_detector.as_deref() != Some(detector)
                || self.total_minutes + cost_minutes > ceiling_minutes
            {
                return false;
            }
            let mut union = self.phase_set.clone();
            union.extend(codes);
            union.sort();
            union.dedup();
            if union.len() > phase_slots {
                return false;
            }
            self.phase_set = union;
            self.total_minutes += cost_minutes;
            self.count += 1;
            true
        }
    }
}

/// The HPLC test scheduling engine.
///
/// Holds the run configuration: cost model, runtime ceiling, and
/// mobile-phase channel limit. The engine itself keeps no state between
/// calls — every run rebuilds its working set from the inputs.
///
/// # Example
///
/// ```
/// use hplc_schedule::models::{Batch, InjectionCounts, Instrument, Test};
/// use hplc_schedule::scheduler::ScheduleEngine;
///
/// let batch = Batch::new("B1").with_test(
///     Test::new("T1", "B1")
///         .with_method("C18", "UV")
///         .with_mobile_phases(["MP-A"])
///         .with_shared_runtime(5.0)
///         .with_counts(InjectionCounts { sample: 6, ..Default::default() }),
/// );
/// let instruments = vec![Instrument::new("I1").with_detector("UV")];
///
/// let outcome = ScheduleEngine::new().run_schedule(&[batch], &instruments).unwrap();
/// assert_eq!(outcome.queues.len(), 1);
/// assert!(outcome.hold_pool.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct ScheduleEngine {
    cost_model: CostModel,
    grouping: GroupingEngine,
    runtime_ceiling_minutes: f64,
    mobile_phase_slots: usize,
    catalog: MasterDataCatalog,
}

impl ScheduleEngine {
    /// The per-assignment runtime ceiling: 72 hours.
    pub const DEFAULT_RUNTIME_CEILING_MINUTES: f64 = 4320.0;
    /// Concurrent reagent channels per instrument.
    pub const DEFAULT_MOBILE_PHASE_SLOTS: usize = 4;

    /// Creates an engine with production defaults.
    pub fn new() -> Self {
        let cost_model = CostModel::standard();
        Self {
            cost_model,
            grouping: GroupingEngine::new(cost_model),
            runtime_ceiling_minutes: Self::DEFAULT_RUNTIME_CEILING_MINUTES,
            mobile_phase_slots: Self::DEFAULT_MOBILE_PHASE_SLOTS,
            catalog: MasterDataCatalog::new(),
        }
    }

    /// Replaces the cost model.
    pub fn with_cost_model(mut self, cost_model: CostModel) -> Self {
        self.cost_model = cost_model;
        self.grouping = GroupingEngine::new(cost_model);
        self
    }

    /// Sets the runtime ceiling (minutes).
    pub fn with_runtime_ceiling(mut self, minutes: f64) -> Self {
        self.runtime_ceiling_minutes = minutes;
        self
    }

    /// Sets the mobile-phase channel limit.
    pub fn with_mobile_phase_slots(mut self, slots: usize) -> Self {
        self.mobile_phase_slots = slots;
        self
    }

    /// Injects the master-data label catalog.
    pub fn with_catalog(mut self, catalog: MasterDataCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// The grouping engine this scheduler runs queues through.
    pub fn grouping(&self) -> &GroupingEngine {
        &self.grouping
    }

    pub(crate) fn runtime_ceiling_minutes(&self) -> f64 {
        self.runtime_ceiling_minutes
    }

    pub(crate) fn mobile_phase_slots(&self) -> usize {
        self.mobile_phase_slots
    }

    pub(crate) fn validate_config(&self) -> Result<(), ScheduleError> {
        if self.runtime_ceiling_minutes <= 0.0 {
            return Err(ScheduleError::InvalidConfig(
                "runtime ceiling must be positive".into(),
            ));
        }
        if self.mobile_phase_slots == 0 {
            return Err(ScheduleError::InvalidConfig(
                "mobile phase slot limit must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Assigns the pending-test pool to instruments for right now.
    ///
    /// Returns the grouped per-instrument queues and the hold pool. Every
    /// input test ends up in exactly one of the two; per-test data problems
    /// never abort the run.
    #[instrument(skip_all, fields(batches = batches.len(), instruments = instruments.len()))]
    pub fn run_schedule(
        &self,
        batches: &[Batch],
        instruments: &[Instrument],
    ) -> Result<ScheduleOutcome, ScheduleError> {
        self.validate_config()?;

        let active: Vec<Instrument> = instruments.iter().filter(|i| i.active).cloned().collect();
        let mut pool = self.flatten(batches);
        pool.sort_by_key(|st| Reverse(st.test.priority.tier()));

        let mut slots: Vec<(PackState, Vec<ScheduledTest>)> = active
            .iter()
            .map(|_| (PackState::new(), Vec::new()))
            .collect();
        let mut hold_pool: Vec<HoldEntry> = Vec::new();

        for test in pool {
            if !test.test.has_complete_method() {
                debug!(test_id = %test.test.id, "record incomplete, routed to hold pool");
                hold_pool.push(HoldEntry::new(test, HoldReason::NoMatchingInstrument));
                continue;
            }

            let cost = test.original_execution_time;
            let mut placed = false;
            for (idx, instrument) in active.iter().enumerate() {
                let (state, tests) = &mut slots[idx];
                if state.try_admit(
                    &test.test,
                    cost,
                    self.runtime_ceiling_minutes,
                    self.mobile_phase_slots,
                    |d| instrument.supports_detector(d),
                ) {
                    debug!(
                        test_id = %test.test.id,
                        instrument = %instrument.id,
                        cost_minutes = cost,
                        "test placed"
                    );
                    tests.push(test.clone());
                    placed = true;
                    break;
                }
            }
            if placed {
                continue;
            }

            let reason = self.hold_reason(&test, &active);
            debug!(test_id = %test.test.id, reason = %reason, "test held");
            hold_pool.push(HoldEntry::new(test, reason));
        }

        let mut queues = Vec::new();
        for (instrument, (state, tests)) in active.iter().zip(slots) {
            if tests.is_empty() {
                continue;
            }
            let grouped = self.grouping.group_queue(tests);
            let mut queue = InstrumentQueue::new(instrument.id.clone(), instrument.display_name());
            queue.locked_column = state.locked_column;
            queue.locked_detector = state.locked_detector;
            queue.mobile_phase_set = state.phase_set;
            queue.groups = grouped.groups;
            queue.tests = grouped.tests;
            queue.recompute_total();
            queues.push(queue);
        }

        debug!(
            placed = queues.iter().map(|q| q.tests.len()).sum::<usize>(),
            held = hold_pool.len(),
            "scheduling run complete"
        );

        Ok(ScheduleOutcome {
            queues,
            hold_pool,
            instruments: active,
        })
    }

    /// Flattens schedulable tests into costed scheduled tests, resolving
    /// origin APIs with per-batch duplicate-occurrence hints.
    fn flatten(&self, batches: &[Batch]) -> Vec<ScheduledTest> {
        let mut pool = Vec::new();
        let mut next_schedule_id: u64 = 1;

        for batch in batches {
            let mut occurrence: HashMap<String, usize> = HashMap::new();
            for test in batch.schedulable_tests() {
                let signature = structural_signature(test);
                let hint = *occurrence.get(&signature).unwrap_or(&0);
                occurrence.insert(signature, hint + 1);

                let baseline = self.cost_model.baseline(test).total_minutes;
                let mut scheduled = ScheduledTest::new(next_schedule_id, test.clone(), baseline);
                next_schedule_id += 1;

                scheduled.batch_number = batch.batch_number.clone();
                scheduled.product_name = batch.product_name.clone();
                scheduled.detector_name = self.catalog.detector_name(&test.detector_id).to_string();

                let origin = resolve_origin_api(batch, test, Some(hint));
                scheduled.api_label = match &origin.id {
                    Some(id) => self.catalog.api_name(id).to_string(),
                    None => origin.label.clone(),
                };
                scheduled.api_id = origin.id;

                pool.push(scheduled);
            }
        }
        pool
    }

    /// First applicable hold reason for an unplaceable test.
    fn hold_reason(&self, test: &ScheduledTest, instruments: &[Instrument]) -> HoldReason {
        if test.original_execution_time > self.runtime_ceiling_minutes {
            return HoldReason::ExceedsRuntimeCeiling {
                cost_minutes: test.original_execution_time,
                ceiling_minutes: self.runtime_ceiling_minutes,
            };
        }
        let required = test.test.combined_phase_codes().len();
        if required > self.mobile_phase_slots {
            return HoldReason::ExceedsMobilePhaseLimit {
                required,
                limit: self.mobile_phase_slots,
            };
        }
        let detector = test.test.detector_id.trim();
        if !instruments.iter().any(|i| i.supports_detector(detector)) {
            return HoldReason::NoCompatibleDetector {
                detector_id: detector.to_string(),
            };
        }
        HoldReason::NoMatchingInstrument
    }
}

impl Default for ScheduleEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Signature used to count duplicate structurally identical tests within
/// one batch, feeding the resolver's position hint.
fn structural_signature(test: &Test) -> String {
    format!(
        "{}|{}|{}|{}|{}|{}|{}",
        test.name.trim().to_lowercase(),
        test.column_code.trim(),
        test.detector_id.trim(),
        crate::resolver::mobile_phase_key(&test.mobile_phases),
        test.shared_runtime_minutes,
        test.counts.sample,
        test.counts.standard
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{InjectionCounts, Priority};

    fn uv_test(id: &str, batch: &str, sample: u32) -> Test {
        Test::new(id, batch)
            .with_name("Assay")
            .with_test_type("TT-1")
            .with_method("C18", "UV")
            .with_mobile_phases(["MP-A", "MP-B"])
            .with_shared_runtime(6.0)
            .with_counts(InjectionCounts {
                sample,
                ..Default::default()
            })
    }

    fn uv_instrument(id: &str) -> Instrument {
        Instrument::new(id).with_name(format!("HPLC-{id}")).with_detector("UV")
    }

    #[test]
    fn test_scenario_a_single_compatible_test() {
        // Detector D, 2 mobile-phase codes, cost 60 -> assigned, total 60.
        // 9 base + ceil(9/6)=2 bracketing = 11 injections x 5.0 + 5.0 wash = 60.
        let test = Test::new("T1", "B1")
            .with_method("C18", "UV")
            .with_mobile_phases(["MP-A", "MP-B"])
            .with_shared_runtime(5.0)
            .with_wash_minutes(5.0)
            .with_counts(InjectionCounts {
                sample: 9,
                ..Default::default()
            });

        let outcome = ScheduleEngine::new()
            .run_schedule(&[Batch::new("B1").with_test(test)], &[uv_instrument("I1")])
            .unwrap();

        assert_eq!(outcome.queues.len(), 1);
        assert!(outcome.hold_pool.is_empty());
        assert!((outcome.queues[0].total_minutes - 60.0).abs() < 1e-9);
        assert_eq!(outcome.queues[0].locked_detector.as_deref(), Some("UV"));
        assert_eq!(outcome.queues[0].locked_column.as_deref(), Some("C18"));
    }

    #[test]
    fn test_scenario_c_five_phase_test_always_held() {
        let test = Test::new("T1", "B1")
            .with_method("C18", "UV")
            .with_mobile_phases(["A", "B", "C", "D", "E"])
            .with_shared_runtime(1.0)
            .with_counts(InjectionCounts {
                sample: 1,
                ..Default::default()
            });

        let outcome = ScheduleEngine::new()
            .run_schedule(
                &[Batch::new("B1").with_test(test)],
                &[uv_instrument("I1"), uv_instrument("I2")],
            )
            .unwrap();

        assert!(outcome.queues.is_empty());
        assert_eq!(outcome.hold_pool.len(), 1);
        assert_eq!(
            outcome.hold_pool[0].reason,
            HoldReason::ExceedsMobilePhaseLimit {
                required: 5,
                limit: 4
            }
        );
    }

    #[test]
    fn test_priority_tiers_place_first() {
        // One instrument, ceiling tight enough for one test only.
        let urgent = uv_test("T-urgent", "B1", 6).with_priority(Priority::Urgent);
        let normal = uv_test("T-normal", "B1", 6).with_priority(Priority::Normal);

        let outcome = ScheduleEngine::new()
            .with_runtime_ceiling(50.0)
            .run_schedule(
                // Normal flattens first; urgent must still win the slot.
                &[Batch::new("B1").with_test(normal).with_test(urgent)],
                &[uv_instrument("I1")],
            )
            .unwrap();

        assert_eq!(outcome.queues[0].tests.len(), 1);
        assert_eq!(outcome.queues[0].tests[0].test.id, "T-urgent");
        assert_eq!(outcome.hold_pool.len(), 1);
        assert_eq!(outcome.hold_pool[0].test.test.id, "T-normal");
    }

    #[test]
    fn test_conservation_every_test_lands_once() {
        let batches = vec![
            Batch::new("B1")
                .with_test(uv_test("T1", "B1", 3))
                .with_test(uv_test("T2", "B1", 30))
                .with_test(
                    Test::new("T3", "B1")
                        .with_method("C8", "FLD")
                        .with_mobile_phases(["X"])
                        .with_shared_runtime(2.0)
                        .with_counts(InjectionCounts {
                            sample: 2,
                            ..Default::default()
                        }),
                ),
            Batch::new("B2")
                .with_test(uv_test("T4", "B2", 5))
                .with_test(Test::new("T5", "B2")), // incomplete record
        ];

        let outcome = ScheduleEngine::new()
            .run_schedule(&batches, &[uv_instrument("I1")])
            .unwrap();

        assert_eq!(outcome.test_count(), 5);
        let mut seen: Vec<&str> = outcome
            .queues
            .iter()
            .flat_map(|q| q.tests.iter())
            .chain(outcome.hold_pool.iter().map(|h| &h.test))
            .map(|t| t.test.id.as_str())
            .collect();
        seen.sort();
        assert_eq!(seen, vec!["T1", "T2", "T3", "T4", "T5"]);
    }

    #[test]
    fn test_incompatible_detector_reason() {
        let test = Test::new("T1", "B1")
            .with_method("C18", "FLD")
            .with_mobile_phases(["A"])
            .with_shared_runtime(1.0)
            .with_counts(InjectionCounts {
                sample: 1,
                ..Default::default()
            });

        let outcome = ScheduleEngine::new()
            .run_schedule(&[Batch::new("B1").with_test(test)], &[uv_instrument("I1")])
            .unwrap();

        assert_eq!(
            outcome.hold_pool[0].reason,
            HoldReason::NoCompatibleDetector {
                detector_id: "FLD".into()
            }
        );
    }

    #[test]
    fn test_column_lock_in_rejects_mismatch() {
        let first = uv_test("T1", "B1", 3);
        let other_column = Test::new("T2", "B1")
            .with_method("C8", "UV")
            .with_mobile_phases(["MP-A"])
            .with_shared_runtime(2.0)
            .with_counts(InjectionCounts {
                sample: 2,
                ..Default::default()
            });

        let outcome = ScheduleEngine::new()
            .run_schedule(
                &[Batch::new("B1").with_test(first).with_test(other_column)],
                &[uv_instrument("I1")],
            )
            .unwrap();

        // T2 matches the detector but not the locked column.
        assert_eq!(outcome.queues[0].tests.len(), 1);
        assert_eq!(outcome.hold_pool.len(), 1);
        assert_eq!(outcome.hold_pool[0].reason, HoldReason::NoMatchingInstrument);
    }

    #[test]
    fn test_phase_union_limit_enforced() {
        let t1 = uv_test("T1", "B1", 2).with_mobile_phases(["A", "B", "C"]);
        let t2 = uv_test("T2", "B1", 2).with_mobile_phases(["A", "D", "E"]);

        let outcome = ScheduleEngine::new()
            .run_schedule(
                &[Batch::new("B1").with_test(t1).with_test(t2)],
                &[uv_instrument("I1")],
            )
            .unwrap();

        // Union {A,B,C,D,E} would need 5 channels.
        assert_eq!(outcome.queues[0].tests.len(), 1);
        assert_eq!(outcome.hold_pool.len(), 1);
    }

    #[test]
    fn test_second_instrument_takes_overflow() {
        let t1 = uv_test("T1", "B1", 2);
        let t2 = Test::new("T2", "B1")
            .with_method("C8", "UV")
            .with_mobile_phases(["MP-X"])
            .with_shared_runtime(3.0)
            .with_counts(InjectionCounts {
                sample: 4,
                ..Default::default()
            });

        let outcome = ScheduleEngine::new()
            .run_schedule(
                &[Batch::new("B1").with_test(t1).with_test(t2)],
                &[uv_instrument("I1"), uv_instrument("I2")],
            )
            .unwrap();

        assert_eq!(outcome.queues.len(), 2);
        assert!(outcome.hold_pool.is_empty());
        assert_eq!(outcome.queues[0].tests[0].test.id, "T1");
        assert_eq!(outcome.queues[1].tests[0].test.id, "T2");
    }

    #[test]
    fn test_idle_instruments_retained() {
        let outcome = ScheduleEngine::new()
            .run_schedule(
                &[Batch::new("B1").with_test(uv_test("T1", "B1", 2))],
                &[uv_instrument("I1"), uv_instrument("I2")],
            )
            .unwrap();

        assert_eq!(outcome.queues.len(), 1);
        let idle: Vec<&str> = outcome
            .idle_instruments()
            .iter()
            .map(|i| i.id.as_str())
            .collect();
        assert_eq!(idle, vec!["I2"]);
    }

    #[test]
    fn test_inactive_instruments_excluded() {
        let outcome = ScheduleEngine::new()
            .run_schedule(
                &[Batch::new("B1").with_test(uv_test("T1", "B1", 2))],
                &[uv_instrument("I1").with_active(false)],
            )
            .unwrap();

        assert!(outcome.queues.is_empty());
        assert!(outcome.instruments.is_empty());
        assert_eq!(
            outcome.hold_pool[0].reason,
            HoldReason::NoCompatibleDetector {
                detector_id: "UV".into()
            }
        );
    }

    #[test]
    fn test_queue_grouping_applied_after_placement() {
        let outcome = ScheduleEngine::new()
            .run_schedule(
                &[Batch::new("B1")
                    .with_test(uv_test("T1", "B1", 6))
                    .with_test(uv_test("T2", "B1", 6))],
                &[uv_instrument("I1")],
            )
            .unwrap();

        let queue = &outcome.queues[0];
        assert_eq!(queue.groups.len(), 1);
        assert!(queue.tests.iter().all(|t| t.is_grouped));
        let expected: f64 = queue.tests.iter().map(|t| t.execution_time).sum();
        assert!((queue.total_minutes - expected).abs() < 1e-9);
        let ungrouped: f64 = queue.tests.iter().map(|t| t.original_execution_time).sum();
        assert!(queue.total_minutes < ungrouped);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let engine = ScheduleEngine::new().with_runtime_ceiling(0.0);
        assert!(engine.run_schedule(&[], &[]).is_err());

        let engine = ScheduleEngine::new().with_mobile_phase_slots(0);
        assert!(engine.run_schedule(&[], &[]).is_err());
    }
}
