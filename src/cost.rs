//! Injection time/cost model.
//!
//! Pure functions computing the execution time of a single test from its
//! per-category injection counts, and the grouped variant for a sequence
//! of co-scheduled tests where only the first and last members pay full
//! injection cost.
//!
//! # Cost Formula
//!
//! Base count sums the active blank/standard/sample counts plus the five
//! always-on categories (system-suitability, sensitivity, placebo, and both
//! reference injections). Bracketing re-verification adds
//! `ceil(base / wash_interval)` injections when active. Runtime is either
//! `total × shared runtime` or the per-category sum when the test declares
//! unique runtimes (bracketing priced at the sample runtime). Wash time is
//! charged exactly once per run, appended at the end — never per injection.
//!
//! # Reference
//! USP <621>: bracketing standards are injected at fixed intervals
//! throughout the run.

use serde::{Deserialize, Serialize};

use crate::error::ScheduleError;
use crate::models::{InjectionCounts, Test};

/// Which suppressible injection categories are active for one run of a test.
///
/// Only blank, standard, sample, and bracketing can be suppressed; the
/// other five categories are always counted when declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveInjections {
    pub blank: bool,
    pub standard: bool,
    pub sample: bool,
    pub bracketing: bool,
}

impl ActiveInjections {
    /// Every category active — the un-grouped baseline.
    pub fn all() -> Self {
        Self {
            blank: true,
            standard: true,
            sample: true,
            bracketing: true,
        }
    }

    /// The mask a test at `index` of a grouped sequence of `len` runs with.
    ///
    /// The first member carries the group's blanks and standards; middle
    /// members inject samples only; the last member closes the sequence
    /// with bracketing. A sequence of one is both first and last.
    pub fn for_position(index: usize, len: usize) -> Self {
        if index == 0 {
            Self {
                blank: true,
                standard: true,
                sample: true,
                bracketing: len == 1,
            }
        } else if index + 1 == len {
            Self {
                blank: false,
                standard: false,
                sample: true,
                bracketing: true,
            }
        } else {
            Self {
                blank: false,
                standard: false,
                sample: true,
                bracketing: false,
            }
        }
    }
}

/// Structured result of one cost computation.
///
/// Carries a human-readable step trace and formula string for diagnostic
/// display alongside the numbers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostBreakdown {
    /// Counts actually charged (suppressed categories zeroed).
    pub counted: InjectionCounts,
    /// Charged injections before bracketing.
    pub base_injections: u32,
    /// Bracketing re-verification injections.
    pub bracketing_injections: u32,
    /// `base + bracketing`.
    pub total_injections: u32,
    /// Injection runtime (minutes), excluding wash.
    pub runtime_minutes: f64,
    /// Wash time charged (minutes); zero for non-final group members.
    pub wash_minutes: f64,
    /// `runtime + wash`.
    pub total_minutes: f64,
    /// Human-readable computation trace.
    pub steps: Vec<String>,
    /// One-line formula summary.
    pub formula: String,
}

/// Result of costing a grouped sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupedCost {
    /// Each member's masked cost, in sequence order.
    pub member_minutes: Vec<f64>,
    /// Sum of member costs (wash charged once, on the final member).
    pub grouped_minutes: f64,
    /// Sum of all-active costs, each with its own wash.
    pub ungrouped_minutes: f64,
    /// `ungrouped - grouped`.
    pub time_saved: f64,
}

/// The injection cost model.
///
/// # Example
///
/// ```
/// use hplc_schedule::cost::{ActiveInjections, CostModel};
/// use hplc_schedule::models::{InjectionCounts, Test};
///
/// let test = Test::new("T1", "B1")
///     .with_counts(InjectionCounts { blank: 2, standard: 5, sample: 10, ..Default::default() })
///     .with_shared_runtime(5.0)
///     .with_wash_minutes(10.0);
///
/// let model = CostModel::standard();
/// let breakdown = model.cost(&test, ActiveInjections::all());
/// // 17 base + ceil(17/6)=3 bracketing = 20 injections x 5.0 min + 10.0 wash
/// assert_eq!(breakdown.total_injections, 20);
/// assert!((breakdown.total_minutes - 110.0).abs() < 1e-9);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct CostModel {
    wash_interval: u32,
}

impl CostModel {
    /// The production wash-batch interval.
    pub const DEFAULT_WASH_INTERVAL: u32 = 6;

    /// Creates a model with an explicit wash interval.
    ///
    /// Rejects a zero interval before any computation.
    pub fn new(wash_interval: u32) -> Result<Self, ScheduleError> {
        if wash_interval == 0 {
            return Err(ScheduleError::InvalidConfig(
                "wash interval must be at least 1".into(),
            ));
        }
        Ok(Self { wash_interval })
    }

    /// The model with the standard interval of 6.
    pub fn standard() -> Self {
        Self {
            wash_interval: Self::DEFAULT_WASH_INTERVAL,
        }
    }

    /// The configured wash interval.
    pub fn wash_interval(&self) -> u32 {
        self.wash_interval
    }

    /// Costs one run of a test under the given mask, wash included.
    pub fn cost(&self, test: &Test, active: ActiveInjections) -> CostBreakdown {
        self.compute(test, active, true)
    }

    /// The un-grouped baseline: every category active, wash included.
    pub fn baseline(&self, test: &Test) -> CostBreakdown {
        self.cost(test, ActiveInjections::all())
    }

    /// Costs one member of a grouped sequence.
    ///
    /// Applies the positional mask; wash is charged only on the final
    /// member so the whole sequence washes exactly once.
    pub fn member_cost(&self, test: &Test, index: usize, len: usize) -> CostBreakdown {
        self.compute(
            test,
            ActiveInjections::for_position(index, len),
            index + 1 == len,
        )
    }

    /// Costs a grouped sequence and its un-grouped counterpart.
    pub fn grouped_cost(&self, tests: &[&Test]) -> GroupedCost {
        let len = tests.len();
        let member_minutes: Vec<f64> = tests
            .iter()
            .enumerate()
            .map(|(i, t)| self.member_cost(t, i, len).total_minutes)
            .collect();
        let grouped_minutes = member_minutes.iter().sum();
        let ungrouped_minutes = tests.iter().map(|t| self.baseline(t).total_minutes).sum();

        GroupedCost {
            member_minutes,
            grouped_minutes,
            ungrouped_minutes,
            time_saved: ungrouped_minutes - grouped_minutes,
        }
    }

    fn compute(&self, test: &Test, active: ActiveInjections, include_wash: bool) -> CostBreakdown {
        let counts = &test.counts;
        let counted = InjectionCounts {
            blank: if active.blank { counts.blank } else { 0 },
            standard: if active.standard { counts.standard } else { 0 },
            sample: if active.sample { counts.sample } else { 0 },
            suitability: counts.suitability,
            sensitivity: counts.sensitivity,
            placebo: counts.placebo,
            reference1: counts.reference1,
            reference2: counts.reference2,
        };

        let base = counted.blank + counted.standard + counted.sample + counted.always_on_total();
        let bracketing = if active.bracketing && base > 0 {
            base.div_ceil(self.wash_interval)
        } else {
            0
        };
        let total_injections = base + bracketing;

        let mut steps = vec![format!(
            "base injections: blank {} + standard {} + sample {} + always-on {} = {}",
            counted.blank,
            counted.standard,
            counted.sample,
            counted.always_on_total(),
            base
        )];
        if active.bracketing {
            steps.push(format!(
                "bracketing: ceil({} / {}) = {}",
                base, self.wash_interval, bracketing
            ));
        } else {
            steps.push("bracketing: suppressed".to_string());
        }

        let runtime_minutes = match &test.category_runtimes {
            None => {
                let runtime = total_injections as f64 * test.shared_runtime_minutes;
                steps.push(format!(
                    "runtime: {} injections x {} min = {} min",
                    total_injections, test.shared_runtime_minutes, runtime
                ));
                runtime
            }
            Some(rt) => {
                // Unique runtimes: each category priced on its own;
                // bracketing priced at the sample runtime.
                let runtime = counted.blank as f64 * rt.blank
                    + counted.standard as f64 * rt.standard
                    + counted.sample as f64 * rt.sample
                    + counted.suitability as f64 * rt.suitability
                    + counted.sensitivity as f64 * rt.sensitivity
                    + counted.placebo as f64 * rt.placebo
                    + counted.reference1 as f64 * rt.reference1
                    + counted.reference2 as f64 * rt.reference2
                    + bracketing as f64 * rt.sample;
                steps.push(format!(
                    "runtime (unique per category, bracketing at sample rate): {runtime} min"
                ));
                runtime
            }
        };

        let wash_minutes = if include_wash { test.wash_minutes } else { 0.0 };
        if include_wash {
            steps.push(format!("wash: +{wash_minutes} min"));
        } else {
            steps.push("wash: deferred to end of group".to_string());
        }

        let total_minutes = runtime_minutes + wash_minutes;
        let formula = format!(
            "({base} + {bracketing}) injections -> {runtime_minutes} min + {wash_minutes} min wash = {total_minutes} min"
        );

        CostBreakdown {
            counted,
            base_injections: base,
            bracketing_injections: bracketing,
            total_injections,
            runtime_minutes,
            wash_minutes,
            total_minutes,
            steps,
            formula,
        }
    }
}

impl Default for CostModel {
    fn default() -> Self {
        Self::standard()
    }
}
