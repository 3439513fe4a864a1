//! Multi-day forecast planner.
//!
//! Projects, instrument by instrument and day by day, when each machine
//! becomes free and what it could run next. Hold-pool tests are consumed
//! from a single shared pool across the whole horizon: a test packed on
//! day 3 is gone on day 4.
//!
//! # Free-At Chaining
//!
//! Day 1 starts from `now` plus the instrument's current queue total
//! (just `now` when idle). Later days chain from the instrument's own
//! previous-day sequence end, falling back to the day start when the
//! previous day recorded no sequence. An instrument still busy at a day's
//! end boundary is skipped for that day.

use std::cmp::Reverse;

use tracing::{debug, instrument};

use crate::error::ScheduleError;
use crate::models::{
    start_of_day, ForecastSequence, InstrumentForecast, ScheduledTest, MINUTES_PER_DAY,
};

use super::daily::{PackState, ScheduleEngine, ScheduleOutcome};

impl ScheduleEngine {
    /// Plans hold-pool work across the coming days.
    ///
    /// `now_minutes` is the wall-clock anchor in minutes since the
    /// caller's epoch; it is a plain parameter so runs are deterministic
    /// under test. A zero `horizon_days` is rejected before any
    /// computation.
    #[instrument(skip_all, fields(held = outcome.hold_pool.len(), horizon_days))]
    pub fn plan_forecast(
        &self,
        outcome: &ScheduleOutcome,
        now_minutes: i64,
        horizon_days: u32,
    ) -> Result<Vec<InstrumentForecast>, ScheduleError> {
        self.validate_config()?;
        if horizon_days == 0 {
            return Err(ScheduleError::InvalidConfig(
                "forecast horizon must be at least 1 day".into(),
            ));
        }

        let mut pool: Vec<ScheduledTest> = outcome
            .hold_pool
            .iter()
            .map(|entry| entry.test.clone())
            .collect();
        pool.sort_by_key(|st| Reverse(st.test.priority.tier()));

        let mut forecasts: Vec<InstrumentForecast> = outcome
            .instruments
            .iter()
            .map(|i| InstrumentForecast::new(i.id.clone(), i.display_name()))
            .collect();

        let today = start_of_day(now_minutes);
        'horizon: for day in 1..=horizon_days {
            let day_start = today + i64::from(day) * MINUTES_PER_DAY;
            let day_end = day_start + MINUTES_PER_DAY;

            for (idx, instrument) in outcome.instruments.iter().enumerate() {
                if pool.is_empty() {
                    debug!(day, "hold pool exhausted, stopping horizon early");
                    break 'horizon;
                }

                let current_queue = outcome.queue_for(&instrument.id);
                let free_at = if day == 1 {
                    now_minutes
                        + current_queue.map_or(0.0, |q| q.total_minutes).ceil() as i64
                } else {
                    forecasts[idx]
                        .sequence_for_day(day - 1)
                        .map_or(day_start, |seq| seq.end_minutes)
                };
                if free_at >= day_end {
                    debug!(day, instrument = %instrument.id, free_at, "still busy, skipped");
                    continue;
                }
                let start = free_at.max(day_start);

                // Day-1 slots of instruments with live queues stay on the
                // queue's detector; everything else may use any detector
                // the instrument supports.
                let day_one_lock = if day == 1 {
                    current_queue.and_then(|q| q.locked_detector.clone())
                } else {
                    None
                };

                let mut state = PackState::new();
                let mut packed: Vec<ScheduledTest> = Vec::new();
                pool.retain(|candidate| {
                    let admitted = state.try_admit(
                        &candidate.test,
                        candidate.original_execution_time,
                        self.runtime_ceiling_minutes(),
                        self.mobile_phase_slots(),
                        |d| match &day_one_lock {
                            Some(lock) => lock == d,
                            None => instrument.supports_detector(d),
                        },
                    );
                    if admitted {
                        packed.push(candidate.clone());
                    }
                    !admitted
                });

                let grouped = self.grouping().group_queue(packed);
                let total = grouped.total_minutes();
                let sequence = ForecastSequence {
                    name: format!("F-{day}-{}", slot_letter(idx)),
                    instrument_id: instrument.id.clone(),
                    day,
                    start_minutes: start,
                    end_minutes: start + total.ceil() as i64,
                    locked_column: state.locked_column,
                    locked_detector: state.locked_detector.or(day_one_lock),
                    mobile_phase_set: state.phase_set,
                    tests: grouped.tests,
                    groups: grouped.groups,
                };
                debug!(
                    sequence = %sequence.name,
                    instrument = %instrument.id,
                    packed = sequence.tests.len(),
                    total_minutes = total,
                    "forecast sequence recorded"
                );
                forecasts[idx].sequences.push(sequence);
            }
        }

        Ok(forecasts)
    }
}

/// Slot letter for an instrument index: a, b, .., z, aa, ab, ..
fn slot_letter(mut idx: usize) -> String {
    let mut letters = String::new();
    loop {
        letters.insert(0, (b'a' + (idx % 26) as u8) as char);
        idx /= 26;
        if idx == 0 {
            break;
        }
        idx -= 1;
    }
    letters
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Batch, InjectionCounts, Instrument, Test};

    fn make_test(id: &str, batch: &str, detector: &str, sample: u32) -> Test {
        Test::new(id, batch)
            .with_name("Assay")
            .with_test_type("TT-1")
            .with_method("C18", detector)
            .with_mobile_phases(["MP-A"])
            .with_shared_runtime(10.0)
            .with_counts(InjectionCounts {
                sample,
                ..Default::default()
            })
    }

    fn uv(id: &str) -> Instrument {
        Instrument::new(id).with_detector("UV")
    }

    /// Schedules against no instruments so every test lands in hold.
    fn outcome_with_held(tests: Vec<Test>, instruments: Vec<Instrument>) -> ScheduleOutcome {
        let mut batch = Batch::new("B1");
        for t in tests {
            batch = batch.with_test(t);
        }
        ScheduleEngine::new()
            .run_schedule(&[batch], &instruments)
            .unwrap()
    }

    #[test]
    fn test_slot_letters() {
        assert_eq!(slot_letter(0), "a");
        assert_eq!(slot_letter(1), "b");
        assert_eq!(slot_letter(25), "z");
        assert_eq!(slot_letter(26), "aa");
        assert_eq!(slot_letter(27), "ab");
    }

    #[test]
    fn test_zero_horizon_rejected() {
        let outcome = outcome_with_held(vec![], vec![uv("I1")]);
        let engine = ScheduleEngine::new();
        assert!(engine.plan_forecast(&outcome, 0, 0).is_err());
    }

    #[test]
    fn test_scenario_d_incompatible_today_placed_on_idle_instrument() {
        // The FLD test holds today (its instrument is down); once the
        // forecast considers the idle FLD instrument it gets placed.
        let uv_heavy = make_test("T-uv", "B1", "UV", 60); // 70 inj x 10 = 700 min
        let fld = make_test("T-fld", "B1", "FLD", 2);

        let instruments = vec![uv("I1"), Instrument::new("I2").with_detector("FLD")];
        let engine = ScheduleEngine::new().with_runtime_ceiling(800.0);
        let outcome = engine
            .run_schedule(
                &[Batch::new("B1").with_test(uv_heavy).with_test(fld)],
                &[
                    instruments[0].clone(),
                    instruments[1].clone().with_active(false),
                ],
            )
            .unwrap();
        assert_eq!(outcome.hold_pool.len(), 1);

        // The instrument comes back for the forecast window.
        let outcome = ScheduleOutcome {
            instruments,
            ..outcome
        };
        let forecasts = engine.plan_forecast(&outcome, 600, 7).unwrap();

        let i2 = forecasts.iter().find(|f| f.instrument_id == "I2").unwrap();
        let seq = i2.sequence_for_day(1).unwrap();
        assert_eq!(seq.tests.len(), 1);
        assert_eq!(seq.tests[0].test.id, "T-fld");
        assert_eq!(seq.locked_detector.as_deref(), Some("FLD"));
    }

    #[test]
    fn test_day_one_free_at_chains_from_current_queue() {
        // I1 queue total 700 min; held overflow packs after it on day 1.
        let first = make_test("T1", "B1", "UV", 60); // 700 min
        let second = make_test("T2", "B1", "UV", 60);

        let engine = ScheduleEngine::new().with_runtime_ceiling(800.0);
        let outcome = engine
            .run_schedule(
                &[Batch::new("B1").with_test(first).with_test(second)],
                &[uv("I1")],
            )
            .unwrap();
        assert_eq!(outcome.hold_pool.len(), 1);
        let queue_total = outcome.queues[0].total_minutes;

        let now = 600; // 10:00 on day 0
        let forecasts = engine.plan_forecast(&outcome, now, 7).unwrap();
        let seq = forecasts[0].sequence_for_day(1).unwrap();

        // Free at now + queue total, before the day-1 end boundary.
        let free_at = now + queue_total.ceil() as i64;
        assert_eq!(seq.start_minutes, free_at.max(MINUTES_PER_DAY));
        assert_eq!(seq.tests.len(), 1);
        assert_eq!(seq.name, "F-1-a");
    }

    #[test]
    fn test_busy_instrument_skipped_for_the_day() {
        // Queue total pushes free-at past the end of day 1.
        let big = make_test("T1", "B1", "UV", 200); // 200+34=234 x 10 = 2340 min
        let held = make_test("T2", "B1", "UV", 2);

        let engine = ScheduleEngine::new().with_runtime_ceiling(2500.0);
        let outcome = engine
            .run_schedule(
                &[Batch::new("B1").with_test(big).with_test(held)],
                &[uv("I1")],
            )
            .unwrap();
        assert_eq!(outcome.hold_pool.len(), 1);

        let now = 600;
        let forecasts = engine.plan_forecast(&outcome, now, 7).unwrap();
        // free_at = 600 + 2340 = 2940 >= 2880 (end of day 1): skipped.
        assert!(forecasts[0].sequence_for_day(1).is_none());
        // Day 2 falls back to the day start and packs the held test.
        let seq = forecasts[0].sequence_for_day(2).unwrap();
        assert_eq!(seq.start_minutes, 2 * MINUTES_PER_DAY);
        assert_eq!(seq.tests.len(), 1);
    }

    #[test]
    fn test_day_one_detector_lock_from_current_queue() {
        // I1 runs UV today; a held FLD test it also supports must wait for
        // day 2 even though I1 could drive FLD.
        let uv_small = make_test("T1", "B1", "UV", 2);
        let fld_held = make_test("T2", "B1", "FLD", 2);

        let dual = Instrument::new("I1").with_detector("UV").with_detector("FLD");
        let engine = ScheduleEngine::new();
        let outcome = engine
            .run_schedule(
                &[Batch::new("B1").with_test(uv_small).with_test(fld_held)],
                &[dual],
            )
            .unwrap();
        assert_eq!(outcome.hold_pool.len(), 1);

        let forecasts = engine.plan_forecast(&outcome, 600, 7).unwrap();
        let day1 = forecasts[0].sequence_for_day(1).unwrap();
        assert!(day1.tests.is_empty(), "FLD test must not pack on day 1");
        let day2 = forecasts[0].sequence_for_day(2).unwrap();
        assert_eq!(day2.tests.len(), 1);
        assert_eq!(day2.tests[0].test.id, "T2");
    }

    #[test]
    fn test_pool_consumed_once_across_instruments() {
        // T0 exceeds the ceiling and holds; T1 is placed today. The
        // forecast pool must contain only T0, which can never pack —
        // nothing gets duplicated into the forecast.
        let outcome = outcome_with_held(
            vec![
                make_test("T0", "B1", "UV", 500), // 584 inj x 10 > ceiling
                make_test("T1", "B1", "UV", 2),
            ],
            vec![uv("I1"), uv("I2")],
        );
        assert_eq!(outcome.hold_pool.len(), 1);
        let forecasts = ScheduleEngine::new().plan_forecast(&outcome, 0, 3).unwrap();

        let packed: usize = forecasts
            .iter()
            .flat_map(|f| f.sequences.iter())
            .map(|s| s.tests.len())
            .sum();
        assert_eq!(packed, 0);
    }

    #[test]
    fn test_forecast_terminates_with_unplaceable_pool() {
        let impossible = Test::new("T1", "B1")
            .with_method("C18", "UV")
            .with_mobile_phases(["A", "B", "C", "D", "E"])
            .with_shared_runtime(1.0)
            .with_counts(InjectionCounts {
                sample: 1,
                ..Default::default()
            });
        let outcome = outcome_with_held(vec![impossible], vec![uv("I1"), uv("I2")]);
        assert_eq!(outcome.hold_pool.len(), 1);

        let forecasts = ScheduleEngine::new().plan_forecast(&outcome, 0, 7).unwrap();
        // Every (day, instrument) slot records an empty sequence.
        for forecast in &forecasts {
            assert_eq!(forecast.sequences.len(), 7);
            assert!(forecast.sequences.iter().all(|s| s.is_empty()));
        }
    }

    #[test]
    fn test_horizon_stops_early_when_pool_empties() {
        let held = make_test("T2", "B1", "UV", 2);
        let big = make_test("T1", "B1", "UV", 60); // 700 min fills I1 today
        let engine = ScheduleEngine::new().with_runtime_ceiling(800.0);
        let outcome = engine
            .run_schedule(
                &[Batch::new("B1").with_test(big).with_test(held)],
                &[uv("I1"), uv("I2")],
            )
            .unwrap();
        // Both tests fit today, the hold pool starts empty, and the
        // horizon loop stops before recording a single sequence.
        assert_eq!(outcome.hold_pool.len(), 0);
        let forecasts = engine.plan_forecast(&outcome, 0, 7).unwrap();
        let total_sequences: usize = forecasts.iter().map(|f| f.sequences.len()).sum();
        assert_eq!(total_sequences, 0);
    }

    #[test]
    fn test_forecast_sequences_are_grouped() {
        let t1 = make_test("T1", "B1", "FLD", 6);
        let t2 = make_test("T2", "B2", "FLD", 6);
        let outcome = outcome_with_held(vec![t1, t2], vec![uv("I1")]);
        let outcome = ScheduleOutcome {
            instruments: vec![
                uv("I1"),
                Instrument::new("I2").with_detector("FLD"),
            ],
            ..outcome
        };

        let forecasts = ScheduleEngine::new().plan_forecast(&outcome, 0, 7).unwrap();
        let i2 = forecasts.iter().find(|f| f.instrument_id == "I2").unwrap();
        let seq = i2.sequence_for_day(1).unwrap();
        assert_eq!(seq.tests.len(), 2);
        assert_eq!(seq.groups.len(), 1);
        let total: f64 = seq.tests.iter().map(|t| t.execution_time).sum();
        assert_eq!(seq.end_minutes, seq.start_minutes + total.ceil() as i64);
    }
}
