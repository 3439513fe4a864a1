//! Scheduling engine: daily assignment, multi-day forecasting, and the
//! manual reassignment protocol.
//!
//! # Algorithm
//!
//! `ScheduleEngine` runs a deterministic greedy first-fit heuristic:
//! priority-tiered placement with per-instrument column/detector lock-in
//! and mobile-phase channel limits, followed by shared-setup grouping of
//! each queue. The forecast planner repeats the same packing rule per
//! (instrument, day) slot over a fixed horizon. No backtracking is ever
//! performed; reproducing the heuristic's exact outcomes, tie-breaks
//! included, is part of the contract.

mod daily;
mod forecast;
mod kpi;
mod snapshot;

pub use daily::{ScheduleEngine, ScheduleOutcome};
pub use kpi::ScheduleKpi;
pub use snapshot::{MoveRequest, MoveSource, ScheduleSnapshot};
