//! HPLC test scheduling engine.
//!
//! Takes a pool of pending laboratory tests (extracted from production
//! batches) and a pool of HPLC instruments with fixed detector
//! capabilities, and produces an assignment of tests to instruments for
//! right now, an optimized grouping of each instrument's queue that
//! exploits shared setup (column, detector, mobile phases) to avoid
//! redundant injections, and a multi-day forecast for everything that
//! could not fit today.
//!
//! # Modules
//!
//! - **`models`**: Domain types — `Batch`, `Test`, `Instrument`,
//!   `ScheduledTest`, `Group`, `InstrumentQueue`, `HoldEntry`,
//!   `ForecastSequence`
//! - **`cost`**: Pure injection time/cost model with positional masks
//! - **`resolver`**: Maps a flattened test back to its formulation component
//! - **`grouping`**: Shared-setup grouping of co-scheduled tests
//! - **`scheduler`**: Daily assignment, forecast planning, and the manual
//!   reassignment protocol
//! - **`catalog`**: Injected read-only master-data label lookups
//! - **`validation`**: Input integrity checks (duplicate IDs, method fields)
//!
//! # Architecture
//!
//! The engine is synchronous, single-threaded computation per run: one
//! full run is a pure function of its inputs, holds no state between
//! calls, and rebuilds every derived entity from scratch. All I/O —
//! fetching batches and instruments, persisting manual reorders — happens
//! at the boundary, outside the algorithms. `now` is a plain parameter so
//! runs are deterministic under test.
//!
//! # Example
//!
//! ```
//! use hplc_schedule::models::{Batch, InjectionCounts, Instrument, Test};
//! use hplc_schedule::scheduler::{ScheduleEngine, ScheduleSnapshot};
//!
//! let batch = Batch::new("B1").with_batch_number("2024-0042").with_test(
//!     Test::new("T1", "B1")
//!         .with_method("C18", "UV")
//!         .with_mobile_phases(["MP-A", "MP-B"])
//!         .with_shared_runtime(5.0)
//!         .with_counts(InjectionCounts { sample: 6, ..Default::default() }),
//! );
//! let instruments = vec![Instrument::new("I1").with_name("HPLC-01").with_detector("UV")];
//!
//! let engine = ScheduleEngine::new();
//! let outcome = engine.run_schedule(&[batch], &instruments).unwrap();
//! let forecast = engine.plan_forecast(&outcome, 0, 7).unwrap();
//! let snapshot = ScheduleSnapshot::from_run(outcome, forecast);
//! assert_eq!(snapshot.queues.len(), 1);
//! ```

pub mod catalog;
pub mod cost;
pub mod error;
pub mod grouping;
pub mod models;
pub mod resolver;
pub mod scheduler;
pub mod validation;

pub use error::ScheduleError;
