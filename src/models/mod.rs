//! Scheduling domain models.
//!
//! Core data types for the HPLC test-scheduling problem and its solutions.
//! Input entities ([`Batch`], [`Test`], [`Instrument`]) arrive from the
//! surrounding LIMS; derived entities ([`ScheduledTest`], [`Group`],
//! [`InstrumentQueue`], [`HoldEntry`], [`ForecastSequence`]) are owned by
//! one scheduling run and rebuilt wholesale on the next.

mod batch;
mod forecast;
mod instrument;
mod queue;
mod scheduled;

pub use batch::{Batch, ComponentTest, FormulationComponent};
pub use forecast::{start_of_day, ForecastSequence, InstrumentForecast, MINUTES_PER_DAY};
pub use instrument::Instrument;
pub use queue::{HoldEntry, HoldReason, InstrumentQueue};
pub use scheduled::{Group, ScheduledTest};
pub use test::{InjectionCounts, InjectionRuntimes, Priority, Test, TestStatus};
