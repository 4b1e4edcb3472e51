use myco_area::{ConfigError, SimulationError};
use thiserror::Error;

/// Top-level error for a `myco` run, wrapping every lower crate's error and the scenario-wiring
/// errors specific to this crate.
///
/// Grounded on `barter::error::BarterError`, which plays the same role of wrapping
/// `barter-execution`/`barter-data` errors for consumers of the top-level crate.
#[derive(Debug, Error)]
pub enum MycoError {
    #[error(transparent)]
    Simulation(#[from] SimulationError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("scenario tree is empty")]
    EmptyScenario,
    #[error(transparent)]
    Scheduler(#[from] myco_scheduler::SchedulerError),
}
