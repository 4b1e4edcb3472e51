use crate::config::ConfigError;
use myco_iaa::IaaError;
use myco_market::MarketError;
use thiserror::Error;

/// Aggregates every crate's error enum into one type (spec §7 "Unhandled exceptions ... are
/// caught at the top level, converted into a structured job-error payload").
///
/// Grounded on `barter-execution::error::ClientError` wrapping `ApiError`/`ConnectivityError`.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Market(#[from] MarketError),
    #[error(transparent)]
    Iaa(#[from] IaaError),
    #[error(transparent)]
    FutureMarket(#[from] myco_future_market::FutureMarketError),
    #[error(transparent)]
    Scheduler(#[from] myco_scheduler::SchedulerError),
    #[error("area {0} not found in the tree")]
    UnknownArea(String),
    #[error("area {0} is a leaf and has no market of its own")]
    NotAnInternalArea(String),
    #[error("bootstrap configuration error: {0}")]
    Configuration(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
