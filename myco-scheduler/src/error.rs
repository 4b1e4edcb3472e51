use myco_market::MarketError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("slot-close matching failed: {0}")]
    Matching(#[from] MarketError),
}
