use chrono::{DateTime, Utc};
use myco_market::MarketError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum FutureMarketError {
    #[error("no future market sub-book for slot {0}")]
    UnknownSlot(DateTime<Utc>),

    #[error(transparent)]
    Market(#[from] MarketError),
}
