use myco_model::{MarketId, OrderId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MatcherError {
    #[error("market {0} does not exist or is already readonly")]
    UnknownOrSealedMarket(MarketId),
    #[error("order {0} is not present in the market's book")]
    OrderNotInBook(OrderId),
    #[error("recommendation energy exceeds referenced bid/offer energy")]
    InsufficientEnergy,
    #[error("trade_rate {trade_rate} outside [max(offer.rate)={offer_floor}, min(bid.rate)={bid_ceiling}]")]
    RateOutOfBounds { trade_rate: rust_decimal::Decimal, offer_floor: rust_decimal::Decimal, bid_ceiling: rust_decimal::Decimal },
    #[error("attribute/requirement predicate not satisfied")]
    RequirementsNotSatisfied,
    #[error("recommendation names no offers or no bids")]
    EmptyRecommendation,
    #[error("{distinct} distinct sellers exceeds max_seller_count of {limit}")]
    TooManySellers { limit: u32, distinct: u32 },
    #[error(transparent)]
    Market(#[from] myco_market::MarketError),
}
