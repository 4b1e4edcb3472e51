use myco_model::{InvalidOrder, OrderId};
use thiserror::Error;

/// Market-level errors (spec §7). Each mutator fails atomically on these without corrupting the
/// book; only `match_recommendations`/external-matcher validation aborts an entire batch.
#[derive(Debug, Clone, Error)]
pub enum MarketError {
    #[error("market is read-only")]
    ReadOnly,

    #[error("invalid offer: {0}")]
    InvalidOffer(InvalidOrder),

    #[error("invalid bid: {0}")]
    InvalidBid(InvalidOrder),

    #[error("invalid trade: {0}")]
    InvalidTrade(InvalidOrder),

    #[error("offer not found: {0}")]
    OfferNotFound(OrderId),

    #[error("bid not found: {0}")]
    BidNotFound(OrderId),

    #[error("invalid bid/offer pairing: {0}")]
    InvalidBidOfferPair(String),

    #[error("trade not found or already voided: {0}")]
    TradeNotFound(myco_model::TradeId),
}
