use crate::id::OrderId;
use thiserror::Error;

/// Value-level errors raised while constructing or splitting orders.
///
/// Market- and batch-level errors (`MarketReadOnly`, `OfferNotFound`, ...) live in
/// `myco-market`, which wraps this error as a variant of its own.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum InvalidOrder {
    #[error("order energy must be > 0, got {0}")]
    NonPositiveEnergy(rust_decimal::Decimal),

    #[error("order price must be >= 0, got {0}")]
    NegativePrice(rust_decimal::Decimal),

    #[error("cannot accept {requested} kWh from order {id} which only has {available} kWh")]
    InvalidTrade {
        id: OrderId,
        requested: rust_decimal::Decimal,
        available: rust_decimal::Decimal,
    },

    #[error("accepted energy must be > 0, got {0}")]
    ZeroTradeEnergy(rust_decimal::Decimal),
}
