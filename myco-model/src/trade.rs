use crate::id::{ActorId, OrderId, TradeId};
use chrono::{DateTime, Utc};
use derive_more::{Constructor, Display};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Which side of the book the accepted order came from; `Trade.offer_or_bid` records this so
/// that an IAA chaining a trade downward knows whether to re-accept a child offer or bid.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Deserialize, Serialize, Display)]
pub enum AcceptedSide {
    Offer,
    Bid,
}

/// A settled trade. Grounded on `barter_execution::trade::Trade`, adapted to the spec's
/// fields: `offer_or_bid` + `order_id` replace the exchange-oriented `order_id`/`side` pair,
/// and `fee_price`/`residual` are added per spec §3.
///
/// Trades are created only inside an atomic clearing step and are never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Constructor)]
pub struct Trade {
    pub id: TradeId,
    pub time: DateTime<Utc>,
    pub offer_or_bid: AcceptedSide,
    pub order_id: OrderId,
    pub seller: ActorId,
    pub buyer: ActorId,
    pub traded_energy: Decimal,
    pub trade_price: Decimal,
    pub fee_price: Decimal,
    pub residual: Option<OrderId>,
    pub time_slot: DateTime<Utc>,
}

impl Trade {
    /// `trade_price = traded_energy * clearing_rate` (spec §3 invariant).
    pub fn clearing_rate(&self) -> Decimal {
        self.trade_price / self.traded_energy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn clearing_rate_matches_trade_price_invariant() {
        let trade = Trade::new(
            TradeId::new("t1"),
            Utc::now(),
            AcceptedSide::Offer,
            OrderId::new("o1"),
            ActorId::new("seller"),
            ActorId::new("buyer"),
            dec!(2),
            dec!(20),
            dec!(0),
            None,
            Utc::now(),
        );
        assert_eq!(trade.clearing_rate(), dec!(10));
        assert!(trade.fee_price >= Decimal::ZERO);
    }
}
