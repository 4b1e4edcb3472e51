use myco_model::{Bid, Offer, Trade};

/// Per-market notification, fired by `Market` mutators.
///
/// Grounded on `barter_execution::AccountEventKind` (a flat enum of "what changed"), specialised
/// to the order/bid/trade vocabulary of spec §4.2. Ordering rule (spec §5): within one
/// operation, order-mutation events are fired before the `TRADE` they caused; `OfferChanged`/
/// `BidChanged` always precede the `Trade` event of the same `accept_*` call.
#[derive(Debug, Clone, PartialEq)]
pub enum MarketEvent {
    Offer(Offer),
    OfferDeleted(Offer),
    OfferChanged { existing: Offer, residual: Offer },
    Bid(Bid),
    BidDeleted(Bid),
    BidChanged { existing: Bid, residual: Bid },
    Trade(Trade),
}

/// Per-order notification (spec-supplement #1, grounded on `original_source`'s
/// `Offer.add_listener`/`_call_listeners`): fired only to listeners registered against one
/// specific order id, in addition to the market-wide `MarketEvent` bus.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum OrderEvent {
    Accepted,
    Deleted,
}

pub type Listener = Box<dyn Fn(&MarketEvent) + Send + Sync>;
pub type OrderListener = Box<dyn Fn(OrderEvent) + Send + Sync>;
