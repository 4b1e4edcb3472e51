use myco_market::Market;
use myco_model::{Bid, Offer, OrderId};

/// Default minimum age, in ticks, before a newly posted offer/bid is eligible to match (spec
/// §4.3b): "a newly posted order cannot match in the same tick it was posted".
pub const DEFAULT_MIN_ORDER_AGE_TICKS: u64 = 2;

pub(crate) fn is_eligible(market: &Market, id: &OrderId, min_age_ticks: u64) -> bool {
    market.order_age(id).map(|age| age >= min_age_ticks).unwrap_or(false)
}

pub(crate) fn offer_requirements_met(offer: &Offer, bid: &Bid) -> bool {
    offer.requirements.is_satisfied_by(&bid.attributes) && bid.requirements.is_satisfied_by(&offer.attributes)
}
