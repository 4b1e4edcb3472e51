use crate::common::{is_eligible, offer_requirements_met, DEFAULT_MIN_ORDER_AGE_TICKS};
use myco_market::{MatchRecommendation, Market};
use myco_model::{Bid, Offer};
use rust_decimal::Decimal;

/// Two-sided pay-as-bid clearing plan (spec §4.3): offers ascending, bids descending; walk
/// both queues, pairing while `offer.rate <= bid.rate`, consuming `min(offer.energy,
/// bid.energy)` per pairing and advancing whichever side is exhausted. Ties are broken by
/// insertion order, since `Market::sorted_offers`/`sorted_bids` use a stable sort.
///
/// Returns a batch of `MatchRecommendation`s at `trade_rate = bid.rate()` (pay-as-bid); the
/// caller applies them via `Market::match_recommendations` so residuals/events are produced
/// atomically by the market itself.
pub fn plan(market: &Market, min_order_age_ticks: Option<u64>) -> Vec<MatchRecommendation> {
    let min_age = min_order_age_ticks.unwrap_or(DEFAULT_MIN_ORDER_AGE_TICKS);

    let offers: Vec<Offer> = market
        .sorted_offers()
        .into_iter()
        .filter(|o| is_eligible(market, &o.id, min_age))
        .cloned()
        .collect();
    let bids: Vec<Bid> = market
        .sorted_bids()
        .into_iter()
        .filter(|b| is_eligible(market, &b.id, min_age))
        .cloned()
        .collect();

    let mut recommendations = Vec::new();
    let mut i = 0usize;
    let mut j = 0usize;
    if offers.is_empty() || bids.is_empty() {
        return recommendations;
    }
    let mut offer_left = offers[i].energy;
    let mut bid_left = bids[j].energy;

    while i < offers.len() && j < bids.len() {
        let offer = &offers[i];
        let bid = &bids[j];

        if offer.rate() > bid.rate() {
            // Sorted ascending/descending: no further offer can clear against this or any
            // later (cheaper-for-seller) bid.
            break;
        }
        if !offer_requirements_met(offer, bid) {
            j += 1;
            if j < bids.len() {
                bid_left = bids[j].energy;
            }
            continue;
        }

        let take = offer_left.min(bid_left);
        if take > Decimal::ZERO {
            recommendations.push(MatchRecommendation {
                offer_id: offer.id.clone(),
                bid_id: bid.id.clone(),
                trade_rate: bid.rate(),
                selected_energy: take,
            });
        }
        offer_left -= take;
        bid_left -= take;

        if offer_left.is_zero() {
            i += 1;
            if i < offers.len() {
                offer_left = offers[i].energy;
            }
        }
        if bid_left.is_zero() {
            j += 1;
            if j < bids.len() {
                bid_left = bids[j].energy;
            }
        }
    }

    recommendations
}
