use crate::common::{is_eligible, offer_requirements_met, DEFAULT_MIN_ORDER_AGE_TICKS};
use myco_market::{MatchRecommendation, Market};
use myco_model::{Bid, Offer};
use rust_decimal::Decimal;

/// Outcome of a pay-as-clear planning pass: the uniform clearing rate `p*` together with the
/// recommendations that clear at it. `clearing_rate` is `None` when no pair of offer/bid was
/// compatible, in which case `recommendations` is always empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClearingPlan {
    pub clearing_rate: Option<Decimal>,
    pub recommendations: Vec<MatchRecommendation>,
}

/// Two-sided pay-as-clear (uniform price) clearing plan (spec §4.3): walk offers ascending and
/// bids descending exactly as in `pay_as_bid::plan`, consuming `min(offer.energy, bid.energy)`
/// at each compatible pairing. Unlike pay-as-bid, every resulting trade settles at one uniform
/// rate `p*` rather than at each bid's own rate.
///
/// `p*` is taken to be the rate of the last (highest-rated) offer that actually cleared — the
/// marginal seller's ask. When the marginal offer and marginal bid land on the exact same rate
/// the two definitions coincide and there is no ambiguity. When supply and demand are vertical at
/// the crossing (the curves jump past each other between one energy unit and the next, so no
/// single rate separates matched from unmatched orders), `p*` is instead the midpoint between the
/// marginal offer's rate and the marginal bid's rate.
pub fn plan(market: &Market, min_order_age_ticks: Option<u64>) -> ClearingPlan {
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

    if offers.is_empty() || bids.is_empty() {
        return ClearingPlan { clearing_rate: None, recommendations: Vec::new() };
    }

    // pairing: (offer_id, bid_id, selected_energy, offer_rate, bid_rate)
    let mut pairings: Vec<(Offer, Bid, Decimal)> = Vec::new();
    let mut i = 0usize;
    let mut j = 0usize;
    let mut offer_left = offers[i].energy;
    let mut bid_left = bids[j].energy;
    let mut marginal_offer_rate: Option<Decimal> = None;
    let mut marginal_bid_rate: Option<Decimal> = None;

    while i < offers.len() && j < bids.len() {
        let offer = &offers[i];
        let bid = &bids[j];

        if offer.rate() > bid.rate() {
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
            pairings.push((offer.clone(), bid.clone(), take));
            marginal_offer_rate = Some(offer.rate());
            marginal_bid_rate = Some(bid.rate());
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

    let clearing_rate = match (marginal_offer_rate, marginal_bid_rate) {
        (Some(o), Some(b)) if o == b => Some(o),
        (Some(o), Some(b)) => Some((o + b) / Decimal::from(2)),
        _ => None,
    };

    let Some(p_star) = clearing_rate else {
        return ClearingPlan { clearing_rate: None, recommendations: Vec::new() };
    };

    let recommendations = pairings
        .into_iter()
        .map(|(offer, bid, selected_energy)| MatchRecommendation {
            offer_id: offer.id,
            bid_id: bid.id,
            trade_rate: p_star,
            selected_energy,
        })
        .collect();

    ClearingPlan { clearing_rate: Some(p_star), recommendations }
}
