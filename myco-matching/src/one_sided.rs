use crate::common::{is_eligible, DEFAULT_MIN_ORDER_AGE_TICKS};
use myco_market::{Market, MarketError};
use myco_model::{ActorId, OrderId, Trade};
use rust_decimal::Decimal;
use tracing::debug;

/// Pay-as-offer (one-sided) clearing: there are no bids. A buyer's demand for `energy_needed`
/// is filled by walking offers ascending by rate and accepting the cheapest eligible ones first,
/// clearing each at the offer's own posted rate, splitting the last one if it overshoots the
/// remaining demand (spec §4.3).
///
/// Returns whatever trades could be made; a buyer whose demand exceeds available eligible
/// supply simply receives fewer/smaller trades rather than an error (unmet demand is visible as
/// non-zero remaining demand to the caller, returned as the second tuple element).
pub fn accept_cheapest(
    market: &mut Market,
    buyer: ActorId,
    energy_needed: Decimal,
    min_offer_age_ticks: Option<u64>,
) -> Result<(Vec<Trade>, Decimal), MarketError> {
    let min_age = min_offer_age_ticks.unwrap_or(DEFAULT_MIN_ORDER_AGE_TICKS);

    let eligible_ids: Vec<_> = market
        .sorted_offers()
        .into_iter()
        .filter(|offer| is_eligible(market, &offer.id, min_age))
        .map(|offer| offer.id.clone())
        .collect();

    let mut remaining = energy_needed;
    let mut trades = Vec::new();
    for id in eligible_ids {
        if remaining <= Decimal::ZERO {
            break;
        }
        let Some(offer) = market.offer(&id) else {
            // Already consumed by an earlier iteration's residual bookkeeping.
            continue;
        };
        let take = remaining.min(offer.energy);
        let trade = market.accept_offer(&id, buyer.clone(), Some(take), None)?;
        debug!(offer = %id, energy = %take, "one-sided accept");
        remaining -= trade.traded_energy;
        trades.push(trade);
    }

    Ok((trades, remaining))
}

/// Clears every open bid in `market` as a buyer's direct demand request against the cheapest
/// eligible offers (spec §4.3 "no bids exist": in a one-sided market a posted bid stands in for
/// demand rather than a two-sided order to be paired by rate). Each bid is removed from the book
/// whether or not it is fully filled, since a one-sided market carries no bid book forward
/// between slots.
pub fn clear_book(market: &mut Market, min_offer_age_ticks: Option<u64>) -> Result<Vec<Trade>, MarketError> {
    let demands: Vec<(ActorId, OrderId, Decimal)> = market
        .bids()
        .map(|bid| (bid.buyer.clone(), bid.id.clone(), bid.energy))
        .collect();

    let mut trades = Vec::new();
    for (buyer, bid_id, energy_needed) in demands {
        let (mut filled, _remaining) =
            accept_cheapest(market, buyer, energy_needed, min_offer_age_ticks)?;
        market.delete_bid(&bid_id)?;
        trades.append(&mut filled);
    }
    Ok(trades)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use myco_fees::GridFeePolicy;
    use myco_model::{MarketId, OrderAttributes, OrderRequirements};
    use rust_decimal_macros::dec;

    #[test]
    fn single_slot_one_sided_clearing_scenario_1() {
        let mut market = Market::new(MarketId::new("m"), Utc::now(), GridFeePolicy::default());
        let offer = market
            .post_offer(
                dec!(2),
                dec!(20),
                ActorId::new("seller"),
                ActorId::new("seller"),
                dec!(20),
                OrderAttributes::default(),
                OrderRequirements::default(),
            )
            .unwrap();
        market.set_current_tick(5);
        let _ = offer;

        let (trades, remaining) =
            accept_cheapest(&mut market, ActorId::new("buyer"), dec!(2), None).unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].clearing_rate(), dec!(10));
        assert_eq!(remaining, Decimal::ZERO);
    }

    #[test]
    fn newly_posted_offer_is_ineligible_within_min_age() {
        let mut market = Market::new(MarketId::new("m"), Utc::now(), GridFeePolicy::default());
        market.set_current_tick(0);
        market
            .post_offer(
                dec!(2),
                dec!(20),
                ActorId::new("seller"),
                ActorId::new("seller"),
                dec!(20),
                OrderAttributes::default(),
                OrderRequirements::default(),
            )
            .unwrap();

        // Still tick 0: offer is 0 ticks old, below the default minimum of 2.
        let (trades, remaining) =
            accept_cheapest(&mut market, ActorId::new("buyer"), dec!(2), None).unwrap();
        assert!(trades.is_empty());
        assert_eq!(remaining, dec!(2));
    }

    #[test]
    fn demand_split_across_cheapest_offers_first() {
        let mut market = Market::new(MarketId::new("m"), Utc::now(), GridFeePolicy::default());
        market
            .post_offer(
                dec!(2),
                dec!(20),
                ActorId::new("cheap"),
                ActorId::new("cheap"),
                dec!(20),
                OrderAttributes::default(),
                OrderRequirements::default(),
            )
            .unwrap();
        market
            .post_offer(
                dec!(5),
                dec!(100),
                ActorId::new("pricey"),
                ActorId::new("pricey"),
                dec!(100),
                OrderAttributes::default(),
                OrderRequirements::default(),
            )
            .unwrap();
        market.set_current_tick(2);

        let (trades, remaining) =
            accept_cheapest(&mut market, ActorId::new("buyer"), dec!(3), None).unwrap();
        assert_eq!(remaining, Decimal::ZERO);
        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].seller, ActorId::new("cheap"));
        assert_eq!(trades[0].traded_energy, dec!(2));
        assert_eq!(trades[1].seller, ActorId::new("pricey"));
        assert_eq!(trades[1].traded_energy, dec!(1));
    }
}
