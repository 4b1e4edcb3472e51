use crate::error::MatcherError;
use crate::protocol::RecommendedMatch;
use myco_market::{MatchRecommendation, Market};
use myco_model::{Bid, Offer};
use rust_decimal::Decimal;
use std::collections::HashSet;

/// Validates one wire-level `RecommendedMatch` against rules 1-5 (spec §4.8) and decomposes it
/// into the single-offer/single-bid `MatchRecommendation`s the market actually applies.
///
/// `bids`/`offers` may each name more than one order (spec §4.2, §4.8 many-to-many): the rate
/// bound is checked against the tightest individual rate on each side (`max(offer.rate)` /
/// `min(bid.rate)`), which guarantees `trade_rate` also satisfies every individual offer/bid in
/// the set, so the split below can pair any of them freely without re-checking rate per pair.
/// Energy is then allocated across the named orders with the same ascending-offer/
/// descending-bid greedy merge `pay_as_bid::plan` uses for a whole market.
pub fn validate(market: &Market, candidate: &RecommendedMatch) -> Result<Vec<MatchRecommendation>, MatcherError> {
    if market.is_readonly() {
        return Err(MatcherError::UnknownOrSealedMarket(candidate.market_id.clone()));
    }
    if candidate.offers.is_empty() || candidate.bids.is_empty() {
        return Err(MatcherError::EmptyRecommendation);
    }

    let mut offers: Vec<&Offer> = candidate
        .offers
        .iter()
        .map(|id| market.offer(id).ok_or_else(|| MatcherError::OrderNotInBook(id.clone())))
        .collect::<Result<_, _>>()?;
    let mut bids: Vec<&Bid> = candidate
        .bids
        .iter()
        .map(|id| market.bid(id).ok_or_else(|| MatcherError::OrderNotInBook(id.clone())))
        .collect::<Result<_, _>>()?;

    let offer_floor = offers.iter().map(|o| o.rate()).max().expect("checked non-empty above");
    let bid_ceiling = bids.iter().map(|b| b.rate()).min().expect("checked non-empty above");
    if candidate.trade_rate > bid_ceiling || candidate.trade_rate < offer_floor {
        return Err(MatcherError::RateOutOfBounds {
            trade_rate: candidate.trade_rate,
            offer_floor,
            bid_ceiling,
        });
    }

    let total_offer_energy: Decimal = offers.iter().map(|o| o.energy).sum();
    let total_bid_energy: Decimal = bids.iter().map(|b| b.energy).sum();
    if total_offer_energy < candidate.selected_energy || total_bid_energy < candidate.selected_energy {
        return Err(MatcherError::InsufficientEnergy);
    }

    for offer in &offers {
        for bid in &bids {
            if !offer.requirements.is_satisfied_by(&bid.attributes)
                || !bid.requirements.is_satisfied_by(&offer.attributes)
            {
                return Err(MatcherError::RequirementsNotSatisfied);
            }
        }
    }

    let distinct_sellers: HashSet<_> = offers.iter().map(|o| &o.seller).collect();
    if let Some(cap) = bids.iter().filter_map(|b| b.requirements.max_seller_count).min() {
        if distinct_sellers.len() as u32 > cap {
            return Err(MatcherError::TooManySellers { limit: cap, distinct: distinct_sellers.len() as u32 });
        }
    }

    offers.sort_by_key(|o| o.rate());
    bids.sort_by_key(|b| std::cmp::Reverse(b.rate()));

    let mut recommendations = Vec::new();
    let mut to_allocate = candidate.selected_energy;
    let mut i = 0usize;
    let mut j = 0usize;
    let mut offer_left = offers[i].energy;
    let mut bid_left = bids[j].energy;

    while i < offers.len() && j < bids.len() && to_allocate > Decimal::ZERO {
        let take = offer_left.min(bid_left).min(to_allocate);
        if take > Decimal::ZERO {
            recommendations.push(MatchRecommendation {
                offer_id: offers[i].id.clone(),
                bid_id: bids[j].id.clone(),
                trade_rate: candidate.trade_rate,
                selected_energy: take,
            });
        }
        offer_left -= take;
        bid_left -= take;
        to_allocate -= take;

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

    Ok(recommendations)
}

/// Validates every recommendation in a batch; any single failure rejects the whole batch (spec
/// §4.8 "any failure rejects the entire batch").
pub fn validate_batch(
    market: &Market,
    candidates: &[RecommendedMatch],
) -> Result<Vec<MatchRecommendation>, MatcherError> {
    let mut recommendations = Vec::new();
    for candidate in candidates {
        recommendations.extend(validate(market, candidate)?);
    }
    Ok(recommendations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use myco_fees::GridFeePolicy;
    use myco_model::{ActorId, MarketId, OrderRequirements};
    use rust_decimal_macros::dec;

    fn market_with_pair() -> (Market, myco_model::OrderId, myco_model::OrderId) {
        let mut market = Market::new(MarketId::new("m1"), Utc::now(), GridFeePolicy::default());
        let offer = market
            .post_offer(dec!(2), dec!(20), ActorId::new("seller"), ActorId::new("seller"), dec!(20), Default::default(), Default::default())
            .unwrap();
        let bid = market
            .post_bid(dec!(2), dec!(24), ActorId::new("buyer"), ActorId::new("buyer"), dec!(24), dec!(12), Default::default(), Default::default())
            .unwrap();
        (market, offer.id, bid.id)
    }

    #[test]
    fn valid_single_pair_converts() {
        let (market, offer_id, bid_id) = market_with_pair();
        let candidate = RecommendedMatch {
            market_id: market.id.clone(),
            bids: vec![bid_id],
            offers: vec![offer_id],
            trade_rate: dec!(10),
            selected_energy: dec!(2),
        };
        let recs = validate(&market, &candidate).unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].selected_energy, dec!(2));
    }

    #[test]
    fn rate_outside_bounds_is_rejected() {
        let (market, offer_id, bid_id) = market_with_pair();
        let candidate = RecommendedMatch {
            market_id: market.id.clone(),
            bids: vec![bid_id],
            offers: vec![offer_id],
            trade_rate: dec!(100),
            selected_energy: dec!(2),
        };
        assert!(matches!(validate(&market, &candidate), Err(MatcherError::RateOutOfBounds { .. })));
    }

    #[test]
    fn readonly_market_is_rejected() {
        let (mut market, offer_id, bid_id) = market_with_pair();
        market.mark_readonly();
        let candidate = RecommendedMatch {
            market_id: market.id.clone(),
            bids: vec![bid_id],
            offers: vec![offer_id],
            trade_rate: dec!(10),
            selected_energy: dec!(2),
        };
        assert!(matches!(validate(&market, &candidate), Err(MatcherError::UnknownOrSealedMarket(_))));
    }

    #[test]
    fn two_offers_split_to_cover_one_bid() {
        let mut market = Market::new(MarketId::new("m1"), Utc::now(), GridFeePolicy::default());
        let cheap = market
            .post_offer(dec!(1), dec!(10), ActorId::new("a"), ActorId::new("a"), dec!(10), Default::default(), Default::default())
            .unwrap();
        let pricey = market
            .post_offer(dec!(3), dec!(30), ActorId::new("b"), ActorId::new("b"), dec!(30), Default::default(), Default::default())
            .unwrap();
        let bid = market
            .post_bid(dec!(3), dec!(36), ActorId::new("buyer"), ActorId::new("buyer"), dec!(36), dec!(12), Default::default(), Default::default())
            .unwrap();

        let candidate = RecommendedMatch {
            market_id: market.id.clone(),
            bids: vec![bid.id],
            offers: vec![cheap.id.clone(), pricey.id.clone()],
            trade_rate: dec!(10),
            selected_energy: dec!(3),
        };
        let recs = validate(&market, &candidate).unwrap();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].offer_id, cheap.id);
        assert_eq!(recs[0].selected_energy, dec!(1));
        assert_eq!(recs[1].offer_id, pricey.id);
        assert_eq!(recs[1].selected_energy, dec!(2));
        let total: Decimal = recs.iter().map(|r| r.selected_energy).sum();
        assert_eq!(total, dec!(3));

        let trades = market.match_recommendations(&recs).unwrap();
        assert_eq!(trades.len(), 2);
    }

    #[test]
    fn max_seller_count_caps_distinct_sellers() {
        let mut market = Market::new(MarketId::new("m1"), Utc::now(), GridFeePolicy::default());
        let a = market
            .post_offer(dec!(1), dec!(10), ActorId::new("a"), ActorId::new("a"), dec!(10), Default::default(), Default::default())
            .unwrap();
        let b = market
            .post_offer(dec!(1), dec!(10), ActorId::new("b"), ActorId::new("b"), dec!(10), Default::default(), Default::default())
            .unwrap();
        let requirements = OrderRequirements { max_seller_count: Some(1), ..Default::default() };
        let bid = market
            .post_bid(dec!(2), dec!(24), ActorId::new("buyer"), ActorId::new("buyer"), dec!(24), dec!(12), Default::default(), requirements)
            .unwrap();

        let candidate = RecommendedMatch {
            market_id: market.id.clone(),
            bids: vec![bid.id],
            offers: vec![a.id, b.id],
            trade_rate: dec!(10),
            selected_energy: dec!(2),
        };
        assert!(matches!(validate(&market, &candidate), Err(MatcherError::TooManySellers { limit: 1, distinct: 2 })));
    }

    #[test]
    fn empty_offer_or_bid_list_is_rejected() {
        let (market, _offer_id, bid_id) = market_with_pair();
        let candidate = RecommendedMatch {
            market_id: market.id.clone(),
            bids: vec![bid_id],
            offers: vec![],
            trade_rate: dec!(10),
            selected_energy: dec!(2),
        };
        assert!(matches!(validate(&market, &candidate), Err(MatcherError::EmptyRecommendation)));
    }
}
